use crate::utils::super_fast_hash::super_fast_hash;
use crate::utils::tolerance::round_matrix;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bytes hashed per matrix (16 x f32)
pub const MATRIX_BYTES: usize = 64;

/// Fingerprint of a rounded transform.
///
/// Stored as 64 bits but produced by a 32-bit hash, so the upper half is
/// always zero and the collision strength is that of a 32-bit digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Fingerprint of `matrix` after rounding it to `digits` decimal places.
    pub fn of(matrix: &Matrix4<f32>, digits: u32) -> Self {
        Self::of_rounded(&round_matrix(matrix, digits))
    }

    /// Fingerprint of a matrix that has already been rounded.
    ///
    /// Components are serialised in column-major storage order as
    /// little-endian f32 bit patterns.
    pub fn of_rounded(rounded: &Matrix4<f32>) -> Self {
        let mut buffer = [0u8; MATRIX_BYTES];
        for (slot, value) in buffer.chunks_exact_mut(4).zip(rounded.iter()) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        Fingerprint(super_fast_hash(&buffer) as u64)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A 4x4 affine transform with its rounded view and fingerprint.
///
/// Immutable once built: `original` is used for composition and output,
/// `rounded` only feeds the fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    original: Matrix4<f32>,
    rounded: Matrix4<f32>,
    fingerprint: Fingerprint,
    digits: u32,
}

impl Transform {
    pub fn new(original: Matrix4<f32>, digits: u32) -> Self {
        let rounded = round_matrix(&original, digits);
        let fingerprint = Fingerprint::of_rounded(&rounded);
        Self {
            original,
            rounded,
            fingerprint,
            digits,
        }
    }

    pub fn original(&self) -> &Matrix4<f32> {
        &self.original
    }

    pub fn rounded(&self) -> &Matrix4<f32> {
        &self.rounded
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn determinant(&self) -> f32 {
        self.original.determinant()
    }
}
