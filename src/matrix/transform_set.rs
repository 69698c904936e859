use super::transform::{Fingerprint, Transform};
use crate::utils::tolerance::digits_from_tolerance;
use nalgebra::Matrix4;
use std::collections::HashMap;
use std::ops::Index;

/// Ordered, read-only collection of transforms with O(1) approximate
/// membership by fingerprint.
///
/// Insertion order is the index space referenced by search results.
#[derive(Debug, Clone)]
pub struct TransformSet {
    items: Vec<Transform>,
    first_index: HashMap<Fingerprint, usize>,
    digits: u32,
}

impl TransformSet {
    pub fn new<I>(matrices: I, digits: u32) -> Self
    where
        I: IntoIterator<Item = Matrix4<f32>>,
    {
        let items: Vec<Transform> = matrices
            .into_iter()
            .map(|m| Transform::new(m, digits))
            .collect();

        let mut first_index = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            first_index.entry(item.fingerprint()).or_insert(index);
        }

        Self {
            items,
            first_index,
            digits,
        }
    }

    /// Build a set rounded at the precision implied by `tolerance`.
    pub fn with_tolerance<I>(matrices: I, tolerance: f32) -> Self
    where
        I: IntoIterator<Item = Matrix4<f32>>,
    {
        Self::new(matrices, digits_from_tolerance(tolerance))
    }

    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.first_index.contains_key(&fingerprint)
    }

    /// Round `matrix` at this set's precision and test membership.
    pub fn contains_matrix(&self, matrix: &Matrix4<f32>) -> bool {
        self.contains(Fingerprint::of(matrix, self.digits))
    }

    /// Index of the first element carrying `fingerprint`.
    pub fn first_index_of(&self, fingerprint: Fingerprint) -> Option<usize> {
        self.first_index.get(&fingerprint).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn unique_fingerprints(&self) -> usize {
        self.first_index.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transform> {
        self.items.iter()
    }

    /// Full-precision matrices in insertion order.
    pub fn originals(&self) -> Vec<Matrix4<f32>> {
        self.items.iter().map(|t| *t.original()).collect()
    }
}

impl Index<usize> for TransformSet {
    type Output = Transform;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a TransformSet {
    type Item = &'a Transform;
    type IntoIter = std::slice::Iter<'a, Transform>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
