use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// Flat serialisable form of a 4x4 matrix, one named field per component.
///
/// `mRC` is the component at row `R`, column `C`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub m00: f32,
    pub m01: f32,
    pub m02: f32,
    pub m03: f32,
    pub m10: f32,
    pub m11: f32,
    pub m12: f32,
    pub m13: f32,
    pub m20: f32,
    pub m21: f32,
    pub m22: f32,
    pub m23: f32,
    pub m30: f32,
    pub m31: f32,
    pub m32: f32,
    pub m33: f32,
}

impl From<MatrixRecord> for Matrix4<f32> {
    #[rustfmt::skip]
    fn from(r: MatrixRecord) -> Self {
        Matrix4::new(
            r.m00, r.m01, r.m02, r.m03,
            r.m10, r.m11, r.m12, r.m13,
            r.m20, r.m21, r.m22, r.m23,
            r.m30, r.m31, r.m32, r.m33,
        )
    }
}

impl From<&Matrix4<f32>> for MatrixRecord {
    fn from(m: &Matrix4<f32>) -> Self {
        Self {
            m00: m[(0, 0)],
            m01: m[(0, 1)],
            m02: m[(0, 2)],
            m03: m[(0, 3)],
            m10: m[(1, 0)],
            m11: m[(1, 1)],
            m12: m[(1, 2)],
            m13: m[(1, 3)],
            m20: m[(2, 0)],
            m21: m[(2, 1)],
            m22: m[(2, 2)],
            m23: m[(2, 3)],
            m30: m[(3, 0)],
            m31: m[(3, 1)],
            m32: m[(3, 2)],
            m33: m[(3, 3)],
        }
    }
}
