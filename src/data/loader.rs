use crate::matrix::MatrixRecord;
use anyhow::Context;
use nalgebra::Matrix4;
use std::fs;
use std::path::Path;

/// Source of ordered transform sequences
pub trait MatrixLoader: Send + Sync {
    fn load(&self, path: &Path) -> crate::Result<Vec<Matrix4<f32>>>;
}

/// Reads a JSON array of `{ "m00": .., ..., "m33": .. }` records.
///
/// Unknown fields are ignored, so exported offset files load as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMatrixLoader;

impl MatrixLoader for JsonMatrixLoader {
    fn load(&self, path: &Path) -> crate::Result<Vec<Matrix4<f32>>> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("File not found or unreadable: {}", path.display()))?;
        let matrices = parse_matrices(&json)
            .with_context(|| format!("Invalid matrix data in {}", path.display()))?;

        tracing::info!(count = matrices.len(), path = %path.display(), "Loaded matrices");
        Ok(matrices)
    }
}

/// Parse a JSON array of matrix records.
pub fn parse_matrices(json: &str) -> crate::Result<Vec<Matrix4<f32>>> {
    let records: Vec<MatrixRecord> = serde_json::from_str(json)?;
    Ok(records.into_iter().map(Matrix4::from).collect())
}
