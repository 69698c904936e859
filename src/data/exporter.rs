use crate::matrix::{FoundOffset, MatrixRecord, OffsetRecord};
use anyhow::Context;
use nalgebra::Matrix4;
use std::fs;
use std::path::Path;

/// Sink for accepted offsets
pub trait ResultExporter: Send + Sync {
    fn export(&self, path: &Path, offsets: &[FoundOffset]) -> crate::Result<()>;
}

/// Writes offsets as a pretty-printed JSON array of [`OffsetRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultExporter;

impl ResultExporter for JsonResultExporter {
    fn export(&self, path: &Path, offsets: &[FoundOffset]) -> crate::Result<()> {
        let records: Vec<OffsetRecord> = offsets.iter().map(FoundOffset::to_record).collect();
        let json = serde_json::to_string_pretty(&records)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create {}", parent.display()))?;
            }
        }
        fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;

        tracing::info!(count = offsets.len(), path = %path.display(), "Exported offset matrices");
        Ok(())
    }
}

/// Write raw matrices as a JSON array of [`MatrixRecord`]s readable by
/// [`JsonMatrixLoader`](super::JsonMatrixLoader).
pub fn save_matrices(path: &Path, matrices: &[Matrix4<f32>]) -> crate::Result<()> {
    let records: Vec<MatrixRecord> = matrices.iter().map(MatrixRecord::from).collect();
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{JsonMatrixLoader, MatrixLoader};
    use crate::matrix::Transform;
    use crate::utils::tolerance::nearly_equal_matrix;
    use nalgebra::Vector3;
    use tempfile::TempDir;

    #[test]
    fn test_export_then_reload_preserves_components() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("offsets.json");
        let matrix = Matrix4::new_translation(&Vector3::new(0.123_456_7, -42.5, 1e-6))
            * Matrix4::from_euler_angles(0.3, -1.1, 2.0);
        let offsets = vec![
            FoundOffset::new(Transform::new(matrix, 4), 17),
            FoundOffset::new(Transform::new(Matrix4::identity(), 4), 3),
        ];

        JsonResultExporter.export(&path, &offsets).unwrap();
        let reloaded = JsonMatrixLoader.load(&path).unwrap();

        assert_eq!(reloaded.len(), 2);
        assert!(nearly_equal_matrix(&reloaded[0], &matrix, 1e-7, 1e-6));
        assert_eq!(reloaded[1], Matrix4::identity());
    }

    #[test]
    fn test_export_keeps_space_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("offsets.json");
        let offsets = vec![FoundOffset::new(Transform::new(Matrix4::identity(), 4), 9)];

        JsonResultExporter.export(&path, &offsets).unwrap();
        let records: Vec<OffsetRecord> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(records[0].space_index, 9);
        assert_eq!(records[0].matrix.m33, 1.0);
    }

    #[test]
    fn test_save_matrices_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let matrices = vec![Matrix4::identity(), Matrix4::new_scaling(2.0)];
        save_matrices(&path, &matrices).unwrap();
        assert_eq!(JsonMatrixLoader.load(&path).unwrap(), matrices);
    }
}
