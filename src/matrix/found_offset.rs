use super::record::MatrixRecord;
use super::transform::Transform;
use serde::{Deserialize, Serialize};

/// An accepted offset and the space index that seeded it.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundOffset {
    pub matrix: Transform,
    pub space_index: usize,
}

impl FoundOffset {
    pub fn new(matrix: Transform, space_index: usize) -> Self {
        Self {
            matrix,
            space_index,
        }
    }

    pub fn to_record(&self) -> OffsetRecord {
        OffsetRecord {
            space_index: self.space_index,
            matrix: MatrixRecord::from(self.matrix.original()),
        }
    }
}

/// Serialised form of a [`FoundOffset`].
///
/// The matrix fields are flattened so an exported file can be read back by
/// the matrix loader as a plain list of transforms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetRecord {
    pub space_index: usize,
    #[serde(flatten)]
    pub matrix: MatrixRecord,
}
