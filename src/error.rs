//! Error types for the offset search.
//!
//! Only conditions that make a run impossible are errors. Cancellation is a
//! completion state (`SearchStatus::Cancelled`) and arithmetic anomalies
//! such as NaN simply fail to match.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The first model transform cannot be inverted, so no offset basis exists.
    #[error("model[0] is singular (determinant {determinant:e}, epsilon {epsilon:e})")]
    DegenerateModel {
        /// Determinant of `model[0]`
        determinant: f32,
        /// Threshold below which a determinant counts as zero
        epsilon: f32,
    },

    /// Model or space has no elements.
    #[error("{set} set is empty")]
    EmptyInput {
        /// Which input was empty ("model" or "space")
        set: &'static str,
    },

    /// The bounded worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    /// A batch task panicked or was aborted by the runtime.
    #[error("batch worker failed: {0}")]
    Worker(String),
}

impl From<rayon::ThreadPoolBuildError> for SearchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        SearchError::WorkerPool(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SearchError {
    fn from(err: tokio::task::JoinError) -> Self {
        SearchError::Worker(err.to_string())
    }
}
