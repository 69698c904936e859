//! Offset search: cancellation, the batched parallel engine and the
//! single-run service wrapped around it.

pub mod cancel;
pub mod engine;
pub mod service;

pub use cancel::CancelToken;
pub use engine::{
    MatchStrategy, OffsetCallback, OffsetSearch, OffsetValidator, ProgressSink, SearchOptions, SearchOutcome,
    SearchStatus, DEFAULT_BATCH_SIZE,
};
pub use service::{OffsetFinderService, RunReport, SearchEvent};
