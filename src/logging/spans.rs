//! Structured spans for hierarchical logging
//!
//! Pre-defined spans for the search run so every batch and outcome is
//! logged with the same fields and the run's correlation ID.

use std::time::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span covering a single offset search run
pub struct SearchSpan {
    span: Span,
    start_time: Instant,
    run_id: Uuid,
    total: usize,
}

impl SearchSpan {
    /// Create a new search span for `model_len` x `space_len` candidates
    pub fn new(run_id: Uuid, model_len: usize, space_len: usize, digits: u32, batch_size: usize) -> Self {
        let span = span!(
            Level::INFO,
            "offset_search",
            run_id = %run_id,
            model_len = model_len,
            space_len = space_len,
            digits = digits,
            batch_size = batch_size,
            processed = field::Empty,
            found = field::Empty,
            cancelled = field::Empty,
            execution_time_ms = field::Empty
        );

        Self {
            span,
            start_time: Instant::now(),
            run_id,
            total: space_len,
        }
    }

    /// Record a completed batch
    pub fn record_batch(&self, batch_start: usize, batch_end: usize, accepted: usize, processed: usize, batch_ms: f64) {
        self.span.record("processed", processed);
        tracing::debug!(
            parent: &self.span,
            batch_start = batch_start,
            batch_end = batch_end,
            accepted = accepted,
            processed = processed,
            total = self.total,
            batch_ms = format!("{:.2}", batch_ms),
            "Batch completed"
        );
    }

    /// Record an accepted offset
    pub fn record_offset(&self, space_index: usize) {
        tracing::trace!(parent: &self.span, space_index = space_index, "Offset accepted");
    }

    /// Record the final outcome of the run
    pub fn record_result(&self, found: usize, processed: usize, cancelled: bool) {
        let duration = self.start_time.elapsed();
        self.span.record("found", found);
        self.span.record("processed", processed);
        self.span.record("cancelled", cancelled);
        self.span.record("execution_time_ms", duration.as_millis() as f64);

        tracing::info!(
            parent: &self.span,
            found = found,
            processed = processed,
            total = self.total,
            cancelled = cancelled,
            execution_time_ms = duration.as_millis(),
            "Offset search finished"
        );
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get the underlying span for manual instrumentation
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Create a debug span for a diagnostic pass over a labelled candidate
pub fn diagnostic_span(label: &str, correlation_id: Option<Uuid>) -> Span {
    if let Some(corr_id) = correlation_id {
        tracing::debug_span!("offset_diagnostic", label = label, correlation_id = %corr_id)
    } else {
        tracing::debug_span!("offset_diagnostic", label = label)
    }
}
