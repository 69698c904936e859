use super::cancel::CancelToken;
use crate::error::SearchError;
use crate::logging::metrics::{MetricsCollector, Timer, BATCH_OPERATION, RUN_OPERATION};
use crate::logging::SearchSpan;
use crate::matrix::{FoundOffset, Transform, TransformSet, Fingerprint};
use crate::utils::tolerance::{contains_matrix, digits_from_tolerance, singularity_epsilon};
use nalgebra::Matrix4;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default number of space indices per batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Receives the cumulative number of examined space indices.
pub type ProgressSink = Arc<dyn Fn(usize) + Send + Sync>;

/// Receives every accepted offset.
pub type OffsetCallback = Arc<dyn Fn(&FoundOffset) + Send + Sync>;

/// How a transformed model element is looked up in space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Round, hash and look up in the space fingerprint set
    #[default]
    Fingerprint,
    /// Scan space with the combined absolute/relative comparison
    Tolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    Completed,
    Cancelled,
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub batch_size: usize,
    /// Worker ceiling; `None` uses the available hardware parallelism
    pub max_workers: Option<usize>,
    pub strategy: MatchStrategy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: None,
            strategy: MatchStrategy::Fingerprint,
        }
    }
}

/// Result of one search run.
///
/// `offsets` is in emission order: batches in index order, arbitrary order
/// within a batch.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub run_id: Uuid,
    pub offsets: Vec<FoundOffset>,
    pub status: SearchStatus,
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.status == SearchStatus::Cancelled
    }

    /// Accepted space indices in ascending order
    pub fn space_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.offsets.iter().map(|o| o.space_index).collect();
        indices.sort_unstable();
        indices
    }
}

/// Checks whether a candidate offset maps every model element into space.
///
/// Holds shared handles only, so clones are cheap and can move into worker
/// tasks.
#[derive(Clone)]
pub struct OffsetValidator {
    model: Arc<TransformSet>,
    space: Arc<TransformSet>,
    inv0: Matrix4<f32>,
    /// Precision of the space fingerprints; lookups must round the same way
    digits: u32,
    tolerance: f32,
    strategy: MatchStrategy,
    space_originals: Arc<Vec<Matrix4<f32>>>,
}

impl OffsetValidator {
    /// Prepare validation for `model` against `space`.
    ///
    /// Fails when either set is empty or `model[0]` has no usable inverse.
    /// The singularity threshold follows `tolerance`, while fingerprint
    /// lookups round at `space.digits()`.
    pub fn new(
        model: Arc<TransformSet>,
        space: Arc<TransformSet>,
        tolerance: f32,
        strategy: MatchStrategy,
    ) -> Result<Self, SearchError> {
        if model.is_empty() {
            return Err(SearchError::EmptyInput { set: "model" });
        }
        if space.is_empty() {
            return Err(SearchError::EmptyInput { set: "space" });
        }

        let epsilon = singularity_epsilon(digits_from_tolerance(tolerance));
        let basis = model[0].original();
        let determinant = basis.determinant();

        let inv0 = if determinant.abs() >= epsilon {
            basis.try_inverse()
        } else {
            None
        };
        let inv0 = inv0.ok_or(SearchError::DegenerateModel { determinant, epsilon })?;

        let space_originals = match strategy {
            MatchStrategy::Tolerance => Arc::new(space.originals()),
            MatchStrategy::Fingerprint => Arc::new(Vec::new()),
        };

        let digits = space.digits();
        Ok(Self {
            model,
            space,
            inv0,
            digits,
            tolerance,
            strategy,
            space_originals,
        })
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// `space[space_index] * inverse(model[0])`
    pub fn candidate(&self, space_index: usize) -> Matrix4<f32> {
        self.space[space_index].original() * self.inv0
    }

    /// True only if every `candidate * m` is found in space.
    /// Stops at the first model element without a match. Products with a
    /// NaN or infinite component never match.
    pub fn validate(&self, candidate: &Matrix4<f32>) -> bool {
        self.model.iter().all(|m| {
            let transformed = candidate * m.original();
            if !transformed.iter().all(|v| v.is_finite()) {
                return false;
            }
            match self.strategy {
                MatchStrategy::Fingerprint => self
                    .space
                    .contains(Fingerprint::of(&transformed, self.digits)),
                MatchStrategy::Tolerance => contains_matrix(
                    &self.space_originals,
                    &transformed,
                    self.tolerance,
                    self.tolerance,
                ),
            }
        })
    }

    /// Validate every index in `range` on `pool`.
    ///
    /// Indices not yet started when `cancel` fires are skipped and not
    /// counted as examined.
    fn run_batch(&self, pool: &ThreadPool, range: Range<usize>, cancel: &CancelToken) -> BatchResult {
        let examined = AtomicUsize::new(0);

        let accepted = pool.install(|| {
            range
                .into_par_iter()
                .filter_map(|space_index| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    examined.fetch_add(1, Ordering::Relaxed);

                    let candidate = self.candidate(space_index);
                    self.validate(&candidate)
                        .then(|| FoundOffset::new(Transform::new(candidate, self.digits), space_index))
                })
                .collect()
        });

        BatchResult {
            accepted,
            examined: examined.into_inner(),
        }
    }
}

struct BatchResult {
    accepted: Vec<FoundOffset>,
    examined: usize,
}

/// Batched, parallel offset search over a bounded worker pool.
pub struct OffsetSearch {
    options: SearchOptions,
    pool: Arc<ThreadPool>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl OffsetSearch {
    pub fn new(options: SearchOptions) -> Result<Self, SearchError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("offset-worker-{}", index));
        if let Some(workers) = options.max_workers {
            builder = builder.num_threads(workers.max(1));
        }
        let pool = builder.build()?;

        tracing::debug!(
            workers = pool.current_num_threads(),
            batch_size = options.batch_size,
            strategy = ?options.strategy,
            "Offset search engine created"
        );

        Ok(Self {
            options,
            pool: Arc::new(pool),
            metrics: None,
        })
    }

    /// Record batch and run timings into `collector`
    pub fn with_metrics(mut self, collector: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(collector);
        self
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn timer(&self, operation: &'static str, run_id: Uuid) -> Timer {
        match &self.metrics {
            Some(collector) => Timer::start_with_collector(operation, run_id, Arc::clone(collector)),
            None => Timer::start(operation, run_id),
        }
    }

    /// Find every offset `O = space[i] * inverse(model[0])` such that
    /// `O * m` is in `space` for all `m` in `model`.
    ///
    /// Batches run one at a time; indices inside a batch run in parallel.
    /// Cancellation is checked before each batch and inside workers, and a
    /// cancelled run returns the offsets accepted so far.
    pub async fn find_offsets(
        &self,
        model: Arc<TransformSet>,
        space: Arc<TransformSet>,
        tolerance: f32,
        progress: Option<ProgressSink>,
        cancel: &CancelToken,
        on_offset: Option<OffsetCallback>,
    ) -> Result<SearchOutcome, SearchError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let validator = OffsetValidator::new(
            Arc::clone(&model),
            Arc::clone(&space),
            tolerance,
            self.options.strategy,
        )?;
        let digits = validator.digits();

        if digits != digits_from_tolerance(tolerance) {
            tracing::debug!(
                space_digits = digits,
                tolerance = tolerance,
                "Space precision differs from the search tolerance; rounding at space precision"
            );
        }

        let total = space.len();
        let batch_size = self.options.batch_size.max(1);
        let span = SearchSpan::new(run_id, model.len(), total, digits, batch_size);
        let run_timer = self.timer(RUN_OPERATION, run_id);

        let mut offsets = Vec::new();
        let mut processed = 0;
        let mut status = SearchStatus::Completed;

        for batch_start in (0..total).step_by(batch_size) {
            if cancel.is_cancelled() {
                status = SearchStatus::Cancelled;
                break;
            }
            let batch_end = (batch_start + batch_size).min(total);

            let batch_timer = self.timer(BATCH_OPERATION, run_id);
            let pool = Arc::clone(&self.pool);
            let worker_validator = validator.clone();
            let worker_cancel = cancel.clone();
            let batch = tokio::task::spawn_blocking(move || {
                worker_validator.run_batch(&pool, batch_start..batch_end, &worker_cancel)
            })
            .await?;
            let batch_ms = batch_timer.stop().as_secs_f64() * 1000.0;

            processed += batch.examined;
            if let Some(callback) = &on_offset {
                for offset in &batch.accepted {
                    callback(offset);
                }
            }
            for offset in &batch.accepted {
                span.record_offset(offset.space_index);
            }
            span.record_batch(batch_start, batch_end, batch.accepted.len(), processed, batch_ms);
            offsets.extend(batch.accepted);

            if let Some(sink) = &progress {
                sink(processed);
            }

            tokio::task::yield_now().await;
        }

        if processed < total {
            status = SearchStatus::Cancelled;
        }

        run_timer.stop();
        span.record_result(offsets.len(), processed, status == SearchStatus::Cancelled);

        Ok(SearchOutcome {
            run_id,
            offsets,
            status,
            processed,
            total,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    #[test]
    fn test_validator_rejects_empty_sets() {
        let empty = Arc::new(TransformSet::new(Vec::new(), 4));
        let one = Arc::new(TransformSet::new(vec![Matrix4::identity()], 4));

        let err = OffsetValidator::new(empty.clone(), one.clone(), 1e-4, MatchStrategy::Fingerprint);
        assert!(matches!(err, Err(SearchError::EmptyInput { set: "model" })));

        let err = OffsetValidator::new(one, empty, 1e-4, MatchStrategy::Fingerprint);
        assert!(matches!(err, Err(SearchError::EmptyInput { set: "space" })));
    }

    #[test]
    fn test_validator_rejects_singular_basis() {
        let model = Arc::new(TransformSet::new(vec![Matrix4::zeros()], 4));
        let space = Arc::new(TransformSet::new(vec![Matrix4::identity()], 4));
        let err = OffsetValidator::new(model, space, 1e-4, MatchStrategy::Fingerprint);
        assert!(matches!(err, Err(SearchError::DegenerateModel { .. })));
    }

    #[test]
    fn test_validate_short_circuits_on_missing_match() {
        let model = Arc::new(TransformSet::new(
            vec![translation(0.0, 0.0, 0.0), translation(0.0, 5.0, 0.0)],
            4,
        ));
        let space = Arc::new(TransformSet::new(vec![translation(10.0, 0.0, 0.0)], 4));
        let validator = OffsetValidator::new(model, space, 1e-4, MatchStrategy::Fingerprint).unwrap();

        let candidate = validator.candidate(0);
        assert_eq!(candidate, translation(10.0, 0.0, 0.0));
        assert!(!validator.validate(&candidate));
    }

    #[test]
    fn test_strategies_agree_on_exact_data() {
        let model = Arc::new(TransformSet::new(
            vec![translation(0.0, 0.0, 0.0), translation(1.0, 0.0, 0.0)],
            4,
        ));
        let space = Arc::new(TransformSet::new(
            (0..6).map(|i| translation(i as f32, 2.0, 0.0)).collect::<Vec<_>>(),
            4,
        ));

        for strategy in [MatchStrategy::Fingerprint, MatchStrategy::Tolerance] {
            let validator = OffsetValidator::new(model.clone(), space.clone(), 1e-4, strategy).unwrap();
            let accepted: Vec<usize> = (0..space.len())
                .filter(|&i| validator.validate(&validator.candidate(i)))
                .collect();
            assert_eq!(accepted, vec![0, 1, 2, 3, 4], "strategy {:?}", strategy);
        }
    }

    #[test]
    fn test_run_batch_counts_examined() {
        let model = Arc::new(TransformSet::new(vec![Matrix4::identity()], 4));
        let space = Arc::new(TransformSet::new(
            (0..8).map(|i| translation(i as f32, 0.0, 0.0)).collect::<Vec<_>>(),
            4,
        ));
        let validator = OffsetValidator::new(model, space, 1e-4, MatchStrategy::Fingerprint).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let batch = validator.run_batch(&pool, 2..6, &CancelToken::new());
        assert_eq!(batch.examined, 4);
        assert_eq!(batch.accepted.len(), 4);

        let cancelled = CancelToken::new();
        cancelled.cancel();
        let batch = validator.run_batch(&pool, 0..8, &cancelled);
        assert_eq!(batch.examined, 0);
        assert!(batch.accepted.is_empty());
    }

    #[test]
    fn test_lookup_rounds_at_space_precision() {
        let model = Arc::new(TransformSet::new(vec![Matrix4::identity()], 5));
        let space = Arc::new(TransformSet::new(vec![translation(0.123_45, 0.0, 0.0)], 5));
        let validator = OffsetValidator::new(model, space, 1e-4, MatchStrategy::Fingerprint).unwrap();

        assert_eq!(validator.digits(), 5);
        assert!(validator.validate(&validator.candidate(0)));
    }

    #[test]
    fn test_validate_rejects_non_finite_products() {
        // An all-NaN entry rounds and hashes like any all-NaN product
        let model = Arc::new(TransformSet::new(vec![Matrix4::identity()], 4));
        let space = Arc::new(TransformSet::new(vec![Matrix4::from_element(f32::NAN)], 4));

        for strategy in [MatchStrategy::Fingerprint, MatchStrategy::Tolerance] {
            let validator = OffsetValidator::new(model.clone(), space.clone(), 1e-4, strategy).unwrap();
            assert!(!validator.validate(&validator.candidate(0)), "strategy {:?}", strategy);
        }
    }

    #[test]
    fn test_engine_respects_worker_ceiling() {
        let engine = OffsetSearch::new(SearchOptions {
            max_workers: Some(3),
            ..SearchOptions::default()
        })
        .unwrap();
        assert_eq!(engine.workers(), 3);
        assert_eq!(engine.options().batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_strategy_serde_names() {
        assert_eq!(serde_json::to_string(&MatchStrategy::Tolerance).unwrap(), "\"tolerance\"");
        let parsed: MatchStrategy = serde_json::from_str("\"fingerprint\"").unwrap();
        assert_eq!(parsed, MatchStrategy::Fingerprint);
    }
}
