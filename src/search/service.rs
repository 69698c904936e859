//! Long-lived search front end.
//!
//! Owns one engine and the latest results, allows at most one active run and
//! publishes run events on a broadcast channel.

use super::cancel::CancelToken;
use super::engine::{OffsetCallback, OffsetSearch, ProgressSink, SearchOutcome, SearchStatus};
use crate::config::Config;
use crate::data::ResultExporter;
use crate::error::SearchError;
use crate::logging::global_metrics;
use crate::logging::spans::diagnostic_span;
use crate::matrix::{FoundOffset, TransformSet};
use crate::utils::validation::{diagnose_offset, feasibility_check, set_statistics, OffsetDiagnosis, SetStatistics};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum SearchEvent {
    Started { total: usize },
    Status(String),
    Progress { processed: usize, total: usize },
    OffsetFound(FoundOffset),
    Finished {
        found: usize,
        status: SearchStatus,
        elapsed: Duration,
    },
    Failed(String),
}

/// Everything one service run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: SearchOutcome,
    pub model_stats: SetStatistics,
    pub space_stats: SetStatistics,
    pub feasible: bool,
    pub diagnoses: Vec<OffsetDiagnosis>,
}

pub struct OffsetFinderService {
    config: Config,
    engine: OffsetSearch,
    events: broadcast::Sender<SearchEvent>,
    active: Mutex<Option<CancelToken>>,
    run_lock: tokio::sync::Mutex<()>,
    results: Mutex<Vec<FoundOffset>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OffsetFinderService {
    pub fn new(config: Config) -> Result<Self, SearchError> {
        let engine = OffsetSearch::new((&config.search).into())?.with_metrics(global_metrics());
        Ok(Self::with_engine(config, engine))
    }

    pub fn with_engine(config: Config, engine: OffsetSearch) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            engine,
            events,
            active: Mutex::new(None),
            run_lock: tokio::sync::Mutex::new(()),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    /// Request cancellation of the active run, if any
    pub fn cancel(&self) {
        if let Some(token) = locked(&self.active).as_ref() {
            tracing::info!("Cancelling active offset search");
            token.cancel();
        }
    }

    /// Offsets of the most recent completed or cancelled run
    pub fn last_results(&self) -> Vec<FoundOffset> {
        locked(&self.results).clone()
    }

    /// Export the latest results; returns how many offsets were written.
    pub fn export_results(&self, exporter: &dyn ResultExporter, path: &Path) -> crate::Result<usize> {
        let results = self.last_results();
        exporter.export(path, &results)?;
        Ok(results.len())
    }

    fn emit(&self, event: SearchEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.emit(SearchEvent::Status(message));
    }

    /// Run a search over `model` and `space` with the configured tolerance.
    ///
    /// A run already in progress is cancelled and awaited first. If this run
    /// is itself superseded before it starts, it returns a cancelled report
    /// with no offsets.
    pub async fn find_offsets(
        &self,
        model: Arc<TransformSet>,
        space: Arc<TransformSet>,
    ) -> Result<RunReport, SearchError> {
        let token = CancelToken::new();
        if let Some(previous) = locked(&self.active).replace(token.clone()) {
            previous.cancel();
        }
        locked(&self.results).clear();

        let _run = self.run_lock.lock().await;
        let report = self.run(model, space, &token).await;

        let mut active = locked(&self.active);
        if active.as_ref().is_some_and(|current| current.same_as(&token)) {
            *active = None;
        }
        report
    }

    /// Whether `token` belongs to the newest run; superseded runs keep
    /// their results to themselves.
    fn is_current(&self, token: &CancelToken) -> bool {
        locked(&self.active).as_ref().is_some_and(|current| current.same_as(token))
    }

    async fn run(
        &self,
        model: Arc<TransformSet>,
        space: Arc<TransformSet>,
        token: &CancelToken,
    ) -> Result<RunReport, SearchError> {
        let tolerance = self.config.search.tolerance;
        let total = space.len();

        self.emit(SearchEvent::Started { total });
        self.status("Validating data...");
        let model_stats = set_statistics("Model", &model, tolerance);
        let space_stats = set_statistics("Space", &space, tolerance);
        let feasible = feasibility_check(&model, &space, tolerance);
        if !feasible {
            self.status("Data may be invalid. Check the log.");
        }

        if token.is_cancelled() {
            tracing::info!("Search superseded before it started");
            let outcome = SearchOutcome {
                run_id: Uuid::new_v4(),
                offsets: Vec::new(),
                status: SearchStatus::Cancelled,
                processed: 0,
                total,
                elapsed: Duration::ZERO,
            };
            self.finish(&outcome);
            return Ok(RunReport {
                outcome,
                model_stats,
                space_stats,
                feasible,
                diagnoses: Vec::new(),
            });
        }

        self.status("Searching for offsets...");
        let progress_events = self.events.clone();
        let progress: ProgressSink = Arc::new(move |processed| {
            let _ = progress_events.send(SearchEvent::Progress { processed, total });
        });
        let found_events = self.events.clone();
        let on_offset: OffsetCallback = Arc::new(move |offset| {
            let _ = found_events.send(SearchEvent::OffsetFound(offset.clone()));
        });

        let outcome = match self
            .engine
            .find_offsets(
                Arc::clone(&model),
                Arc::clone(&space),
                tolerance,
                Some(progress),
                token,
                Some(on_offset),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Offset search failed: {}", e);
                self.emit(SearchEvent::Failed(e.to_string()));
                return Err(e);
            }
        };

        let diagnoses = self.diagnose(&model, &space, &outcome);
        if self.is_current(token) {
            *locked(&self.results) = outcome.offsets.clone();
        }
        self.finish(&outcome);

        Ok(RunReport {
            outcome,
            model_stats,
            space_stats,
            feasible,
            diagnoses,
        })
    }

    fn finish(&self, outcome: &SearchOutcome) {
        match outcome.status {
            SearchStatus::Completed => self.status(format!("Search finished. Found: {}", outcome.offsets.len())),
            SearchStatus::Cancelled => self.status("Operation cancelled"),
        }
        self.emit(SearchEvent::Finished {
            found: outcome.offsets.len(),
            status: outcome.status,
            elapsed: outcome.elapsed,
        });
    }

    fn diagnose(&self, model: &TransformSet, space: &TransformSet, outcome: &SearchOutcome) -> Vec<OffsetDiagnosis> {
        let settings = &self.config.diagnostics;
        let tolerance = self.config.search.tolerance;
        let mut diagnoses = Vec::new();

        if settings.enabled {
            if let Some(inv0) = model[0].original().try_inverse() {
                for i in 0..settings.max_candidates.min(space.len()) {
                    let label = format!("cand[{}]", i);
                    let span = diagnostic_span(&label, Some(outcome.run_id));
                    let _enter = span.enter();
                    let candidate = space[i].original() * inv0;
                    diagnoses.push(diagnose_offset(&label, &candidate, model, space, tolerance, settings.max_reported));
                }
            }
        }

        if settings.diagnose_found {
            for offset in outcome.offsets.iter().take(settings.max_found) {
                let label = format!("found[{}]", offset.space_index);
                let span = diagnostic_span(&label, Some(outcome.run_id));
                let _enter = span.enter();
                diagnoses.push(diagnose_offset(
                    &label,
                    offset.matrix.original(),
                    model,
                    space,
                    tolerance,
                    settings.max_reported.min(3),
                ));
            }
        }

        diagnoses
    }
}
