use std::collections::VecDeque;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::{
    update, Effect, FieldNormalizer, HarvestReport, HarvestState, Msg, RunStats, StopReason,
    DEFAULT_PAGE_BUDGET,
};
use thiserror::Error;

use crate::{CursorStore, ProviderError, ResultSource, SettingsError, Sink};

/// Produces the processing timestamp stamped on every record.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Local wall-clock time as `YYYY-MM-DD HH:MM:SS`.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("configuration error: {0}")]
    Configuration(#[from] SettingsError),
    #[error("connectivity error: {message}")]
    Connectivity {
        message: String,
        report: HarvestReport,
    },
    #[error("provider error after appending {appended} records: {source}")]
    Provider {
        appended: usize,
        source: ProviderError,
        report: HarvestReport,
    },
}

impl HarvestError {
    /// Stable machine-readable reason for a failed run.
    pub fn reason_code(&self) -> &'static str {
        match self {
            HarvestError::Configuration(_) => "configuration",
            HarvestError::Connectivity { .. } => "connectivity",
            HarvestError::Provider { .. } => "provider",
        }
    }

    /// What the run managed before failing, if it got past configuration.
    pub fn report(&self) -> Option<&HarvestReport> {
        match self {
            HarvestError::Configuration(_) => None,
            HarvestError::Connectivity { report, .. } | HarvestError::Provider { report, .. } => {
                Some(report)
            }
        }
    }
}

/// Runs one bounded harvest invocation for a single query.
///
/// The dedup index and cursor live in a fresh [`HarvestState`] per call to
/// [`HarvestController::run`]; the controller itself holds no run state, so
/// calling `run` again after any failure is safe. Two controllers running the
/// same query at once are not coordinated here.
pub struct HarvestController<S, K, C> {
    query_key: String,
    source: S,
    sink: K,
    cursors: C,
    page_budget: u32,
    normalizer: FieldNormalizer,
    clock: Clock,
}

impl<S, K, C> HarvestController<S, K, C>
where
    S: ResultSource,
    K: Sink,
    C: CursorStore,
{
    pub fn new(query_key: impl Into<String>, source: S, sink: K, cursors: C) -> Self {
        Self {
            query_key: query_key.into(),
            source,
            sink,
            cursors,
            page_budget: DEFAULT_PAGE_BUDGET,
            normalizer: FieldNormalizer::default(),
            clock: Arc::new(local_timestamp),
        }
    }

    pub fn with_page_budget(mut self, page_budget: u32) -> Self {
        self.page_budget = page_budget;
        self
    }

    pub fn with_normalizer(mut self, normalizer: FieldNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        if self.page_budget == 0 {
            return Err(SettingsError::Invalid {
                name: "page_budget",
                message: "must be at least 1".to_string(),
            }
            .into());
        }
        engine_info!(
            "Harvest started for {:?} with a budget of {} pages",
            self.query_key,
            self.page_budget
        );

        let (mut state, effects) = update(
            HarvestState::with_normalizer(self.page_budget, self.normalizer),
            Msg::Started,
        );
        let mut pending: VecDeque<Effect> = effects.into();
        let mut provider_error = None;

        while let Some(effect) = pending.pop_front() {
            let msg = self.execute(effect, &mut provider_error).await;
            let is_page = matches!(msg, Msg::PageFetched { .. });
            let before = state.stats().clone();

            let (next, effects) = update(state, msg);
            state = next;
            if is_page {
                log_page(&before, state.stats());
            }
            pending.extend(effects);
        }

        self.conclude(state.report(), provider_error)
    }

    async fn execute(&self, effect: Effect, provider_error: &mut Option<ProviderError>) -> Msg {
        match effect {
            Effect::LoadCursor => match self.cursors.load(&self.query_key).await {
                Ok(cursor) => {
                    match &cursor {
                        Some(cursor) => engine_info!("Resuming from cursor {:?}", cursor.as_str()),
                        None => engine_info!("No stored cursor, starting a fresh sequence"),
                    }
                    Msg::CursorLoaded(cursor)
                }
                Err(err) => storage_failed(format!("cursor store: {err}")),
            },
            Effect::ReadSinkKeys => match self.sink.read_keys().await {
                Ok(keys) => {
                    engine_info!("Sink holds {} existing entries", keys.len());
                    Msg::SinkKeysLoaded(keys)
                }
                Err(err) => storage_failed(format!("sink: {err}")),
            },
            Effect::FetchPage { cursor } => match self.source.fetch(cursor.as_ref()).await {
                Ok(batch) => Msg::PageFetched {
                    batch,
                    processed_at: (self.clock)(),
                },
                Err(err) => {
                    engine_warn!("Fetch failed, keeping the last good cursor: {}", err);
                    let reason = err.to_string();
                    *provider_error = Some(err);
                    Msg::FetchFailed { reason }
                }
            },
            Effect::AppendRecords { records } => match self.sink.append(&records).await {
                Ok(()) => {
                    engine_debug!("Sink accepted {} records", records.len());
                    Msg::RecordsAppended {
                        count: records.len(),
                    }
                }
                Err(err) => storage_failed(format!("sink append: {err}")),
            },
            Effect::StoreCursor { cursor } => {
                match self.cursors.store(&self.query_key, cursor.as_ref()).await {
                    Ok(()) => {
                        match &cursor {
                            Some(cursor) => engine_info!("Paused at cursor {:?}", cursor.as_str()),
                            None => engine_info!("Sequence finished, cursor cleared"),
                        }
                        Msg::CursorStored
                    }
                    Err(err) => storage_failed(format!("cursor store: {err}")),
                }
            }
        }
    }

    fn conclude(
        &self,
        report: HarvestReport,
        provider_error: Option<ProviderError>,
    ) -> Result<HarvestReport, HarvestError> {
        if let Some(message) = report.storage_failure.clone() {
            return Err(HarvestError::Connectivity { message, report });
        }
        if let (Some(StopReason::ProviderFailed(_)), Some(source)) = (&report.stop, provider_error)
        {
            return Err(HarvestError::Provider {
                appended: report.appended(),
                source,
                report,
            });
        }
        engine_info!(
            "Harvest finished: {} appended, {} duplicates skipped, {} rejected over {} pages ({:?})",
            report.stats.appended,
            report.stats.skipped_duplicates,
            report.stats.rejected,
            report.stats.pages_fetched,
            report.stop
        );
        Ok(report)
    }
}

fn storage_failed(reason: String) -> Msg {
    engine_error!("Storage failure, cursor left untouched: {}", reason);
    Msg::StorageFailed { reason }
}

fn log_page(before: &RunStats, after: &RunStats) {
    engine_info!(
        "Page {}: {} accepted, {} duplicates, {} rejected",
        after.pages_fetched,
        after.accepted - before.accepted,
        after.skipped_duplicates - before.skipped_duplicates,
        after.rejected - before.rejected
    );
}
