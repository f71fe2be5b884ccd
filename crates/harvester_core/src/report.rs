use crate::{Cursor, Phase, StopReason};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunStats {
    pub seeded_keys: usize,
    pub pages_fetched: u32,
    pub accepted: usize,
    pub skipped_duplicates: usize,
    pub rejected: usize,
    pub appended: usize,
}

/// Snapshot of an invocation, suitable for logging and for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub phase: Phase,
    /// The run started from a persisted cursor.
    pub resumed: bool,
    pub stop: Option<StopReason>,
    pub storage_failure: Option<String>,
    /// Cursor persisted (or to be persisted) at the end of the run.
    pub cursor: Option<Cursor>,
    pub stats: RunStats,
}

impl HarvestReport {
    /// Number of records newly appended to the sink.
    pub fn appended(&self) -> usize {
        self.stats.appended
    }

    /// The source was fully walked and the cursor cleared.
    pub fn exhausted(&self) -> bool {
        matches!(self.stop, Some(StopReason::Exhausted))
    }

    pub fn provider_failure(&self) -> Option<&str> {
        match &self.stop {
            Some(StopReason::ProviderFailed(reason)) => Some(reason),
            _ => None,
        }
    }
}
