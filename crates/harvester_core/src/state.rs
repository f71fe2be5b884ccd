use std::collections::HashSet;

use crate::report::{HarvestReport, RunStats};
use crate::{BusinessRecord, Cursor, DedupIndex, FieldNormalizer};

/// Default number of pages fetched per invocation.
pub const DEFAULT_PAGE_BUDGET: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    Running,
    Finalize,
    Done,
}

/// Why the fetch loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported the end of the sequence; the cursor is cleared.
    Exhausted,
    /// The page budget was used up; the cursor is kept for the next run.
    BudgetReached,
    /// An empty page that did not claim to be the last one. The cursor it
    /// was fetched with is kept so the next run retries it.
    EmptyPage,
    /// The source failed; the last good cursor is kept.
    ProviderFailed(String),
}

/// State of one harvest invocation. Owned by a single runner; nothing here is
/// shared between runs.
#[derive(Debug, Clone)]
pub struct HarvestState {
    phase: Phase,
    page_budget: u32,
    normalizer: FieldNormalizer,
    resumed: bool,
    cursor: Option<Cursor>,
    dedup: DedupIndex,
    buffer: Vec<BusinessRecord>,
    stop: Option<StopReason>,
    storage_failure: Option<String>,
    stats: RunStats,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_BUDGET)
    }
}

impl HarvestState {
    /// Fresh state for one invocation. A budget of zero is raised to one.
    pub fn new(page_budget: u32) -> Self {
        Self::with_normalizer(page_budget, FieldNormalizer::default())
    }

    pub fn with_normalizer(page_budget: u32, normalizer: FieldNormalizer) -> Self {
        Self {
            phase: Phase::Init,
            page_budget: page_budget.max(1),
            normalizer,
            resumed: false,
            cursor: None,
            dedup: DedupIndex::new(),
            buffer: Vec::new(),
            stop: None,
            storage_failure: None,
            stats: RunStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn page_budget(&self) -> u32 {
        self.page_budget
    }

    /// Last good cursor: the one the next fetch starts from.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn dedup(&self) -> &DedupIndex {
        &self.dedup
    }

    /// Records accepted but not yet appended.
    pub fn buffered(&self) -> &[BusinessRecord] {
        &self.buffer
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn report(&self) -> HarvestReport {
        HarvestReport {
            phase: self.phase,
            resumed: self.resumed,
            stop: self.stop.clone(),
            storage_failure: self.storage_failure.clone(),
            cursor: self.cursor_to_persist(),
            stats: self.stats.clone(),
        }
    }

    /// Value written to the cursor slot at the end of the run.
    pub fn cursor_to_persist(&self) -> Option<Cursor> {
        match self.stop {
            Some(StopReason::Exhausted) => None,
            _ => self.cursor.clone(),
        }
    }

    pub(crate) fn normalizer(&self) -> FieldNormalizer {
        self.normalizer
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn load_cursor(&mut self, cursor: Option<Cursor>) {
        self.resumed = cursor.is_some();
        self.cursor = cursor;
    }

    pub(crate) fn seed(&mut self, keys: HashSet<String>) {
        self.stats.seeded_keys = keys.len();
        self.dedup.seed(keys);
    }

    pub(crate) fn advance_cursor(&mut self, next: Cursor) {
        self.cursor = Some(next);
    }

    pub(crate) fn page_completed(&mut self) -> bool {
        self.stats.pages_fetched += 1;
        self.stats.pages_fetched >= self.page_budget
    }

    /// Dedup gate. Returns `true` if the record was buffered.
    pub(crate) fn offer(&mut self, record: BusinessRecord) -> bool {
        if self.dedup.contains(&record.name) {
            self.stats.skipped_duplicates += 1;
            return false;
        }
        self.dedup.accept(&record.name);
        self.buffer.push(record);
        self.stats.accepted += 1;
        true
    }

    pub(crate) fn reject(&mut self) {
        self.stats.rejected += 1;
    }

    pub(crate) fn stop(&mut self, reason: StopReason) {
        self.stop = Some(reason);
    }

    pub(crate) fn take_buffer(&mut self) -> Vec<BusinessRecord> {
        std::mem::take(&mut self.buffer)
    }

    pub(crate) fn record_appended(&mut self, count: usize) {
        self.stats.appended += count;
    }

    pub(crate) fn fail_storage(&mut self, reason: String) {
        self.storage_failure = Some(reason);
    }
}
