use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use harvester_core::{BusinessRecord, Cursor, PageBatch, RawListing, StopReason};
use harvester_engine::{
    CursorStore, CursorStoreError, HarvestController, HarvestError, ProviderError,
    ProviderFailure, ResultSource, Sink, SinkError,
};
use pretty_assertions::assert_eq;

const QUERY_KEY: &str = "cafes|in|";
const PAGE_PREFIX: &str = "page-";

#[derive(Clone)]
struct ScriptedSource {
    pages: Arc<Vec<Vec<RawListing>>>,
    fail_at: Arc<Mutex<Option<usize>>>,
    calls: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedSource {
    fn new(pages: Vec<Vec<RawListing>>) -> Self {
        Self {
            pages: Arc::new(pages),
            fail_at: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn fail_at(&self, page: Option<usize>) {
        *self.fail_at.lock().unwrap() = page;
    }

    fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ResultSource for ScriptedSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<PageBatch, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(cursor.map(|c| c.as_str().to_string()));
        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .as_str()
                .strip_prefix(PAGE_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n < self.pages.len())
                .ok_or_else(|| {
                    ProviderError::new(ProviderFailure::InvalidCursor, cursor.to_string())
                })?,
        };
        if *self.fail_at.lock().unwrap() == Some(index) {
            return Err(ProviderError::new(ProviderFailure::Network, "connection reset"));
        }

        let records = self.pages[index].clone();
        if index + 1 < self.pages.len() {
            Ok(PageBatch::has_more(
                records,
                Cursor::new(format!("{PAGE_PREFIX}{}", index + 1)),
            ))
        } else {
            Ok(PageBatch::exhausted(records))
        }
    }
}

#[derive(Clone, Default)]
struct MemorySink {
    rows: Arc<Mutex<Vec<BusinessRecord>>>,
    fail_append: Arc<AtomicBool>,
    appends: Arc<AtomicUsize>,
}

impl MemorySink {
    fn names(&self) -> Vec<String> {
        self.rows.lock().unwrap().iter().map(|r| r.name.clone()).collect()
    }

    fn rows(&self) -> Vec<BusinessRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sink for MemorySink {
    async fn read_keys(&self) -> Result<HashSet<String>, SinkError> {
        Ok(self.names().into_iter().collect())
    }

    async fn append(&self, records: &[BusinessRecord]) -> Result<(), SinkError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(SinkError::Unreachable("disk detached".to_string()));
        }
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MemoryCursors {
    slots: Arc<Mutex<HashMap<String, Cursor>>>,
    writes: Arc<AtomicUsize>,
    fail_load: Arc<AtomicBool>,
}

impl MemoryCursors {
    fn slot(&self) -> Option<Cursor> {
        self.slots.lock().unwrap().get(QUERY_KEY).cloned()
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CursorStore for MemoryCursors {
    async fn load(&self, query_key: &str) -> Result<Option<Cursor>, CursorStoreError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(CursorStoreError::Unreachable("store offline".to_string()));
        }
        Ok(self.slots.lock().unwrap().get(query_key).cloned())
    }

    async fn store(&self, query_key: &str, cursor: Option<&Cursor>) -> Result<(), CursorStoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut slots = self.slots.lock().unwrap();
        match cursor {
            Some(cursor) => slots.insert(query_key.to_string(), cursor.clone()),
            None => slots.remove(query_key),
        };
        Ok(())
    }
}

fn listing(name: &str) -> RawListing {
    RawListing::from_rendered(
        Some(name.to_string()),
        Some("4.5 (120) · Cafe · 12 Main St".to_string()),
    )
}

/// `count` pages of `per_page` uniquely named listings.
fn pages(count: usize, per_page: usize) -> Vec<Vec<RawListing>> {
    (0..count)
        .map(|page| {
            (0..per_page)
                .map(|i| listing(&format!("Biz {page}-{i}")))
                .collect()
        })
        .collect()
}

fn controller(
    source: &ScriptedSource,
    sink: &MemorySink,
    cursors: &MemoryCursors,
    budget: u32,
) -> HarvestController<ScriptedSource, MemorySink, MemoryCursors> {
    HarvestController::new(QUERY_KEY, source.clone(), sink.clone(), cursors.clone())
        .with_page_budget(budget)
        .with_clock(Arc::new(|| "2026-10-19 12:00:00".to_string()))
}

#[tokio::test]
async fn fresh_run_stops_at_budget_and_stores_the_next_cursor() {
    let source = ScriptedSource::new(pages(5, 2));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let report = controller(&source, &sink, &cursors, 3).run().await.unwrap();

    assert_eq!(report.stop, Some(StopReason::BudgetReached));
    assert!(!report.resumed);
    assert_eq!(report.stats.pages_fetched, 3);
    assert_eq!(report.appended(), 6);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-3")));
    assert_eq!(sink.appends.load(Ordering::SeqCst), 1);

    let first = &sink.rows()[0];
    assert_eq!(first.name, "Biz 0-0");
    assert_eq!(first.rating, "4.5");
    assert_eq!(first.review_count, "120");
    assert_eq!(first.category, "Cafe");
    assert_eq!(first.address, "12 Main St");
    assert_eq!(first.timestamp, "2026-10-19 12:00:00");
}

#[tokio::test]
async fn next_invocation_resumes_from_the_stored_cursor() {
    let source = ScriptedSource::new(pages(5, 2));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    controller(&source, &sink, &cursors, 2).run().await.unwrap();
    let report = controller(&source, &sink, &cursors, 2).run().await.unwrap();

    assert!(report.resumed);
    assert_eq!(
        source.calls(),
        vec![
            None,
            Some("page-1".to_string()),
            Some("page-2".to_string()),
            Some("page-3".to_string()),
        ]
    );
    assert_eq!(sink.names().len(), 8);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-4")));
}

#[tokio::test]
async fn split_runs_match_a_single_run() {
    let all = pages(15, 3);

    let single_sink = MemorySink::default();
    let single_cursors = MemoryCursors::default();
    let single = ScriptedSource::new(all.clone());
    controller(&single, &single_sink, &single_cursors, 15)
        .run()
        .await
        .unwrap();

    let split_sink = MemorySink::default();
    let split_cursors = MemoryCursors::default();
    let split = ScriptedSource::new(all.clone());
    controller(&split, &split_sink, &split_cursors, 8).run().await.unwrap();
    let last = controller(&split, &split_sink, &split_cursors, 7)
        .run()
        .await
        .unwrap();

    let stepped_sink = MemorySink::default();
    let stepped_cursors = MemoryCursors::default();
    let stepped = ScriptedSource::new(all);
    for _ in 0..15 {
        controller(&stepped, &stepped_sink, &stepped_cursors, 1)
            .run()
            .await
            .unwrap();
    }

    assert_eq!(last.stop, Some(StopReason::Exhausted));
    assert_eq!(single_sink.rows().len(), 45);
    assert_eq!(split_sink.rows(), single_sink.rows());
    assert_eq!(stepped_sink.rows(), single_sink.rows());
    assert_eq!(single_cursors.slot(), None);
    assert_eq!(split_cursors.slot(), None);
    assert_eq!(stepped_cursors.slot(), None);
}

#[tokio::test]
async fn exhaustion_clears_the_cursor_and_rerun_adds_nothing() {
    let source = ScriptedSource::new(pages(3, 2));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let first = controller(&source, &sink, &cursors, 10).run().await.unwrap();
    assert!(first.exhausted());
    assert_eq!(first.appended(), 6);
    assert_eq!(cursors.slot(), None);

    let before = sink.rows();
    let again = controller(&source, &sink, &cursors, 10).run().await.unwrap();
    assert!(!again.resumed);
    assert_eq!(again.appended(), 0);
    assert_eq!(again.stats.skipped_duplicates, 6);
    assert_eq!(again.stats.seeded_keys, 6);
    assert_eq!(sink.rows(), before);
    assert_eq!(cursors.slot(), None);
}

#[tokio::test]
async fn duplicate_names_are_written_once() {
    let source = ScriptedSource::new(vec![
        vec![listing("Corner Cafe"), listing("Bean Bar"), listing("Corner Cafe")],
        vec![listing("Bean Bar"), listing("Tea Room")],
    ]);
    let sink = MemorySink::default();
    sink.rows
        .lock()
        .unwrap()
        .push(BusinessRecord::named("Tea Room", "2026-10-18 08:00:00"));
    let cursors = MemoryCursors::default();

    let report = controller(&source, &sink, &cursors, 5).run().await.unwrap();

    assert_eq!(report.appended(), 2);
    assert_eq!(report.stats.skipped_duplicates, 3);
    assert_eq!(sink.names(), vec!["Tea Room", "Corner Cafe", "Bean Bar"]);
    let unique: HashSet<String> = sink.names().into_iter().collect();
    assert_eq!(unique.len(), sink.names().len());
}

#[tokio::test]
async fn nameless_listings_are_counted_and_dropped() {
    let source = ScriptedSource::new(vec![vec![
        listing("Named Place"),
        RawListing::from_rendered(None, Some("4.0 (3) · Bakery".to_string())),
        RawListing::from_rendered(Some("   ".to_string()), None),
    ]]);
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let report = controller(&source, &sink, &cursors, 5).run().await.unwrap();
    assert_eq!(report.stats.rejected, 2);
    assert_eq!(sink.names(), vec!["Named Place"]);
}

#[tokio::test]
async fn provider_failure_keeps_earlier_pages_and_the_last_good_cursor() {
    let source = ScriptedSource::new(pages(5, 2));
    source.fail_at(Some(2));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let err = controller(&source, &sink, &cursors, 5).run().await.unwrap_err();
    assert_eq!(err.reason_code(), "provider");
    match &err {
        HarvestError::Provider {
            appended, source, ..
        } => {
            assert_eq!(*appended, 4);
            assert_eq!(source.kind, ProviderFailure::Network);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(sink.names().len(), 4);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-2")));

    source.fail_at(None);
    let report = controller(&source, &sink, &cursors, 5).run().await.unwrap();
    assert!(report.resumed);
    assert!(report.exhausted());
    assert_eq!(sink.names().len(), 10);
}

#[tokio::test]
async fn append_failure_leaves_the_cursor_untouched() {
    let source = ScriptedSource::new(pages(5, 2));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();
    cursors
        .slots
        .lock()
        .unwrap()
        .insert(QUERY_KEY.to_string(), Cursor::new("page-1"));
    sink.fail_append.store(true, Ordering::SeqCst);

    let err = controller(&source, &sink, &cursors, 2).run().await.unwrap_err();

    assert_eq!(err.reason_code(), "connectivity");
    assert!(err.to_string().contains("disk detached"));
    assert_eq!(cursors.writes(), 0);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-1")));
    assert!(sink.rows().is_empty());
    let report = err.report().expect("report");
    assert_eq!(report.appended(), 0);
    assert_eq!(report.stats.accepted, 4);
}

#[tokio::test]
async fn unreachable_cursor_store_fails_before_fetching() {
    let source = ScriptedSource::new(pages(2, 2));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();
    cursors.fail_load.store(true, Ordering::SeqCst);

    let err = controller(&source, &sink, &cursors, 2).run().await.unwrap_err();
    assert_eq!(err.reason_code(), "connectivity");
    assert!(source.calls().is_empty());
    assert_eq!(cursors.writes(), 0);
}

#[tokio::test]
async fn empty_page_with_more_signalled_keeps_the_cursor() {
    let mut script = pages(3, 2);
    script[1].clear();
    let source = ScriptedSource::new(script);
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let report = controller(&source, &sink, &cursors, 5).run().await.unwrap();
    assert_eq!(report.stop, Some(StopReason::EmptyPage));
    assert_eq!(report.appended(), 2);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-1")));
}

#[tokio::test]
async fn zero_budget_is_a_configuration_error() {
    let source = ScriptedSource::new(pages(1, 1));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let err = controller(&source, &sink, &cursors, 0).run().await.unwrap_err();
    assert_eq!(err.reason_code(), "configuration");
    assert!(err.report().is_none());
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn one_page_budget_over_pages_of_eight_then_seven() {
    let script: Vec<Vec<RawListing>> = vec![
        (0..8).map(|i| listing(&format!("First {i}"))).collect(),
        (0..7).map(|i| listing(&format!("Second {i}"))).collect(),
    ];
    let source = ScriptedSource::new(script);
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let first = controller(&source, &sink, &cursors, 1).run().await.unwrap();
    assert_eq!(first.stop, Some(StopReason::BudgetReached));
    assert_eq!(first.appended(), 8);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-1")));

    let second = controller(&source, &sink, &cursors, 1).run().await.unwrap();
    assert_eq!(second.stop, Some(StopReason::Exhausted));
    assert_eq!(second.appended(), 7);
    assert_eq!(cursors.slot(), None);
    assert_eq!(sink.rows().len(), 15);
    assert_eq!(source.calls(), vec![None, Some("page-1".to_string())]);
}

#[tokio::test]
async fn five_accepted_then_a_provider_error_on_page_two() {
    let source = ScriptedSource::new(pages(3, 5));
    source.fail_at(Some(1));
    let sink = MemorySink::default();
    let cursors = MemoryCursors::default();

    let err = controller(&source, &sink, &cursors, 3)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "provider");
    let HarvestError::Provider {
        appended, source: cause, ..
    } = err
    else {
        panic!("expected a provider error");
    };
    assert_eq!(appended, 5);
    assert_eq!(cause.kind, ProviderFailure::Network);
    assert_eq!(sink.rows().len(), 5);
    assert_eq!(cursors.slot(), Some(Cursor::new("page-1")));
}
