//! Behavior tests for full scrape runs
//!
//! These tests verify HOW a run moves a symbol batch from fetch to disk:
//! per-symbol CSV files, the completed/failed/pending partition, and
//! checkpoints surviving a trip through the store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use quarry_core::{
    Backoff, CsvRecordStore, FetchError, Pacer, RateBudget, RunState, SchedulerConfig, ScrapeRun,
    ScrapeScheduler, ScriptedFetcher, Symbol,
};
use quarry_store::CsvStore;

fn symbol(s: &str) -> Symbol {
    Symbol::parse(s).expect("valid symbol")
}

fn scheduler_over(csv: CsvStore, fetcher: Arc<ScriptedFetcher>) -> ScrapeScheduler {
    let record_store = Arc::new(CsvRecordStore::new(csv, "daily"));
    let pacer = Arc::new(Pacer::new(RateBudget::new(1_000, Duration::from_secs(1))));
    ScrapeScheduler::new(fetcher, pacer, record_store).with_config(SchedulerConfig {
        max_retries: 3,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(0),
        },
    })
}

// =============================================================================
// Lifecycle: successful runs write one file per symbol
// =============================================================================

#[tokio::test]
async fn when_every_symbol_succeeds_each_gets_a_csv_file() {
    // Given: two symbols with scripted successful responses
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    for s in ["AAPL", "MSFT"] {
        fetcher.push_success(&symbol(s));
    }

    // When: a run over both symbols completes
    let scheduler = scheduler_over(csv.clone(), fetcher);
    let mut run = scheduler.start([symbol("AAPL"), symbol("MSFT")]);
    let status = scheduler.run(&mut run).await.expect("run succeeds");

    // Then: the run is finished and each symbol has rows on disk
    assert!(status.is_finished());
    assert_eq!(run.state, RunState::Completed);
    for s in ["AAPL", "MSFT"] {
        let rows = csv.read_series("daily", s).expect("series file exists");
        assert!(!rows.is_empty(), "{s} should have persisted rows");
        assert!(
            !rows[0].request_time.is_empty(),
            "rows carry the request timestamp"
        );
    }
}

// =============================================================================
// Lifecycle: mixed outcomes partition the batch
// =============================================================================

#[tokio::test]
async fn when_outcomes_are_mixed_the_batch_partitions_cleanly() {
    // Given: one good symbol, one the upstream rejects outright
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push_success(&symbol("AAPL"));
    fetcher.push_failure(&symbol("WRONG"), FetchError::unknown_symbol("invalid api call"));

    // When: the run completes
    let scheduler = scheduler_over(csv.clone(), fetcher);
    let mut run = scheduler.start([symbol("AAPL"), symbol("WRONG")]);
    let status = scheduler.run(&mut run).await.expect("run succeeds");

    // Then: every symbol lands in exactly one bucket
    assert_eq!(status.completed, BTreeSet::from([symbol("AAPL")]));
    assert_eq!(status.failed, BTreeSet::from([symbol("WRONG")]));
    assert!(status.pending.is_empty());

    let mut union = status.completed.clone();
    union.extend(status.failed.clone());
    union.extend(status.pending.clone());
    assert_eq!(union, BTreeSet::from([symbol("AAPL"), symbol("WRONG")]));

    // And: the failed symbol never reached the filesystem
    assert!(csv.read_series("daily", "WRONG").is_err());
}

// =============================================================================
// Lifecycle: checkpoints survive the store round trip
// =============================================================================

#[tokio::test]
async fn when_a_run_is_checkpointed_its_status_survives_reload() {
    // Given: a finished run with one failure
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push_success(&symbol("AAPL"));
    fetcher.push_failure(&symbol("MSFT"), FetchError::unknown_symbol("nope"));

    let scheduler = scheduler_over(csv.clone(), fetcher);
    let mut run = scheduler.start([symbol("AAPL"), symbol("MSFT")]);
    scheduler.run(&mut run).await.expect("run succeeds");

    // When: the checkpoint goes through the store and back
    csv.save_checkpoint(&run.id, &run.checkpoint())
        .expect("checkpoint saves");
    let reloaded = ScrapeRun::from_checkpoint(csv.load_checkpoint(&run.id).expect("load"))
        .expect("checkpoint deserializes");

    // Then: nothing about the run was lost
    assert_eq!(reloaded, run);
    assert_eq!(reloaded.status(), run.status());
    assert_eq!(csv.list_checkpoints().expect("list"), vec![run.id.clone()]);
}

// =============================================================================
// Lifecycle: re-scraping merges instead of clobbering
// =============================================================================

#[tokio::test]
async fn when_a_symbol_is_scraped_twice_history_is_merged_not_duplicated() {
    // Given: a symbol scraped once (three synthetic rows on disk)
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push_success(&symbol("AAPL"));

    let scheduler = scheduler_over(csv.clone(), fetcher.clone());
    let mut first = scheduler.start([symbol("AAPL")]);
    scheduler.run(&mut first).await.expect("first run");
    let baseline = csv.read_series("daily", "AAPL").expect("first read").len();

    // When: a second run scrapes the same dates again
    let mut second = scheduler.start([symbol("AAPL")]);
    scheduler.run(&mut second).await.expect("second run");

    // Then: overlapping dates are replaced, not appended
    let rows = csv.read_series("daily", "AAPL").expect("second read");
    assert_eq!(rows.len(), baseline);
}
