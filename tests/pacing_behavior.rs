//! Behavior tests for request pacing during runs
//!
//! These tests verify HOW the shared pacer shapes a run's request stream:
//! bursts inside the budget go out immediately, requests beyond it wait
//! for the rolling window to refill.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quarry_core::{
    Backoff, CsvRecordStore, Pacer, RateBudget, SchedulerConfig, ScrapeScheduler, ScriptedFetcher,
    Symbol,
};
use quarry_store::CsvStore;

fn symbol(s: &str) -> Symbol {
    Symbol::parse(s).expect("valid symbol")
}

fn scheduler_with_pacer(csv: CsvStore, fetcher: Arc<ScriptedFetcher>, pacer: Pacer) -> ScrapeScheduler {
    let record_store = Arc::new(CsvRecordStore::new(csv, "daily"));
    ScrapeScheduler::new(fetcher, Arc::new(pacer), record_store).with_config(SchedulerConfig {
        max_retries: 1,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(0),
        },
    })
}

#[tokio::test]
async fn when_the_batch_fits_the_budget_no_throttling_happens() {
    // Given: three symbols under a five-per-minute budget
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    for s in ["AAPL", "MSFT", "NVDA"] {
        fetcher.push_success(&symbol(s));
    }

    let pacer = Pacer::new(RateBudget::new(5, Duration::from_secs(60)));
    let scheduler = scheduler_with_pacer(csv, fetcher, pacer);

    // When: the run executes
    let started = Instant::now();
    let mut run = scheduler.start([symbol("AAPL"), symbol("MSFT"), symbol("NVDA")]);
    scheduler.run(&mut run).await.expect("run succeeds");

    // Then: the whole burst went out without waiting on the window
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "burst within budget should not be delayed"
    );
}

#[tokio::test]
async fn when_the_batch_exceeds_the_budget_later_fetches_wait_for_refill() {
    // Given: four symbols against a two-per-100ms budget; one token
    // refills every 50ms, so the run needs at least two refills
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    for s in ["AAPL", "MSFT", "NVDA", "TSLA"] {
        fetcher.push_success(&symbol(s));
    }

    let pacer = Pacer::new(RateBudget::new(2, Duration::from_millis(100)));
    let scheduler = scheduler_with_pacer(csv, fetcher, pacer);

    // When: the run executes
    let started = Instant::now();
    let mut run = scheduler.start([
        symbol("AAPL"),
        symbol("MSFT"),
        symbol("NVDA"),
        symbol("TSLA"),
    ]);
    scheduler.run(&mut run).await.expect("run succeeds");

    // Then: wall time reflects the two forced waits
    assert!(
        started.elapsed() >= Duration::from_millis(80),
        "requests beyond the burst must wait for the window"
    );
}
