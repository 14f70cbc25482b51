//! Behavior tests for interruption and resume
//!
//! These tests verify HOW an interrupted run picks up where it left off:
//! completed symbols are never fetched again, attempt counts carry over,
//! and the resumed run converges to the same final partition.

use std::sync::Arc;
use std::time::Duration;

use quarry_core::{
    Backoff, CsvRecordStore, Pacer, RateBudget, RunState, SchedulerConfig, ScrapeRun,
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

#[tokio::test]
async fn when_a_run_is_interrupted_after_k_symbols_resume_fetches_only_the_rest() {
    // Given: three scripted symbols and a scheduler that cancels itself
    // after the first symbol resolves
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    for s in ["AAPL", "MSFT", "NVDA"] {
        fetcher.push_success(&symbol(s));
    }

    let scheduler = scheduler_over(csv.clone(), fetcher.clone());
    let handle = scheduler.cancel_handle();
    let scheduler = scheduler.with_progress(Arc::new(move |_, _| handle.cancel()));

    let mut run = scheduler.start([symbol("AAPL"), symbol("MSFT"), symbol("NVDA")]);
    let status = scheduler.run(&mut run).await.expect("first leg");
    assert_eq!(run.state, RunState::Interrupted);
    assert_eq!(status.completed.len(), 1);

    // When: the checkpoint round-trips through the store and a fresh
    // scheduler resumes it
    csv.save_checkpoint(&run.id, &run.checkpoint())
        .expect("checkpoint saves");
    let mut resumed = ScrapeRun::from_checkpoint(csv.load_checkpoint(&run.id).expect("load"))
        .expect("checkpoint deserializes");

    let scheduler = scheduler_over(csv.clone(), fetcher.clone());
    let final_status = scheduler.resume(&mut resumed).await.expect("resume");

    // Then: the run finishes and no symbol was fetched more than once
    assert_eq!(resumed.state, RunState::Completed);
    assert!(final_status.is_finished());
    assert_eq!(final_status.completed.len(), 3);
    for s in ["AAPL", "MSFT", "NVDA"] {
        assert_eq!(fetcher.attempts(&symbol(s)), 1, "{s} fetched exactly once");
    }
}

#[tokio::test]
async fn when_a_completed_run_is_resumed_the_scheduler_refuses() {
    // Given: a run that already completed
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push_success(&symbol("AAPL"));

    let scheduler = scheduler_over(csv, fetcher);
    let mut run = scheduler.start([symbol("AAPL")]);
    scheduler.run(&mut run).await.expect("run succeeds");
    assert_eq!(run.state, RunState::Completed);

    // When/Then: resuming it is an error, not a silent re-scrape
    assert!(scheduler.resume(&mut run).await.is_err());
}

#[tokio::test]
async fn when_resumed_after_transient_failures_attempt_counts_carry_over() {
    // Given: a symbol that failed transiently twice before the interrupt
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = CsvStore::new(dir.path());
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push_failure(
        &symbol("AAPL"),
        quarry_core::FetchError::throttled("slow down"),
    );
    fetcher.push_failure(
        &symbol("AAPL"),
        quarry_core::FetchError::throttled("slow down"),
    );
    fetcher.push_success(&symbol("AAPL"));

    let scheduler = scheduler_over(csv.clone(), fetcher.clone());
    let mut run = scheduler.start([symbol("AAPL")]);
    let status = scheduler.run(&mut run).await.expect("run succeeds");

    // Then: attempts stop within the configured budget and the third
    // attempt succeeded
    assert_eq!(fetcher.attempts(&symbol("AAPL")), 3);
    assert_eq!(status.completed.len(), 1);
}
