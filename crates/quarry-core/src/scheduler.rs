//! Scrape runs: batch orchestration over a rate-limited upstream.
//!
//! A run snapshots its symbol set, drives one fetch at a time through
//! the shared pacer, retries transient failures with backoff, and can be
//! interrupted and resumed from a serialized checkpoint without
//! re-fetching completed symbols.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::domain::{Symbol, UtcDateTime};
use crate::error::ScrapeError;
use crate::fetch::{FetchResult, SeriesFetcher};
use crate::pacing::Pacer;
use crate::store::RecordStore;

/// Lifecycle of one run. `Running` is re-entered on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Interrupted,
}

impl RunState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Terminal or pending status of one symbol within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SymbolState {
    Pending,
    Completed { rows: usize },
    Failed { reason: String },
}

/// Per-symbol bookkeeping, serialized into checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolProgress {
    pub state: SymbolState,
    pub attempts: u32,
}

/// Snapshot partition of a run's symbols. `completed`, `failed` and
/// `pending` are disjoint and always union to the original set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub completed: BTreeSet<Symbol>,
    pub failed: BTreeSet<Symbol>,
    pub pending: BTreeSet<Symbol>,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}

/// One invocation of "scrape everything in this set now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub id: String,
    pub state: RunState,
    pub started_at: UtcDateTime,
    order: Vec<Symbol>,
    symbols: BTreeMap<Symbol, SymbolProgress>,
}

impl ScrapeRun {
    fn new(order: Vec<Symbol>) -> Self {
        let symbols = order
            .iter()
            .map(|symbol| {
                (
                    symbol.clone(),
                    SymbolProgress {
                        state: SymbolState::Pending,
                        attempts: 0,
                    },
                )
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            state: RunState::Pending,
            started_at: UtcDateTime::now(),
            order,
            symbols,
        }
    }

    pub fn status(&self) -> RunStatus {
        let mut status = RunStatus {
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            pending: BTreeSet::new(),
        };
        for (symbol, progress) in &self.symbols {
            let bucket = match progress.state {
                SymbolState::Completed { .. } => &mut status.completed,
                SymbolState::Failed { .. } => &mut status.failed,
                SymbolState::Pending => &mut status.pending,
            };
            bucket.insert(symbol.clone());
        }
        status
    }

    pub fn progress(&self, symbol: &Symbol) -> Option<&SymbolProgress> {
        self.symbols.get(symbol)
    }

    /// Unresolved symbols in this run's planned order.
    pub fn pending_symbols(&self) -> Vec<Symbol> {
        self.order
            .iter()
            .filter(|symbol| {
                matches!(
                    self.symbols.get(symbol).map(|p| &p.state),
                    Some(SymbolState::Pending)
                )
            })
            .cloned()
            .collect()
    }

    pub fn checkpoint(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("runs serialize to JSON")
    }

    pub fn from_checkpoint(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    fn record_attempt(&mut self, symbol: &Symbol) -> u32 {
        let progress = self
            .symbols
            .get_mut(symbol)
            .expect("run snapshot contains every scheduled symbol");
        progress.attempts += 1;
        progress.attempts
    }

    fn resolve(&mut self, symbol: &Symbol, state: SymbolState) {
        let progress = self
            .symbols
            .get_mut(symbol)
            .expect("run snapshot contains every scheduled symbol");
        progress.state = state;
    }
}

/// Cooperative cancellation shared between the run loop and the outside
/// world (signal handler, pause button).
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    pub(crate) async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Retry policy for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Maximum total fetch attempts per symbol; a symbol still failing
    /// transiently on its last attempt is recorded as permanently failed.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

/// Called after each symbol resolves (completed or permanently failed).
pub type ProgressHook = Arc<dyn Fn(&ScrapeRun, &Symbol) + Send + Sync>;

/// Drives a symbol batch through the pacer and fetcher, persisting
/// successes and bookkeeping failures. One logical worker stream: with a
/// shared request budget, parallel fetchers add nothing but contention.
pub struct ScrapeScheduler {
    fetcher: Arc<dyn SeriesFetcher>,
    pacer: Arc<Pacer>,
    store: Arc<dyn RecordStore>,
    config: SchedulerConfig,
    cancel: CancelHandle,
    on_progress: Option<ProgressHook>,
}

impl ScrapeScheduler {
    pub fn new(
        fetcher: Arc<dyn SeriesFetcher>,
        pacer: Arc<Pacer>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            fetcher,
            pacer,
            store,
            config: SchedulerConfig::default(),
            cancel: CancelHandle::default(),
            on_progress: None,
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.on_progress = Some(hook);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stop issuing new fetches and leave the run resumable.
    pub fn pause(&self) {
        self.cancel.cancel();
    }

    /// Snapshot a symbol set into a new run, lexicographic order.
    pub fn start(&self, symbols: impl IntoIterator<Item = Symbol>) -> ScrapeRun {
        let set: BTreeSet<Symbol> = symbols.into_iter().collect();
        ScrapeRun::new(set.into_iter().collect())
    }

    /// Snapshot with an explicit processing order (first occurrence wins).
    pub fn start_with_order(&self, symbols: Vec<Symbol>) -> ScrapeRun {
        let mut seen = BTreeSet::new();
        let order: Vec<Symbol> = symbols
            .into_iter()
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();
        ScrapeRun::new(order)
    }

    /// Process every pending symbol until the run completes or is
    /// interrupted. Per-symbol failures never fail the run; only store
    /// errors propagate.
    pub async fn run(&self, run: &mut ScrapeRun) -> Result<RunStatus, ScrapeError> {
        self.drive(run).await
    }

    /// Re-enter an interrupted run. Completed symbols are never
    /// re-fetched; attempt counts carry over.
    pub async fn resume(&self, run: &mut ScrapeRun) -> Result<RunStatus, ScrapeError> {
        if run.state == RunState::Completed {
            return Err(ScrapeError::NotResumable {
                run_id: run.id.clone(),
                state: run.state.as_str().to_owned(),
            });
        }
        self.drive(run).await
    }

    async fn drive(&self, run: &mut ScrapeRun) -> Result<RunStatus, ScrapeError> {
        run.state = RunState::Running;
        let mut queue: VecDeque<Symbol> = run.pending_symbols().into();
        let mut due: HashMap<Symbol, Instant> = HashMap::new();
        tracing::debug!(run_id = %run.id, pending = queue.len(), "run started");

        while let Some(symbol) = queue.pop_front() {
            if self.cancel.is_cancelled() {
                return Ok(self.interrupt(run));
            }

            if let Some(at) = due.get(&symbol).copied() {
                let now = Instant::now();
                if at > now {
                    // Let ready symbols jump ahead; wait only when
                    // nothing else is due.
                    let other_ready = queue
                        .iter()
                        .any(|s| due.get(s).is_none_or(|&d| d <= now));
                    if other_ready {
                        queue.push_back(symbol);
                        continue;
                    }
                    tokio::select! {
                        _ = sleep_until(at) => {}
                        _ = self.cancel.cancelled() => return Ok(self.interrupt(run)),
                    }
                }
                due.remove(&symbol);
            }

            tokio::select! {
                _ = self.pacer.acquire() => {}
                _ = self.cancel.cancelled() => return Ok(self.interrupt(run)),
            }

            let result = self.fetcher.fetch(&symbol).await;
            let attempts = run.record_attempt(&symbol);

            match result {
                FetchResult::Success { series, .. } => {
                    if let Err(error) = self.store.persist(&series) {
                        self.interrupt(run);
                        return Err(error.into());
                    }
                    tracing::debug!(symbol = %symbol, rows = series.len(), attempts, "symbol completed");
                    run.resolve(&symbol, SymbolState::Completed { rows: series.len() });
                }
                FetchResult::Failure { error, .. } => {
                    if error.retryable() && attempts < self.config.max_retries {
                        let delay = self.config.backoff.delay(attempts - 1);
                        tracing::debug!(
                            symbol = %symbol,
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            "retry scheduled"
                        );
                        due.insert(symbol.clone(), Instant::now() + delay);
                        queue.push_back(symbol);
                        continue;
                    }
                    tracing::warn!(symbol = %symbol, attempts, error = %error, "symbol permanently failed");
                    run.resolve(
                        &symbol,
                        SymbolState::Failed {
                            reason: error.to_string(),
                        },
                    );
                }
            }

            if let Some(hook) = &self.on_progress {
                hook(run, &symbol);
            }
        }

        run.state = RunState::Completed;
        let status = run.status();
        tracing::debug!(
            run_id = %run.id,
            completed = status.completed.len(),
            failed = status.failed.len(),
            "run completed"
        );
        Ok(status)
    }

    fn interrupt(&self, run: &mut ScrapeRun) -> RunStatus {
        run.state = RunState::Interrupted;
        tracing::warn!(run_id = %run.id, "run interrupted");
        run.status()
    }
}

/// Order a batch the way a long-running collection wants it: symbols
/// never scraped first (lexicographic), then previously scraped symbols
/// from least to most recently written.
pub fn plan_order(
    symbols: &BTreeSet<Symbol>,
    last_scraped: &HashMap<Symbol, SystemTime>,
) -> Vec<Symbol> {
    let mut order: Vec<Symbol> = symbols
        .iter()
        .filter(|symbol| !last_scraped.contains_key(symbol))
        .cloned()
        .collect();

    let mut scraped: Vec<(&Symbol, SystemTime)> = symbols
        .iter()
        .filter_map(|symbol| last_scraped.get(symbol).map(|&at| (symbol, at)))
        .collect();
    scraped.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));

    order.extend(scraped.into_iter().map(|(symbol, _)| symbol.clone()));
    order
}
