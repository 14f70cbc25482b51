use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::domain::{parse_trading_date, DailyBar, Series, Symbol, UtcDateTime};
use crate::fetch::{FetchError, FetchResult, SeriesFetcher};

/// Deterministic offline fetcher. Outcomes are queued per symbol and
/// served in order; attempts are counted so tests can assert exact retry
/// behavior. When a symbol's queue runs dry the last queued outcome
/// repeats.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<Symbol, VecDeque<FetchResult>>>,
    attempts: Mutex<HashMap<Symbol, u32>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for `symbol`.
    pub fn push(&self, symbol: &Symbol, result: FetchResult) {
        self.script
            .lock()
            .expect("script lock is not poisoned")
            .entry(symbol.clone())
            .or_default()
            .push_back(result);
    }

    /// Queue a success with a small synthetic series.
    pub fn push_success(&self, symbol: &Symbol) {
        self.push(
            symbol,
            FetchResult::Success {
                symbol: symbol.clone(),
                series: synthetic_series(symbol),
            },
        );
    }

    /// Queue a failure with the given error.
    pub fn push_failure(&self, symbol: &Symbol, error: FetchError) {
        self.push(
            symbol,
            FetchResult::Failure {
                symbol: symbol.clone(),
                error,
            },
        );
    }

    /// Fetch attempts observed for `symbol`.
    pub fn attempts(&self, symbol: &Symbol) -> u32 {
        self.attempts
            .lock()
            .expect("attempt log lock is not poisoned")
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }

    /// Fetch attempts observed across all symbols.
    pub fn total_attempts(&self) -> u32 {
        self.attempts
            .lock()
            .expect("attempt log lock is not poisoned")
            .values()
            .sum()
    }

    fn next_for(&self, symbol: &Symbol) -> FetchResult {
        *self
            .attempts
            .lock()
            .expect("attempt log lock is not poisoned")
            .entry(symbol.clone())
            .or_insert(0) += 1;

        let mut script = self.script.lock().expect("script lock is not poisoned");
        match script.get_mut(symbol) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("queue is non-empty"),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| unscripted(symbol)),
            None => unscripted(symbol),
        }
    }
}

fn unscripted(symbol: &Symbol) -> FetchResult {
    FetchResult::Failure {
        symbol: symbol.clone(),
        error: FetchError::empty_payload(),
    }
}

fn synthetic_series(symbol: &Symbol) -> Series {
    let requested_at = UtcDateTime::now();
    let bars = ["2024-01-02", "2024-01-03", "2024-01-04"]
        .iter()
        .enumerate()
        .map(|(index, date)| {
            let base = 100.0 + index as f64;
            DailyBar::new(
                parse_trading_date(date).expect("scripted dates are valid"),
                base,
                base + 1.0,
                base - 1.0,
                base + 0.5,
                base + 0.5,
                10_000 + index as u64,
            )
            .expect("scripted bars are valid")
        })
        .collect();
    Series::from_bars(symbol.clone(), requested_at, bars)
}

impl SeriesFetcher for ScriptedFetcher {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = FetchResult> + Send + 'a>> {
        let result = self.next_for(symbol);
        Box::pin(async move { result })
    }
}
