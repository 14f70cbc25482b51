//! Outbound request pacing against the upstream quota.
//!
//! Token bucket built from a `(max_requests, window)` budget: bursts up
//! to the full window allowance, then steady refill at
//! `max_requests / window`. An optional second bucket enforces a daily
//! cap (the Alpha Vantage free tier allows 5/minute and 500/day).

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rolling-window request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateBudget {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Alpha Vantage free tier: 5 requests per minute.
    pub const fn alphavantage_free_tier() -> Self {
        Self::new(5, Duration::from_secs(60))
    }

    fn quota(self) -> Quota {
        quota_from_window(self.window, self.max_requests)
    }
}

/// Shared pacer gating every fetch in a run. Safe to call from multiple
/// tasks; governor keeps its token state atomic.
pub struct Pacer {
    window_limiter: DirectRateLimiter,
    daily_limiter: Option<DirectRateLimiter>,
    budget: RateBudget,
    issued: Mutex<VecDeque<Instant>>,
}

impl Pacer {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            window_limiter: RateLimiter::direct(budget.quota()),
            daily_limiter: None,
            budget,
            issued: Mutex::new(VecDeque::new()),
        }
    }

    /// Add a second bucket bounding total requests per 24 hours.
    pub fn with_daily_cap(mut self, max_per_day: u32) -> Self {
        let budget = RateBudget::new(max_per_day, Duration::from_secs(24 * 60 * 60));
        self.daily_limiter = Some(RateLimiter::direct(budget.quota()));
        self
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    /// Waits until a request slot is available under every configured
    /// budget. Never fails, only delays.
    pub async fn acquire(&self) {
        self.window_limiter.until_ready().await;
        if let Some(daily) = &self.daily_limiter {
            daily.until_ready().await;
        }
        self.record_grant();
    }

    /// Window budget still available right now. Observability only; the
    /// authoritative admission decision is `acquire`.
    pub fn remaining(&self) -> u32 {
        let mut issued = self
            .issued
            .lock()
            .expect("grant log lock is not poisoned");
        if let Some(cutoff) = Instant::now().checked_sub(self.budget.window) {
            while issued.front().is_some_and(|&at| at < cutoff) {
                issued.pop_front();
            }
        }
        self.budget.max_requests.saturating_sub(issued.len() as u32)
    }

    fn record_grant(&self) {
        self.issued
            .lock()
            .expect("grant log lock is not poisoned")
            .push_back(Instant::now());
    }
}

fn quota_from_window(window: Duration, max_requests: u32) -> Quota {
    let safe_limit = max_requests.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit is non-zero");

    let seconds_per_cell = (window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_admitted_without_delay() {
        let pacer = Pacer::new(RateBudget::new(3, Duration::from_secs(60)));

        let started = Instant::now();
        for _ in 0..3 {
            pacer.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(pacer.remaining(), 0);
    }

    #[tokio::test]
    async fn fourth_request_waits_for_refill() {
        // 4 per 200ms => one token refills every 50ms.
        let pacer = Pacer::new(RateBudget::new(4, Duration::from_millis(200)));

        let started = Instant::now();
        for _ in 0..5 {
            pacer.acquire().await;
        }
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn remaining_reports_full_budget_when_idle() {
        let pacer = Pacer::new(RateBudget::alphavantage_free_tier());
        assert_eq!(pacer.remaining(), 5);

        pacer.acquire().await;
        assert_eq!(pacer.remaining(), 4);
    }
}
