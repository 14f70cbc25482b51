//! Fetch contracts: one request per symbol, classified outcomes.

mod alphavantage;
mod scripted;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

pub use alphavantage::{AlphaVantageClient, ALPHAVANTAGE_SOURCE, DEFAULT_FUNCTION};
pub use scripted::ScriptedFetcher;

use crate::domain::{Series, Symbol, UtcDateTime};

/// One scrape attempt about to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub requested_at: UtcDateTime,
}

impl FetchRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            requested_at: UtcDateTime::now(),
        }
    }
}

/// Classification of a failed fetch. Everything except an explicit
/// unknown-symbol rejection is treated as transient: the upstream
/// regularly answers throttled callers with empty or notice-only bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    UpstreamStatus,
    Throttled,
    EmptyPayload,
    MalformedPayload,
    UnknownSymbol,
}

/// Structured fetch error surfaced inside `FetchResult::Failure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn upstream_status(status: u16) -> Self {
        Self {
            kind: FetchErrorKind::UpstreamStatus,
            message: format!("upstream returned status {status}"),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Throttled,
            message: message.into(),
        }
    }

    pub fn empty_payload() -> Self {
        Self {
            kind: FetchErrorKind::EmptyPayload,
            message: String::from("upstream returned an empty payload"),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::MalformedPayload,
            message: message.into(),
        }
    }

    pub fn unknown_symbol(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::UnknownSymbol,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the scheduler may re-attempt this symbol.
    pub const fn retryable(&self) -> bool {
        !matches!(self.kind, FetchErrorKind::UnknownSymbol)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Transport => "fetch.transport",
            FetchErrorKind::UpstreamStatus => "fetch.upstream_status",
            FetchErrorKind::Throttled => "fetch.throttled",
            FetchErrorKind::EmptyPayload => "fetch.empty_payload",
            FetchErrorKind::MalformedPayload => "fetch.malformed_payload",
            FetchErrorKind::UnknownSymbol => "fetch.unknown_symbol",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Outcome of one fetch attempt. Fetch clients never panic and never
/// return a bare `Err`; every failure mode lands here so the scheduler
/// can make batch-level decisions.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Success { symbol: Symbol, series: Series },
    Failure { symbol: Symbol, error: FetchError },
}

impl FetchResult {
    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Success { symbol, .. } | Self::Failure { symbol, .. } => symbol,
        }
    }
}

/// Seam between the scheduler and a concrete upstream client.
pub trait SeriesFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = FetchResult> + Send + 'a>>;
}
