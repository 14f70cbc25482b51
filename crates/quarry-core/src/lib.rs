//! Core engine for quarry.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Credential storage for upstream API keys
//! - HTTP transport seam and the Alpha Vantage fetch client
//! - Token-bucket request pacing
//! - The symbol registry and bulk-list resolution
//! - The scrape scheduler: runs, retries, checkpoints, cancellation

pub mod backoff;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod http;
pub mod pacing;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use backoff::Backoff;
pub use credentials::{CredentialStore, FileCredentialStore, StaticCredentialStore};
pub use domain::{DailyBar, Series, Symbol, UtcDateTime};
pub use error::{CredentialError, RegistryError, ScrapeError, ValidationError};
pub use fetch::{
    AlphaVantageClient, FetchError, FetchErrorKind, FetchRequest, FetchResult, ScriptedFetcher,
    SeriesFetcher, ALPHAVANTAGE_SOURCE, DEFAULT_FUNCTION,
};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use pacing::{Pacer, RateBudget};
pub use registry::SymbolRegistry;
pub use scheduler::{
    plan_order, CancelHandle, RunState, RunStatus, SchedulerConfig, ScrapeRun, ScrapeScheduler,
    SymbolProgress, SymbolState,
};
pub use store::{CsvRecordStore, MemoryStore, RecordStore};
