use thiserror::Error;

/// Validation and contract errors exposed by `quarry-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,
}

/// Credential lookup and persistence errors. A missing key is fatal to a
/// scrape run before any request is issued.
#[derive(Debug, Error)]
pub enum CredentialError {
    // Field is deliberately not named `source`; thiserror would treat
    // that as the error's cause.
    #[error("no credentials saved for source '{source_name}'")]
    NotFound { source_name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Symbol registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown bulk symbol list '{name}'")]
    UnknownList { name: String },
}

/// Run-fatal scheduler errors. Per-symbol fetch failures are not errors
/// at this level; they are recorded in the run and reported per symbol.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] quarry_store::StoreError),

    #[error("run '{run_id}' cannot be resumed from state '{state}'")]
    NotResumable { run_id: String, state: String },
}
