use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] quarry_core::ValidationError),

    #[error(transparent)]
    Credential(#[from] quarry_core::CredentialError),

    #[error(transparent)]
    Registry(#[from] quarry_core::RegistryError),

    #[error(transparent)]
    Scrape(#[from] quarry_core::ScrapeError),

    #[error(transparent)]
    Store(#[from] quarry_store::StoreError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Registry(_) => 2,
            Self::Credential(_) => 3,
            Self::Scrape(_) | Self::Store(_) => 4,
            Self::Command(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
