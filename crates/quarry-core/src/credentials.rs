//! API credential storage keyed by source name.
//!
//! The store is injected into fetch clients rather than consulted through
//! process-wide globals, so tests can run against fixed keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::CredentialError;

/// Opaque key-value credential storage, keyed by provider name.
pub trait CredentialStore: Send + Sync {
    fn save(&self, source: &str, key: &str) -> Result<(), CredentialError>;
    fn get(&self, source: &str) -> Result<String, CredentialError>;
}

/// JSON file store, one document mapping source name to API key.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Conventional location inside a quarry home directory.
    pub fn in_home(home: &Path) -> Self {
        Self::new(home.join("credentials.json"))
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, source: &str, key: &str) -> Result<(), CredentialError> {
        let mut saved = self.load()?;
        saved.insert(source.to_owned(), key.to_owned());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&saved)?)?;
        Ok(())
    }

    fn get(&self, source: &str) -> Result<String, CredentialError> {
        self.load()?
            .get(source)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                source_name: source.to_owned(),
            })
    }
}

/// In-memory store for tests and one-off sessions.
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    keys: Mutex<BTreeMap<String, String>>,
}

impl StaticCredentialStore {
    pub fn with(source: &str, key: &str) -> Self {
        let store = Self::default();
        store
            .save(source, key)
            .expect("in-memory save cannot fail");
        store
    }
}

impl CredentialStore for StaticCredentialStore {
    fn save(&self, source: &str, key: &str) -> Result<(), CredentialError> {
        self.keys
            .lock()
            .expect("credential map lock is not poisoned")
            .insert(source.to_owned(), key.to_owned());
        Ok(())
    }

    fn get(&self, source: &str) -> Result<String, CredentialError> {
        self.keys
            .lock()
            .expect("credential map lock is not poisoned")
            .get(source)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                source_name: source.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::in_home(dir.path());

        store.save("alphavantage", "key-1").expect("save");
        store.save("alphavantage", "key-2").expect("overwrite");
        store.save("polygon", "other").expect("second source");

        assert_eq!(store.get("alphavantage").expect("get"), "key-2");
        assert_eq!(store.get("polygon").expect("get"), "other");
    }

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::in_home(dir.path());

        let err = store.get("alphavantage").expect_err("must fail");
        assert!(matches!(err, CredentialError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "no credentials saved for source 'alphavantage'"
        );
    }

    #[test]
    fn static_store_serves_fixed_key() {
        let store = StaticCredentialStore::with("alphavantage", "demo");
        assert_eq!(store.get("alphavantage").expect("get"), "demo");
    }
}
