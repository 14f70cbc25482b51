//! Filesystem persistence for quarry.
//!
//! Scraped series land as one CSV file per symbol per dataset under the
//! quarry home directory. Run checkpoints are JSON documents under
//! `runs/`, keyed by run id.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("no checkpoint found for run '{run_id}'")]
    CheckpointNotFound { run_id: String },
}

/// One persisted row of a daily series. Fields are stringly typed at this
/// layer; domain validation happens in `quarry-core` before rows get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRow {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: u64,
    pub request_time: String,
}

/// A symbol together with the time its record file was last written.
#[derive(Debug, Clone)]
pub struct ScrapedEntry {
    pub symbol: String,
    pub modified: SystemTime,
}

/// CSV-per-symbol record store rooted at the quarry home directory.
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the store at `$QUARRY_HOME`, falling back to `~/.quarry`.
    pub fn open_default() -> Self {
        Self::new(resolve_quarry_home())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join("scraped_data").join(dataset)
    }

    fn series_path(&self, dataset: &str, symbol: &str) -> PathBuf {
        self.dataset_dir(dataset).join(format!("{symbol}.csv"))
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    /// Writes a series, merging with any rows already on disk. Rows are
    /// keyed by date and incoming rows win, so re-scraping a symbol
    /// refreshes overlapping history without losing older dates.
    /// Returns the total number of rows in the file after the merge.
    pub fn write_series(
        &self,
        dataset: &str,
        symbol: &str,
        rows: &[BarRow],
    ) -> Result<usize, StoreError> {
        let path = self.series_path(dataset, symbol);
        let mut merged: BTreeMap<String, BarRow> = BTreeMap::new();

        if path.exists() {
            for row in self.read_series(dataset, symbol)? {
                merged.insert(row.date.clone(), row);
            }
        }
        for row in rows {
            merged.insert(row.date.clone(), row.clone());
        }

        let mut contents = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut contents);
            for row in merged.values() {
                writer.serialize(row)?;
            }
            writer.flush().map_err(StoreError::Io)?;
        }

        write_atomic(&path, &contents)?;
        Ok(merged.len())
    }

    pub fn read_series(&self, dataset: &str, symbol: &str) -> Result<Vec<BarRow>, StoreError> {
        let path = self.series_path(dataset, symbol);
        let contents = fs::read_to_string(&path)?;

        let mut reader = csv::Reader::from_reader(contents.as_bytes());
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Symbols scraped into `dataset`, oldest write first. Symbols that
    /// have never been scraped simply do not appear.
    pub fn scraped_at(&self, dataset: &str) -> Result<Vec<ScrapedEntry>, StoreError> {
        let dir = self.dataset_dir(dataset);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(symbol) = name.to_str().and_then(|n| n.strip_suffix(".csv")) else {
                continue;
            };
            let modified = entry.metadata()?.modified()?;
            entries.push(ScrapedEntry {
                symbol: symbol.to_owned(),
                modified,
            });
        }

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then(a.symbol.cmp(&b.symbol)));
        Ok(entries)
    }

    pub fn save_checkpoint<T: Serialize>(
        &self,
        run_id: &str,
        checkpoint: &T,
    ) -> Result<(), StoreError> {
        let path = self.checkpoint_path(run_id);
        let json = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&path, &json)?;
        Ok(())
    }

    pub fn load_checkpoint(&self, run_id: &str) -> Result<serde_json::Value, StoreError> {
        let path = self.checkpoint_path(run_id);
        if !path.exists() {
            return Err(StoreError::CheckpointNotFound {
                run_id: run_id.to_owned(),
            });
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn remove_checkpoint(&self, run_id: &str) -> Result<(), StoreError> {
        let path = self.checkpoint_path(run_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list_checkpoints(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut run_ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            if let Some(run_id) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                run_ids.push(run_id.to_owned());
            }
        }
        run_ids.sort();
        Ok(run_ids)
    }

    fn checkpoint_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{run_id}.json"))
    }
}

fn resolve_quarry_home() -> PathBuf {
    if let Ok(home) = env::var("QUARRY_HOME") {
        return PathBuf::from(home);
    }
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".quarry")
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().expect("store paths always have a parent");
    fs::create_dir_all(parent)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, close: f64) -> BarRow {
        BarRow {
            date: date.to_owned(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            adjusted_close: close,
            volume: 1_000,
            request_time: String::from("2024-01-05T00:00:00Z"),
        }
    }

    #[test]
    fn writes_and_reads_series_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        let rows = vec![row("2024-01-02", 10.5), row("2024-01-03", 11.0)];
        let written = store
            .write_series("daily", "AAPL", &rows)
            .expect("write should succeed");
        assert_eq!(written, 2);

        let loaded = store.read_series("daily", "AAPL").expect("read back");
        assert_eq!(loaded, rows);
    }

    #[test]
    fn merge_keeps_old_dates_and_prefers_new_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        store
            .write_series("daily", "AAPL", &[row("2024-01-02", 10.0), row("2024-01-03", 11.0)])
            .expect("first write");
        let total = store
            .write_series("daily", "AAPL", &[row("2024-01-03", 99.0), row("2024-01-04", 12.0)])
            .expect("second write");
        assert_eq!(total, 3);

        let loaded = store.read_series("daily", "AAPL").expect("read back");
        let dates: Vec<&str> = loaded.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["2024-01-02", "2024-01-03", "2024-01-04"]);
        assert_eq!(loaded[1].close, 99.0);
    }

    #[test]
    fn string_fields_with_delimiters_survive_the_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        // String columns pass through this layer untyped; the writer must
        // quote them so embedded delimiters cannot shift later fields.
        let mut tricky = row("2024-01-02", 10.5);
        tricky.request_time = String::from("2024-01-05T00:00:00Z,annotated");

        store
            .write_series("daily", "AAPL", &[tricky.clone()])
            .expect("write should succeed");
        let loaded = store.read_series("daily", "AAPL").expect("read back");

        assert_eq!(loaded, vec![tricky]);
    }

    #[test]
    fn scraped_at_lists_symbols_only_for_existing_dataset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        assert!(store.scraped_at("daily").expect("empty listing").is_empty());

        store
            .write_series("daily", "MSFT", &[row("2024-01-02", 300.0)])
            .expect("write");
        let entries = store.scraped_at("daily").expect("listing");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbol, "MSFT");
    }

    #[test]
    fn checkpoint_save_load_and_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvStore::new(dir.path());

        let checkpoint = serde_json::json!({ "state": "interrupted", "pending": ["AAPL"] });
        store
            .save_checkpoint("run-1", &checkpoint)
            .expect("save checkpoint");

        assert_eq!(store.list_checkpoints().expect("list"), vec!["run-1"]);
        assert_eq!(store.load_checkpoint("run-1").expect("load"), checkpoint);

        store.remove_checkpoint("run-1").expect("remove");
        let missing = store.load_checkpoint("run-1").expect_err("must be gone");
        assert!(matches!(missing, StoreError::CheckpointNotFound { .. }));
    }
}
