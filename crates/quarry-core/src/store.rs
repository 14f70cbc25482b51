//! Record-store seam between the scheduler and persistence.

use std::sync::Mutex;

use quarry_store::{BarRow, CsvStore, StoreError};

use crate::domain::{Series, Symbol};

/// Accepts one series write per symbol per run. Writes for different
/// symbols are independent; the scheduler never writes the same symbol
/// twice in one run.
pub trait RecordStore: Send + Sync {
    fn persist(&self, series: &Series) -> Result<(), StoreError>;
}

/// CSV-per-symbol store bound to one dataset (upstream function name).
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    store: CsvStore,
    dataset: String,
}

impl CsvRecordStore {
    pub fn new(store: CsvStore, dataset: impl Into<String>) -> Self {
        Self {
            store,
            dataset: dataset.into(),
        }
    }
}

impl RecordStore for CsvRecordStore {
    fn persist(&self, series: &Series) -> Result<(), StoreError> {
        let request_time = series.requested_at().format_rfc3339();
        let rows: Vec<BarRow> = series
            .bars()
            .iter()
            .map(|bar| BarRow {
                date: bar.date_string(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                adjusted_close: bar.adjusted_close,
                volume: bar.volume,
                request_time: request_time.clone(),
            })
            .collect();

        self.store
            .write_series(&self.dataset, series.symbol().as_str(), &rows)?;
        Ok(())
    }
}

/// In-memory store recording every persisted series, for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    writes: Mutex<Vec<Series>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes
            .lock()
            .expect("write log lock is not poisoned")
            .len()
    }

    pub fn writes_for(&self, symbol: &Symbol) -> usize {
        self.writes
            .lock()
            .expect("write log lock is not poisoned")
            .iter()
            .filter(|series| series.symbol() == symbol)
            .count()
    }
}

impl RecordStore for MemoryStore {
    fn persist(&self, series: &Series) -> Result<(), StoreError> {
        self.writes
            .lock()
            .expect("write log lock is not poisoned")
            .push(series.clone());
        Ok(())
    }
}
