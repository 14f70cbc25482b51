use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::domain::{Symbol, UtcDateTime};
use crate::error::ValidationError;

const TRADING_DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Parse an upstream `YYYY-MM-DD` trading-day key.
pub fn parse_trading_date(input: &str) -> Result<Date, ValidationError> {
    Date::parse(input, TRADING_DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
    })
}

/// One trading day of OHLCV data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: u64,
}

impl DailyBar {
    pub fn new(
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        adjusted_close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
            ("adjusted_close", adjusted_close),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteValue { field });
            }
            if value < 0.0 {
                return Err(ValidationError::NegativeValue { field });
            }
        }
        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }
        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            adjusted_close,
            volume,
        })
    }

    pub fn date_string(&self) -> String {
        self.date
            .format(TRADING_DATE_FORMAT)
            .expect("dates are formattable")
    }
}

/// Per-symbol time series, ascending by date, one bar per trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    symbol: Symbol,
    requested_at: UtcDateTime,
    bars: Vec<DailyBar>,
}

impl Series {
    /// Build a series from bars in any order. Bars are sorted ascending
    /// by date; when two bars share a date the first one wins.
    pub fn from_bars(symbol: Symbol, requested_at: UtcDateTime, bars: Vec<DailyBar>) -> Self {
        let mut by_date: BTreeMap<Date, DailyBar> = BTreeMap::new();
        for bar in bars {
            by_date.entry(bar.date).or_insert(bar);
        }
        Self {
            symbol,
            requested_at,
            bars: by_date.into_values().collect(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn requested_at(&self) -> UtcDateTime {
        self.requested_at
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
