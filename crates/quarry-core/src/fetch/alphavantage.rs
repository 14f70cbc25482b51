use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::credentials::CredentialStore;
use crate::domain::{parse_trading_date, DailyBar, Series, Symbol, UtcDateTime};
use crate::error::CredentialError;
use crate::fetch::{FetchError, FetchRequest, FetchResult, SeriesFetcher};
use crate::http::{HttpClient, HttpRequest};

/// Provider name used for credential lookup.
pub const ALPHAVANTAGE_SOURCE: &str = "alphavantage";

/// Default upstream function: full-history adjusted daily series.
pub const DEFAULT_FUNCTION: &str = "TIME_SERIES_DAILY_ADJUSTED";

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Fetch client for the Alpha Vantage daily time-series endpoint.
///
/// Issues exactly one network call per `fetch` and classifies every
/// outcome; retry policy belongs to the scheduler, not here.
#[derive(Clone)]
pub struct AlphaVantageClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
    function: String,
    base_url: String,
}

impl AlphaVantageClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            function: String::from(DEFAULT_FUNCTION),
            base_url: String::from(DEFAULT_BASE_URL),
        }
    }

    /// Resolve the API key up front so a missing credential fails before
    /// any request is issued.
    pub fn from_credentials(
        http: Arc<dyn HttpClient>,
        credentials: &dyn CredentialStore,
    ) -> Result<Self, CredentialError> {
        let api_key = credentials.get(ALPHAVANTAGE_SOURCE)?;
        Ok(Self::new(http, api_key))
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    fn query_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/query?function={}&symbol={}&apikey={}&outputsize=full&datatype=json",
            self.base_url, self.function, symbol, self.api_key
        )
    }

    async fn fetch_series(&self, symbol: &Symbol) -> Result<Series, FetchError> {
        let request = FetchRequest::new(symbol.clone());
        let response = self
            .http
            .execute(HttpRequest::get(self.query_url(symbol)))
            .await
            .map_err(|e| FetchError::transport(e.message()))?;

        if !response.is_success() {
            return Err(FetchError::upstream_status(response.status));
        }

        parse_daily_series(&response.body, symbol, request.requested_at)
    }
}

impl SeriesFetcher for AlphaVantageClient {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = FetchResult> + Send + 'a>> {
        Box::pin(async move {
            match self.fetch_series(symbol).await {
                Ok(series) => {
                    tracing::debug!(symbol = %symbol, rows = series.len(), "fetched series");
                    FetchResult::Success {
                        symbol: symbol.clone(),
                        series,
                    }
                }
                Err(error) => {
                    tracing::debug!(symbol = %symbol, error = %error, "fetch failed");
                    FetchResult::Failure {
                        symbol: symbol.clone(),
                        error,
                    }
                }
            }
        })
    }
}

/// Classify and parse one daily time-series payload.
///
/// The upstream signals problems inside a 200 response: a single
/// `"Note"`/`"Information"` key means the quota was exceeded, an
/// `"Error Message"` key means the symbol (or function) is invalid, and
/// a throttled caller sometimes gets an empty body outright.
fn parse_daily_series(
    body: &str,
    symbol: &Symbol,
    requested_at: UtcDateTime,
) -> Result<Series, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::empty_payload());
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| FetchError::malformed(format!("bad json: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| FetchError::malformed("payload is not a JSON object"))?;

    for notice_key in ["Note", "Information"] {
        if let Some(notice) = object.get(notice_key).and_then(Value::as_str) {
            return Err(FetchError::throttled(notice));
        }
    }
    if let Some(message) = object.get("Error Message").and_then(Value::as_str) {
        return Err(FetchError::unknown_symbol(message));
    }

    let (_, entries) = object
        .iter()
        .find(|(key, _)| key.as_str() != "Meta Data")
        .ok_or_else(|| FetchError::malformed("payload has no time-series object"))?;
    let entries = entries
        .as_object()
        .ok_or_else(|| FetchError::malformed("time-series value is not an object"))?;

    let mut bars = Vec::with_capacity(entries.len());
    for (date_key, fields) in entries {
        bars.push(parse_bar(date_key, fields)?);
    }
    if bars.is_empty() {
        return Err(FetchError::empty_payload());
    }

    Ok(Series::from_bars(symbol.clone(), requested_at, bars))
}

fn parse_bar(date_key: &str, fields: &Value) -> Result<DailyBar, FetchError> {
    let date = parse_trading_date(date_key)
        .map_err(|_| FetchError::malformed(format!("bad trading date '{date_key}'")))?;
    let fields = fields
        .as_object()
        .ok_or_else(|| FetchError::malformed(format!("entry '{date_key}' is not an object")))?;

    let open = price_field(fields, date_key, "1. open")?;
    let high = price_field(fields, date_key, "2. high")?;
    let low = price_field(fields, date_key, "3. low")?;
    let close = price_field(fields, date_key, "4. close")?;
    // Unadjusted functions carry no "5. adjusted close"; fall back to close.
    let adjusted_close = price_field(fields, date_key, "5. adjusted close").unwrap_or(close);
    let volume = volume_field(fields, date_key)?;

    DailyBar::new(date, open, high, low, close, adjusted_close, volume)
        .map_err(|e| FetchError::malformed(format!("invalid bar for '{date_key}': {e}")))
}

fn price_field(fields: &Map<String, Value>, date_key: &str, name: &str) -> Result<f64, FetchError> {
    let value = fields
        .get(name)
        .ok_or_else(|| FetchError::malformed(format!("entry '{date_key}' missing '{name}'")))?;
    numeric(value)
        .ok_or_else(|| FetchError::malformed(format!("entry '{date_key}' has bad '{name}'")))
}

fn volume_field(fields: &Map<String, Value>, date_key: &str) -> Result<u64, FetchError> {
    // Adjusted daily payloads use "6. volume", plain daily uses "5. volume".
    let value = fields
        .get("6. volume")
        .or_else(|| fields.get("5. volume"))
        .ok_or_else(|| FetchError::malformed(format!("entry '{date_key}' missing volume")))?;
    // The `as u64` cast saturates, so a negative or fractional value must
    // be rejected here rather than silently clamped.
    numeric(value)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u64)
        .ok_or_else(|| FetchError::malformed(format!("entry '{date_key}' has bad volume")))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
