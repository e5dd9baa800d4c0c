use std::borrow::Cow;
use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::MarketConfig;
use crate::market_data::validator::CandleValidator;
use crate::models::{Candle, Ticker};

const CANDLES_PATH: &str = "/api/v5/market/candles";
const TICKER_PATH: &str = "/api/v5/market/ticker";
const RATE_LIMIT_PER_SEC: u32 = 20; // Public market data: 40 requests per 2 seconds
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

type OkxRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Standard OKX v5 response envelope
#[derive(Debug, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> OkxResponse<T> {
    fn into_data(self) -> Result<Vec<T>> {
        if self.code != "0" {
            bail!("OKX API error (code {}): {}", self.code, self.msg);
        }
        Ok(self.data)
    }
}

/// One field of a candle row
///
/// The live API sends every field as a string; saved files may carry numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CandleField {
    Text(String),
    Number(serde_json::Number),
}

impl CandleField {
    fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Number(number) => Cow::Owned(number.to_string()),
        }
    }
}

impl From<&str> for CandleField {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    inst_id: String,
    last: String,
    #[serde(default)]
    bid_px: String,
    #[serde(default)]
    ask_px: String,
    #[serde(default, rename = "high24h")]
    high_24h: String,
    #[serde(default, rename = "low24h")]
    low_24h: String,
    #[serde(default, rename = "volCcy24h")]
    vol_ccy_24h: String,
}

/// Client for the OKX public market-data REST API
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct OkxClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<OkxRateLimiter>,
    initial_backoff: Duration,
}

impl OkxClient {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("Invalid proxy URL: {}", proxy_url))?;
            builder = builder.proxy(proxy);
            tracing::info!("Routing OKX requests through proxy {}", proxy_url);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        let per_second = NonZeroU32::new(RATE_LIMIT_PER_SEC)
            .ok_or_else(|| anyhow!("Rate limit must be non-zero"))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first retry delay (doubles on every attempt)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Fetch the most recent `limit` candles, returned oldest first
    pub async fn get_candles(&self, inst_id: &str, bar: &str, limit: u32) -> Result<Vec<Candle>> {
        let query = [
            ("instId", inst_id.to_string()),
            ("bar", bar.to_string()),
            ("limit", limit.to_string()),
        ];
        let response: OkxResponse<Vec<CandleField>> = self.get_json(CANDLES_PATH, &query).await?;
        let candles = parse_candles(response)
            .with_context(|| format!("Failed to parse {} {} candles", inst_id, bar))?;

        tracing::info!("Fetched {} {} candles for {}", candles.len(), bar, inst_id);
        Ok(candles)
    }

    /// Fetch the latest ticker
    pub async fn get_ticker(&self, inst_id: &str) -> Result<Ticker> {
        let query = [("instId", inst_id.to_string())];
        let response: OkxResponse<RawTicker> = self.get_json(TICKER_PATH, &query).await?;
        let ticker = parse_ticker(response)
            .with_context(|| format!("Failed to parse ticker for {}", inst_id))?;

        tracing::info!("Ticker {}: last {}", ticker.inst_id, ticker.last);
        Ok(ticker)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.make_request(path, query).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode OKX response from {}", path))
    }

    /// Make a rate-limited GET with retry on 429, 5xx and network errors
    async fn make_request(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);

        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            let backoff = self.initial_backoff * 2_u32.pow(attempt - 1);

            match self.client.get(&url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if (status.as_u16() == 429 || status.is_server_error()) && attempt < MAX_RETRIES {
                        tracing::warn!(
                            "OKX returned {} for {}, retrying in {}ms (attempt {}/{})",
                            status,
                            path,
                            backoff.as_millis(),
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    bail!("OKX API error ({}): {}", status, error_text);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!(
                        "Network error: {}, retrying in {}ms (attempt {}/{})",
                        e,
                        backoff.as_millis(),
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => bail!("Network error after {} retries: {}", MAX_RETRIES, e),
            }
        }

        bail!("Failed after {} retries", MAX_RETRIES)
    }
}

/// Convert an OKX candles response (newest first) into validated chronological candles
pub fn parse_candles(response: OkxResponse<Vec<CandleField>>) -> Result<Vec<Candle>> {
    let rows = response.into_data()?;

    let mut candles = rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_candle_row(row).with_context(|| format!("Malformed candle row {}", i)))
        .collect::<Result<Vec<_>>>()?;

    // OKX returns newest first
    candles.reverse();

    CandleValidator::new().validate_series(&candles)?;
    Ok(candles)
}

/// Parse `[ts, o, h, l, c, vol, ...]`
pub fn parse_candle_row(row: &[CandleField]) -> Result<Candle> {
    if row.len() < 6 {
        bail!("Expected at least 6 fields, got {}", row.len());
    }

    let ts = row[0].to_text();
    let timestamp = ts
        .parse::<i64>()
        .with_context(|| format!("Invalid timestamp: {}", ts))?;

    Ok(Candle {
        timestamp,
        open: parse_decimal("open", &row[1].to_text())?,
        high: parse_decimal("high", &row[2].to_text())?,
        low: parse_decimal("low", &row[3].to_text())?,
        close: parse_decimal("close", &row[4].to_text())?,
        volume: parse_decimal("volume", &row[5].to_text())?,
    })
}

fn parse_ticker(response: OkxResponse<RawTicker>) -> Result<Ticker> {
    let raw = response
        .into_data()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Ticker response contained no data"))?;

    Ok(Ticker {
        last: parse_decimal("last", &raw.last)?,
        bid: parse_optional_decimal(&raw.bid_px)?,
        ask: parse_optional_decimal(&raw.ask_px)?,
        high_24h: parse_optional_decimal(&raw.high_24h)?,
        low_24h: parse_optional_decimal(&raw.low_24h)?,
        volume_ccy_24h: parse_optional_decimal(&raw.vol_ccy_24h)?,
        inst_id: raw.inst_id,
    })
}

/// Load a saved OKX candles response (the raw JSON body) from disk
pub fn load_candles_file(path: &Path) -> Result<Vec<Candle>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let response: OkxResponse<Vec<CandleField>> = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse {} as an OKX candles response", path.display()))?;
    parse_candles(response)
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("Invalid {}: {:?}", field, value))
}

/// OKX sends empty strings for fields it has no value for
fn parse_optional_decimal(value: &str) -> Result<Decimal> {
    if value.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(value).with_context(|| format!("Invalid decimal: {:?}", value))
}
