//! Yahoo Finance market-data provider.
//!
//! One ticker, two requests:
//!
//! - **Option chain** — the `v7/finance/options` endpoint returns the
//!   nearest listed expiration when no date filter is given. The day's IV is
//!   the volume-weighted average of that chain's call IVs, falling back to
//!   the unweighted mean when no volume traded.
//! - **Price history** — one year of daily closes from the chart endpoint
//!   feeds the rolling historical-volatility series behind the IV rank and
//!   IV percentile columns. History trouble degrades those columns to `N/A`
//!   instead of failing the ticker.
//!
//! Transient failures (connection errors, 429, 5xx) get a single retry; the
//! daily schedule is the retry mechanism for anything beyond that.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

use super::{DataFetchError, IvProvider, IvQuote};
use crate::stats;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 1;
const RETRY_DELAY_SECS: u64 = 2;
const HISTORY_RANGE: &str = "1y";
const HISTORY_INTERVAL: &str = "1d";

// Yahoo rejects requests without a browser-looking user agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: OptionChain,
}

#[derive(Debug, Deserialize)]
struct OptionChain {
    #[serde(default)]
    result: Vec<OptionChainResult>,
}

#[derive(Debug, Deserialize)]
struct OptionChainResult {
    #[serde(default)]
    options: Vec<OptionQuotes>,
}

#[derive(Debug, Deserialize)]
struct OptionQuotes {
    #[serde(default)]
    calls: Vec<OptionContract>,
}

#[derive(Debug, Deserialize)]
struct OptionContract {
    #[serde(rename = "impliedVolatility")]
    implied_volatility: Option<f64>,
    volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// IV provider backed by Yahoo Finance's quote endpoints.
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    /// Create a provider against the public Yahoo endpoints.
    pub fn new() -> Result<Self, DataFetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataFetchError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the provider at a different base URL. Used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // -- HTTP ---------------------------------------------------------------

    /// GET with a single retry on transient failures.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, DataFetchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.client.get(url).query(query).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if (status == 429 || status >= 500) && attempt < MAX_RETRIES {
                        tracing::warn!(
                            "provider returned {status}, retrying in {RETRY_DELAY_SECS}s \
                             (attempt {}/{MAX_RETRIES})",
                            attempt + 1
                        );
                        sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) if attempt < MAX_RETRIES => {
                    tracing::warn!(
                        "provider request error, retrying in {RETRY_DELAY_SECS}s \
                         (attempt {}/{MAX_RETRIES}): {err}",
                        attempt + 1
                    );
                    sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Map a non-success status to the provider error taxonomy.
    fn check_response(ticker: &str, status: u16) -> Result<(), DataFetchError> {
        match status {
            s if (200..300).contains(&s) => Ok(()),
            401 | 403 => Err(DataFetchError::api(
                status,
                "provider rejected the request (authentication or access)",
            )),
            404 => Err(DataFetchError::UnknownTicker {
                ticker: ticker.to_string(),
            }),
            429 => Err(DataFetchError::api(status, "provider rate limit exceeded")),
            s if s >= 500 => Err(DataFetchError::api(status, "provider server error")),
            s => Err(DataFetchError::api(s, "unexpected provider status")),
        }
    }

    /// Fetch the nearest-expiry call contracts for a ticker.
    async fn fetch_nearest_calls(&self, ticker: &str) -> Result<Vec<OptionContract>, DataFetchError> {
        let url = format!("{}/v7/finance/options/{ticker}", self.base_url);
        let resp = self.get_with_retry(&url, &[]).await?;
        Self::check_response(ticker, resp.status().as_u16())?;

        let body: OptionsResponse = resp
            .json()
            .await
            .map_err(|e| DataFetchError::Malformed(format!("option chain decode failed: {e}")))?;

        // An empty result set is how the endpoint answers for symbols it
        // does not know.
        let Some(chain) = body.option_chain.result.into_iter().next() else {
            return Err(DataFetchError::UnknownTicker {
                ticker: ticker.to_string(),
            });
        };

        Ok(chain
            .options
            .into_iter()
            .next()
            .map(|quotes| quotes.calls)
            .unwrap_or_default())
    }

    /// Fetch one year of daily closes. Sessions without a close are skipped.
    async fn fetch_daily_closes(&self, ticker: &str) -> Result<Vec<f64>, DataFetchError> {
        let url = format!("{}/v8/finance/chart/{ticker}", self.base_url);
        let resp = self
            .get_with_retry(&url, &[("range", HISTORY_RANGE), ("interval", HISTORY_INTERVAL)])
            .await?;
        Self::check_response(ticker, resp.status().as_u16())?;

        let body: ChartResponse = resp
            .json()
            .await
            .map_err(|e| DataFetchError::Malformed(format!("price history decode failed: {e}")))?;

        let closes = body
            .chart
            .result
            .into_iter()
            .next()
            .and_then(|r| r.indicators.quote.into_iter().next())
            .map(|q| q.close.into_iter().flatten().collect())
            .unwrap_or_default();

        Ok(closes)
    }
}

#[async_trait]
impl IvProvider for YahooProvider {
    async fn fetch_iv(&self, ticker: &str) -> Result<IvQuote, DataFetchError> {
        let calls = self.fetch_nearest_calls(ticker).await?;
        let current_iv = weighted_call_iv(&calls).map(|iv| iv * 100.0);

        let Some(iv) = current_iv else {
            tracing::warn!(%ticker, "no usable option data, IV unavailable");
            return Ok(IvQuote::default());
        };

        // Rank/percentile need the trailing year of closes. Losing them is a
        // degraded record, not a fetch failure.
        let (iv_rank, iv_percentile) = match self.fetch_daily_closes(ticker).await {
            Ok(closes) => {
                let returns = stats::log_returns(&closes);
                let history =
                    stats::rolling_annualized_volatility(&returns, stats::ROLLING_WINDOW);
                (stats::iv_rank(&history, iv), stats::iv_percentile(&history, iv))
            }
            Err(err) => {
                tracing::warn!(%ticker, "price history unavailable, skipping IV rank: {err}");
                (None, None)
            }
        };

        Ok(IvQuote {
            implied_volatility: Some(iv),
            iv_rank,
            iv_percentile,
        })
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Volume-weighted average IV over a call chain, as a fraction.
///
/// Contracts without an IV are ignored; when no contract traded volume the
/// unweighted mean is used instead.
fn weighted_call_iv(calls: &[OptionContract]) -> Option<f64> {
    let quoted: Vec<(f64, f64)> = calls
        .iter()
        .filter_map(|c| {
            c.implied_volatility
                .map(|iv| (iv, c.volume.unwrap_or(0) as f64))
        })
        .collect();
    if quoted.is_empty() {
        return None;
    }

    let total_volume: f64 = quoted.iter().map(|(_, vol)| vol).sum();
    if total_volume > 0.0 {
        Some(quoted.iter().map(|(iv, vol)| iv * vol).sum::<f64>() / total_volume)
    } else {
        Some(quoted.iter().map(|(iv, _)| iv).sum::<f64>() / quoted.len() as f64)
    }
}
