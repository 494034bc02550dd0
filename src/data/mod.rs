//! Market-data provider seam.
//!
//! The run only needs one capability from a provider: given a ticker, return
//! the day's implied-volatility figures or a typed failure. Keeping the seam
//! this small lets tests substitute an in-memory double for the network.

pub mod yahoo;

use async_trait::async_trait;
use thiserror::Error;

/// Implied-volatility figures for one ticker, as returned by a provider.
///
/// `implied_volatility` is in percent. It is absent when the provider
/// answered but had no usable option data; rank and percentile are absent
/// whenever the price history needed to derive them is unavailable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IvQuote {
    /// Volume-weighted IV of the nearest-expiry calls, in percent.
    pub implied_volatility: Option<f64>,
    /// Position of today's IV inside the trailing year's volatility range.
    pub iv_rank: Option<f64>,
    /// Share of the trailing year's volatility observations below today's IV.
    pub iv_percentile: Option<f64>,
}

/// Errors from a market-data provider, scoped to a single ticker.
///
/// These are recoverable at run granularity: the run records the failure and
/// moves on to the next ticker.
#[derive(Debug, Error)]
pub enum DataFetchError {
    /// Network-level failure reaching the provider.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The provider answered with an error status.
    #[error("provider API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Short description of the failure.
        message: String,
    },

    /// The provider does not know the ticker.
    #[error("unrecognized ticker: {ticker}")]
    UnknownTicker {
        /// The symbol the provider rejected.
        ticker: String,
    },

    /// The provider's response could not be decoded.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl DataFetchError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// True when a retry might succeed (connection trouble, throttling, 5xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DataFetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Capability: fetch the day's IV figures for one ticker.
#[async_trait]
pub trait IvProvider: Send + Sync {
    /// Fetch implied-volatility figures for `ticker`.
    async fn fetch_iv(&self, ticker: &str) -> Result<IvQuote, DataFetchError>;
}
