//! Spreadsheet writer seam.
//!
//! The run needs two capabilities from a sheet: make sure the header row is
//! in place, and append one data row. Both are behind a trait so tests can
//! record writes in memory instead of hitting the network.

pub mod auth;
pub mod google;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the spreadsheet service. Fatal for the run once raised:
/// already-appended rows stay appended and the failure is reported.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Credentials are missing from the environment.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The service rejected the credentials or the token exchange failed.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The service-account key could not be used for signing.
    #[error("signing error: {0}")]
    Signing(String),

    /// The target spreadsheet or worksheet does not exist or is not shared
    /// with the service account.
    #[error("spreadsheet not reachable: {spreadsheet_id}")]
    SpreadsheetNotFound {
        /// The configured spreadsheet id.
        spreadsheet_id: String,
    },

    /// The service answered with an error status.
    #[error("sheets API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Short description of the failure.
        message: String,
    },

    /// Network-level failure reaching the service.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The service's response could not be decoded.
    #[error("malformed service response: {0}")]
    Malformed(String),
}

impl WriteError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for WriteError {
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

/// Capability: append rows to one worksheet.
#[async_trait]
pub trait SheetWriter: Send + Sync {
    /// Make sure the worksheet's first row equals `header`, rewriting it if
    /// it is missing or stale.
    async fn ensure_header(&self, header: &[String]) -> Result<(), WriteError>;

    /// Append one row below the worksheet's existing content.
    async fn append_row(&self, row: &[String]) -> Result<(), WriteError>;
}
