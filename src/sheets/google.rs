//! Google Sheets v4 REST writer.
//!
//! Mirrors the manual workflow the sheet was maintained with: check the
//! first row, rewrite it when it does not match the expected header, then
//! append data rows below whatever is already there. Appending never
//! overwrites — rerunning a day adds a second set of rows.
//!
//! The bearer token is fetched lazily on the first write call, so building
//! the writer performs no network I/O.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::auth::{ServiceAccountKey, SheetsAuth};
use super::{SheetWriter, WriteError};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Sheet writer bound to one spreadsheet and worksheet.
pub struct GoogleSheets {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    auth: SheetsAuth,
    token: OnceCell<String>,
}

impl GoogleSheets {
    /// Build a writer for `sheet_name` inside `spreadsheet_id`.
    pub fn new(
        key: &ServiceAccountKey,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Result<Self, WriteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| WriteError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            auth: SheetsAuth::new(key)?,
            token: OnceCell::new(),
        })
    }

    /// Points the writer at a different base URL. Used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Bearer token, exchanged once per run on first use.
    async fn token(&self) -> Result<&str, WriteError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let token = self.auth.fetch_token(&self.client).await?;
                tracing::info!(
                    spreadsheet_id = %self.spreadsheet_id,
                    "authenticated to the spreadsheet service"
                );
                Ok::<_, WriteError>(token)
            })
            .await?;
        Ok(token.as_str())
    }

    fn values_url(&self, range_suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{range_suffix}",
            self.base_url, self.spreadsheet_id, self.sheet_name
        )
    }

    /// Map a non-success status to the writer error taxonomy.
    async fn check_response(&self, resp: reqwest::Response) -> Result<reqwest::Response, WriteError> {
        let status = resp.status().as_u16();
        match status {
            s if (200..300).contains(&s) => Ok(resp),
            401 | 403 => {
                let body = resp.text().await.unwrap_or_default();
                Err(WriteError::Authentication(format!(
                    "service rejected the request ({status}): {body}"
                )))
            }
            404 => Err(WriteError::SpreadsheetNotFound {
                spreadsheet_id: self.spreadsheet_id.clone(),
            }),
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(WriteError::api(s, body))
            }
        }
    }

    async fn read_header(&self) -> Result<Vec<String>, WriteError> {
        let token = self.token().await?.to_string();
        let resp = self
            .client
            .get(self.values_url("!1:1"))
            .bearer_auth(token)
            .send()
            .await?;
        let resp = self.check_response(resp).await?;

        let range: ValueRange = resp
            .json()
            .await
            .map_err(|e| WriteError::Malformed(format!("header read decode failed: {e}")))?;
        Ok(range.values.into_iter().next().unwrap_or_default())
    }

    async fn write_header(&self, header: &[String]) -> Result<(), WriteError> {
        let token = self.token().await?.to_string();
        let resp = self
            .client
            .put(self.values_url("!A1"))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({ "values": [header] }))
            .send()
            .await?;
        self.check_response(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl SheetWriter for GoogleSheets {
    async fn ensure_header(&self, header: &[String]) -> Result<(), WriteError> {
        let current = self.read_header().await?;
        if current == header {
            return Ok(());
        }
        tracing::info!(sheet = %self.sheet_name, "header row missing or stale, rewriting");
        self.write_header(header).await
    }

    async fn append_row(&self, row: &[String]) -> Result<(), WriteError> {
        let token = self.token().await?.to_string();
        let resp = self
            .client
            .post(self.values_url("!A1:append"))
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        self.check_response(resp).await?;
        Ok(())
    }
}
