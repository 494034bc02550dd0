//! The run pipeline: fetch every configured ticker, build rows, append them.
//!
//! One straight line per invocation. Per-ticker fetch failures are collected
//! and reported in the summary instead of aborting the run; a write failure
//! is fatal and reports how many rows had already been appended.

use chrono::Utc;
use thiserror::Error;

use crate::config::Config;
use crate::data::{DataFetchError, IvProvider, IvQuote};
use crate::rows::{self, IvRecord};
use crate::sheets::{SheetWriter, WriteError};

/// Fatal failure of the write step. Rows appended before the failure stay
/// appended; the count is part of the report.
#[derive(Debug, Error)]
#[error("sheet update failed after appending {rows_appended} of {rows_total} rows: {source}")]
pub struct RunError {
    /// Rows that made it into the sheet before the failure.
    pub rows_appended: usize,
    /// Rows the run intended to append.
    pub rows_total: usize,
    /// The underlying write failure.
    #[source]
    pub source: WriteError,
}

/// What a completed run did.
#[derive(Debug)]
pub struct RunSummary {
    /// Rows appended to the sheet.
    pub rows_appended: usize,
    /// Per-ticker fetch failures, in configuration order.
    pub fetch_failures: Vec<(String, DataFetchError)>,
}

/// Execute one scheduled run against the given provider and writer.
///
/// Fetches are sequential in configuration order. When every fetch fails
/// there is nothing to write and the sheet is left untouched.
pub async fn run(
    config: &Config,
    provider: &dyn IvProvider,
    writer: &dyn SheetWriter,
) -> Result<RunSummary, RunError> {
    let run_date = Utc::now().date_naive();

    let mut quotes: Vec<(String, IvQuote)> = Vec::new();
    let mut failures: Vec<(String, DataFetchError)> = Vec::new();
    for ticker in &config.tickers {
        tracing::info!(%ticker, "fetching implied volatility");
        match provider.fetch_iv(ticker).await {
            Ok(quote) => {
                tracing::info!(
                    %ticker,
                    iv = ?quote.implied_volatility,
                    iv_rank = ?quote.iv_rank,
                    iv_percentile = ?quote.iv_percentile,
                    "fetch succeeded"
                );
                quotes.push((ticker.clone(), quote));
            }
            Err(err) => {
                tracing::warn!(%ticker, "fetch failed: {err}");
                failures.push((ticker.clone(), err));
            }
        }
    }

    let records = rows::build_records(run_date, &quotes);
    if records.is_empty() {
        tracing::warn!("no IV data fetched, skipping sheet update");
        return Ok(RunSummary {
            rows_appended: 0,
            fetch_failures: failures,
        });
    }

    let rows_appended = append_records(writer, &records).await?;

    Ok(RunSummary {
        rows_appended,
        fetch_failures: failures,
    })
}

/// Ensure the header, then append each record in order. Returns the number
/// of rows appended; on failure the error carries that count instead.
async fn append_records(
    writer: &dyn SheetWriter,
    records: &[IvRecord],
) -> Result<usize, RunError> {
    let rows_total = records.len();

    writer
        .ensure_header(&rows::header_cells())
        .await
        .map_err(|source| RunError {
            rows_appended: 0,
            rows_total,
            source,
        })?;

    let mut rows_appended = 0;
    for record in records {
        writer
            .append_row(&record.cells())
            .await
            .map_err(|source| RunError {
                rows_appended,
                rows_total,
                source,
            })?;
        rows_appended += 1;
    }

    tracing::info!(rows_appended, "sheet update complete");
    Ok(rows_appended)
}
