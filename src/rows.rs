//! Row building: per-ticker fetch results become spreadsheet rows.
//!
//! Pure transformation, no I/O. Every run writes one row per successfully
//! fetched ticker, stamped with the run's date; figures the provider could
//! not supply render as `N/A`.

use chrono::NaiveDate;

use crate::data::IvQuote;

/// Column layout of the target sheet.
pub const HEADER: [&str; 5] = ["Date", "Ticker", "IV", "IV Rank", "IV Percentile"];

/// One sheet row: a ticker's IV figures on a given date.
#[derive(Debug, Clone, PartialEq)]
pub struct IvRecord {
    /// The run's calendar date.
    pub date: NaiveDate,
    /// Ticker symbol, as configured.
    pub ticker: String,
    /// Implied volatility in percent, absent when unavailable.
    pub implied_volatility: Option<f64>,
    /// IV rank in percent, absent when underivable.
    pub iv_rank: Option<f64>,
    /// IV percentile in percent, absent when underivable.
    pub iv_percentile: Option<f64>,
}

impl IvRecord {
    /// Render the record as sheet cells, in header order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.ticker.clone(),
            format_figure(self.implied_volatility),
            format_figure(self.iv_rank),
            format_figure(self.iv_percentile),
        ]
    }
}

/// The header row as owned cells.
pub fn header_cells() -> Vec<String> {
    HEADER.iter().map(|h| (*h).to_string()).collect()
}

/// Build the run's records from per-ticker quotes, preserving fetch order.
pub fn build_records(date: NaiveDate, quotes: &[(String, IvQuote)]) -> Vec<IvRecord> {
    quotes
        .iter()
        .map(|(ticker, quote)| IvRecord {
            date,
            ticker: ticker.clone(),
            implied_volatility: quote.implied_volatility,
            iv_rank: quote.iv_rank,
            iv_percentile: quote.iv_percentile,
        })
        .collect()
}

fn format_figure(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}
