use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{self, EnvFilter};

use ivtrack::config::Config;
use ivtrack::data::yahoo::YahooProvider;
use ivtrack::run;
use ivtrack::sheets::auth::ServiceAccountKey;
use ivtrack::sheets::google::GoogleSheets;

#[derive(Parser)]
#[command(
    name = "ivtrack",
    about = "Fetch the day's implied volatility for configured tickers and append it to a Google Sheet"
)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    tracing::info!(
        tickers = config.tickers.len(),
        spreadsheet_id = %config.spreadsheet_id,
        "starting IV update run"
    );

    let provider = YahooProvider::new()?;
    let key = ServiceAccountKey::from_env()?;
    let writer = GoogleSheets::new(&key, config.spreadsheet_id.clone(), config.sheet_name.clone())?;

    let summary = run::run(&config, &provider, &writer).await?;

    if summary.fetch_failures.is_empty() {
        tracing::info!(rows_appended = summary.rows_appended, "run finished");
    } else {
        let failed: Vec<&str> = summary
            .fetch_failures
            .iter()
            .map(|(ticker, _)| ticker.as_str())
            .collect();
        tracing::warn!(
            rows_appended = summary.rows_appended,
            fetch_failures = summary.fetch_failures.len(),
            ?failed,
            "run finished with fetch failures"
        );
    }

    Ok(())
}
