//! Run configuration: the ticker list and the target spreadsheet.
//!
//! Loaded once per run from a TOML file and immutable afterwards. A bad
//! config is fatal and is reported before any network call is made.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Worksheet used when the config does not name one.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or is missing required fields.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The ticker list is empty; a run would do nothing.
    #[error("config contains an empty ticker list")]
    NoTickers,

    /// The same ticker appears more than once.
    #[error("duplicate ticker in config: {0}")]
    DuplicateTicker(String),

    /// A required field is present but blank.
    #[error("config field must not be blank: {0}")]
    BlankField(&'static str),
}

/// Parsed configuration for a single run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Tickers to fetch, in the order their rows will be written.
    pub tickers: Vec<String>,
    /// Identifier of the target spreadsheet.
    pub spreadsheet_id: String,
    /// Worksheet inside the spreadsheet.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce the data-model invariants: non-empty, unique, non-blank tickers
    /// and a non-blank spreadsheet id.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::BlankField("spreadsheet_id"));
        }
        if self.sheet_name.trim().is_empty() {
            return Err(ConfigError::BlankField("sheet_name"));
        }
        let mut seen = HashSet::new();
        for ticker in &self.tickers {
            if ticker.trim().is_empty() {
                return Err(ConfigError::BlankField("tickers"));
            }
            if !seen.insert(ticker.as_str()) {
                return Err(ConfigError::DuplicateTicker(ticker.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_valid_config() {
        let file = write_config(
            r#"
            tickers = ["AAPL", "MSFT"]
            spreadsheet_id = "abc123"
            sheet_name = "IV"
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.spreadsheet_id, "abc123");
        assert_eq!(config.sheet_name, "IV");
    }

    #[test]
    fn sheet_name_defaults_when_omitted() {
        let file = write_config(
            r#"
            tickers = ["AAPL"]
            spreadsheet_id = "abc123"
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sheet_name, DEFAULT_SHEET_NAME);
    }

    #[test]
    fn missing_spreadsheet_id_is_a_parse_error() {
        let file = write_config(r#"tickers = ["AAPL"]"#);
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("spreadsheet_id"));
    }

    #[test]
    fn empty_ticker_list_rejected() {
        let file = write_config(
            r#"
            tickers = []
            spreadsheet_id = "abc123"
            "#,
        );
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::NoTickers)
        ));
    }

    #[test]
    fn duplicate_ticker_rejected() {
        let file = write_config(
            r#"
            tickers = ["AAPL", "MSFT", "AAPL"]
            spreadsheet_id = "abc123"
            "#,
        );
        match Config::load(file.path()) {
            Err(ConfigError::DuplicateTicker(t)) => assert_eq!(t, "AAPL"),
            other => panic!("expected duplicate-ticker error, got {other:?}"),
        }
    }

    #[test]
    fn blank_spreadsheet_id_rejected() {
        let file = write_config(
            r#"
            tickers = ["AAPL"]
            spreadsheet_id = "  "
            "#,
        );
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::BlankField("spreadsheet_id"))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Path::new("/nonexistent/ivtrack.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
