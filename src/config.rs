//! Run configuration
//!
//! A TOML file supplies the database location and the report dates; the CLI
//! can override both. Upper-case key aliases (`PARAMETERS`, `DB_PATH`,
//! `DATES`) are accepted alongside the lower-case names.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::SummaryError;
use crate::pricing::yahoo::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::trading_day::DEFAULT_REFERENCE_SYMBOL;

/// Contents of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default, alias = "PARAMETERS")]
    pub parameters: Parameters,

    #[serde(default, alias = "PRICE_SOURCE")]
    pub price_source: PriceSourceConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parameters {
    #[serde(default, alias = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[serde(default, alias = "DATES")]
    pub dates: Option<DateList>,

    #[serde(default, alias = "REFERENCE_SYMBOL")]
    pub reference_symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceSourceConfig {
    #[serde(default, alias = "BASE_URL")]
    pub base_url: Option<String>,

    #[serde(default, alias = "TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

/// Report dates, either `"2023-01-03,2023-01-04"` or `["2023-01-03", ...]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DateList {
    Joined(String),
    List(Vec<String>),
}

impl DateList {
    /// Entries in order, trimmed, with blanks dropped
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            DateList::Joined(s) => s.split(',').collect(),
            DateList::List(items) => items.iter().map(String::as_str).collect(),
        };
        split_dates(&raw)
    }
}

fn split_dates(raw: &[&str]) -> Vec<String> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated date list as given on the command line
pub fn parse_date_list(value: &str) -> Vec<String> {
    DateList::Joined(value.to_string()).entries()
}

impl ConfigFile {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SummaryError::Config(e.to_string()))
            .context("Invalid configuration file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        debug!("Loaded configuration from {:?}", path);
        Self::from_toml(&content)
    }
}

/// Default configuration path (~/.portfolio-summary/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".portfolio-summary")
            .join("config.toml")
    })
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub dates: Option<Vec<String>>,
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` means the default database location
    pub db_path: Option<PathBuf>,
    pub dates: Vec<String>,
    pub reference_symbol: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Settings {
    /// Merge the configuration file (explicit, else default if present) with
    /// command-line overrides. An explicit config path must exist.
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        let file = match &overrides.config_path {
            Some(path) => ConfigFile::load(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => ConfigFile::load(&path)?,
                None => ConfigFile::default(),
            },
        };

        Ok(Self::from_parts(file, overrides))
    }

    pub fn from_parts(file: ConfigFile, overrides: Overrides) -> Self {
        let dates = overrides
            .dates
            .map(|d| split_dates(&d.iter().map(String::as_str).collect::<Vec<_>>()))
            .or_else(|| file.parameters.dates.as_ref().map(DateList::entries))
            .unwrap_or_default();

        Self {
            db_path: overrides.db_path.or(file.parameters.db_path),
            dates,
            reference_symbol: file
                .parameters
                .reference_symbol
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REFERENCE_SYMBOL.to_string()),
            base_url: file
                .price_source
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                file.price_source
                    .timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}
