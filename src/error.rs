//! Error handling for the daily portfolio summary
//!
//! Defines the typed failures a run can hit and establishes a unified Result
//! type using anyhow for context chaining and error propagation.

use chrono::NaiveDate;
use thiserror::Error;

/// Core error types for a summary run
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("the date provided ({0}) is not a valid trading day")]
    InvalidTradingDay(NaiveDate),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pricing error: {0}")]
    Pricing(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Result type alias for summary operations
pub type Result<T> = anyhow::Result<T>;
