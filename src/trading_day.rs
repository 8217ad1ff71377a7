//! Trading-day validation against a reference instrument
//!
//! A date counts as a trading day when the reference symbol has a daily bar
//! for it. This follows that one instrument's calendar rather than a full
//! exchange calendar.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::SummaryError;
use crate::pricing::{PriceLookup, PriceSource};

/// Reference symbol used when the configuration names none
pub const DEFAULT_REFERENCE_SYMBOL: &str = "KO";

/// Check `date` against `reference_symbol` over `[date, date + 1)`.
///
/// Returns `SummaryError::InvalidTradingDay` when the source has no data, and
/// the source's own error when the lookup fails.
pub fn ensure_trading_day<S: PriceSource>(
    source: &S,
    reference_symbol: &str,
    date: NaiveDate,
) -> Result<()> {
    let end = next_day(date)?;
    let lookup = source
        .fetch_ohlc(reference_symbol, date, end)
        .with_context(|| {
            format!("Failed to check trading day {} against {}", date, reference_symbol)
        })?;

    match lookup {
        PriceLookup::Priced(_) => {
            debug!("{} is a trading day ({} has data)", date, reference_symbol);
            Ok(())
        }
        PriceLookup::NoData => {
            warn!("{} has no data on {}", reference_symbol, date);
            Err(SummaryError::InvalidTradingDay(date).into())
        }
    }
}

/// Exclusive end of the one-day range starting at `date`
pub fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| SummaryError::InvalidDate(date.to_string()).into())
}

/// Parse a configured `YYYY-MM-DD` date
pub fn parse_report_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| SummaryError::InvalidDate(value.trim().to_string()).into())
}
