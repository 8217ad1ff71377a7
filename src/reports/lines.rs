use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::{finish_step, ItemOutcome, StepReport};
use crate::db::{self, Holding, ReportLine, Table};
use crate::pricing::{Ohlc, PriceLookup, PriceSource};
use crate::trading_day::next_day;
use crate::utils::round_money;

/// Value a holding at the given per-share prices.
///
/// Cash is worth its own quantity at every point of the day; `prices` is
/// ignored for it. Other holdings need prices and are valued at
/// quantity x price, rounded to cents.
pub fn value_holding(date: NaiveDate, holding: &Holding, prices: Option<Ohlc>) -> Option<ReportLine> {
    let values = if holding.is_cash() {
        Ohlc {
            open: holding.quantity,
            high: holding.quantity,
            low: holding.quantity,
            close: holding.quantity,
        }
    } else {
        prices?.map(|px| round_money(px * holding.quantity))
    };

    Some(ReportLine {
        date,
        stock_name: holding.name.clone(),
        stock_symbol: holding.symbol.clone(),
        quantity: holding.quantity,
        open_value: values.open,
        high_value: values.high,
        low_value: values.low,
        close_value: values.close,
    })
}

/// Store one valued line per holding with a positive quantity on `date`.
///
/// Lines already stored for the date whose holding is no longer positive are
/// removed. A held stock skipped for missing or failed prices keeps its line.
pub fn update_report_lines<S: PriceSource>(
    conn: &Connection,
    source: &S,
    date: NaiveDate,
) -> Result<StepReport> {
    let end = next_day(date)?;
    let holdings = db::get_holdings_as_of(conn, date)?;
    let mut items = Vec::with_capacity(holdings.len());

    for holding in &holdings {
        let prices = if holding.is_cash() {
            None
        } else {
            match source.fetch_ohlc(&holding.symbol, date, end) {
                Ok(PriceLookup::Priced(ohlc)) => Some(ohlc),
                Ok(PriceLookup::NoData) => {
                    debug!("No prices for {} on {}, no report line", holding.symbol, date);
                    items.push((holding.symbol.clone(), ItemOutcome::NoData));
                    continue;
                }
                Err(e) => {
                    warn!("Price lookup failed for {}: {:#}", holding.symbol, e);
                    items.push((holding.symbol.clone(), ItemOutcome::Failed(format!("{:#}", e))));
                    continue;
                }
            }
        };

        let Some(line) = value_holding(date, holding, prices) else {
            continue;
        };

        db::upsert_report_line(conn, &line).with_context(|| {
            format!("Failed to store report line for {} on {}", holding.symbol, date)
        })?;

        items.push((holding.symbol.clone(), ItemOutcome::Written));
    }

    // Lines of positions closed since a previous run of this date
    let held: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    db::delete_report_lines_except(conn, date, &held)
        .with_context(|| format!("Failed to remove closed positions on {}", date))?;

    finish_step(conn, Table::ReportLines, date, items)
}
