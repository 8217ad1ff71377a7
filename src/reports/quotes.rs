use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::{finish_step, ItemOutcome, StepReport};
use crate::db::{self, Quote, Table};
use crate::pricing::{PriceLookup, PriceSource};
use crate::trading_day::next_day;
use crate::utils::round_money;

/// Store the day's quote of every non-cash stock.
///
/// Stocks without data for the date are skipped and a failed lookup only
/// skips that stock. Store errors abort the step.
pub fn update_quotes<S: PriceSource>(
    conn: &Connection,
    source: &S,
    date: NaiveDate,
) -> Result<StepReport> {
    let end = next_day(date)?;
    let stocks = db::get_priced_stocks(conn)?;
    let mut items = Vec::with_capacity(stocks.len());

    for stock in stocks {
        if stock.is_cash() {
            continue;
        }

        let lookup = match source.fetch_ohlc(&stock.symbol, date, end) {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!("Price lookup failed for {}: {:#}", stock.symbol, e);
                items.push((stock.symbol, ItemOutcome::Failed(format!("{:#}", e))));
                continue;
            }
        };

        let ohlc = match lookup {
            PriceLookup::Priced(ohlc) => ohlc.map(round_money),
            PriceLookup::NoData => {
                debug!("No quote for {} on {}", stock.symbol, date);
                items.push((stock.symbol, ItemOutcome::NoData));
                continue;
            }
        };

        db::upsert_quote(
            conn,
            &Quote {
                date,
                stock_id: stock.id,
                open: ohlc.open,
                high: ohlc.high,
                low: ohlc.low,
                close: ohlc.close,
            },
        )
        .with_context(|| format!("Failed to store quote for {} on {}", stock.symbol, date))?;

        items.push((stock.symbol, ItemOutcome::Written));
    }

    finish_step(conn, Table::Quotes, date, items)
}
