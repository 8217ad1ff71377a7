// Database module - SQLite connection, schema and per-table operations

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::SummaryError;

pub use models::{
    Holding, PortfolioEntry, Quote, ReportLine, ReportSummary, Stock, CASH_SYMBOL,
};

/// Tables written by a summary run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Quotes,
    ReportLines,
    ReportSummary,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Quotes => "quotes",
            Table::ReportLines => "report_lines",
            Table::ReportSummary => "report_summary",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application directory (~/.portfolio-summary), created on demand
pub fn get_app_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let app_dir = PathBuf::from(home).join(".portfolio-summary");

    std::fs::create_dir_all(&app_dir).context("Failed to create .portfolio-summary directory")?;

    Ok(app_dir)
}

/// Get the default database path (~/.portfolio-summary/portfolio.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("portfolio.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Create any missing tables and unique indexes on an open connection
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")?;
    Ok(())
}

/// Initialize the database with schema
///
/// Safe to call against an existing database: every statement is
/// `IF NOT EXISTS`, so data written by the entry process is left alone.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Insert a stock, returns its id
pub fn insert_stock(conn: &Connection, symbol: &str, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO stocks (symbol, name) VALUES (?1, ?2)",
        params![symbol, name],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Insert a portfolio transaction (signed quantity delta)
pub fn insert_portfolio_entry(conn: &Connection, entry: &PortfolioEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO portfolio (date, stock_id, quantity) VALUES (?1, ?2, ?3)",
        params![entry.date, entry.stock_id, entry.quantity.to_string()],
    )?;

    Ok(())
}

/// All stocks that need market prices, i.e. everything except cash
pub fn get_priced_stocks(conn: &Connection) -> Result<Vec<Stock>> {
    let mut stmt =
        conn.prepare("SELECT id, symbol, name FROM stocks WHERE symbol != ?1 ORDER BY id")?;

    let stocks = stmt
        .query_map([CASH_SYMBOL], |row| {
            Ok(Stock {
                id: row.get(0)?,
                symbol: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stocks)
}

/// Positions held at the end of `as_of`
///
/// Sums every portfolio row dated on or before `as_of` per (symbol, name)
/// and keeps strictly positive totals, ordered by stock name.
pub fn get_holdings_as_of(conn: &Connection, as_of: NaiveDate) -> Result<Vec<Holding>> {
    let mut stmt = conn.prepare(
        "SELECT s.symbol, s.name, p.quantity
         FROM portfolio p
         INNER JOIN stocks s ON p.stock_id = s.id
         WHERE date(p.date) <= ?1",
    )?;

    let mut rows = stmt.query(params![as_of])?;
    let mut positions: BTreeMap<(String, String), Decimal> = BTreeMap::new();

    while let Some(row) = rows.next()? {
        let symbol: String = row.get(0)?;
        let name: String = row.get(1)?;
        let quantity = get_decimal_value(row, 2).context("Failed to parse portfolio quantity")?;
        *positions.entry((name, symbol)).or_insert(Decimal::ZERO) += quantity;
    }

    let holdings: Vec<Holding> = positions
        .into_iter()
        .filter(|(_, quantity)| *quantity > Decimal::ZERO)
        .map(|((name, symbol), quantity)| Holding {
            symbol,
            name,
            quantity,
        })
        .collect();

    debug!("{} holdings with positive quantity on {}", holdings.len(), as_of);
    Ok(holdings)
}

/// Insert or replace the quote for (date, stock_id)
pub fn upsert_quote(conn: &Connection, quote: &Quote) -> Result<()> {
    conn.execute(
        "INSERT INTO quotes (date, stock_id, open, high, low, close)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(date, stock_id) DO UPDATE SET
            open = excluded.open,
            high = excluded.high,
            low = excluded.low,
            close = excluded.close",
        params![
            quote.date,
            quote.stock_id,
            quote.open.to_string(),
            quote.high.to_string(),
            quote.low.to_string(),
            quote.close.to_string(),
        ],
    )?;

    Ok(())
}

fn quote_from_row(row: &rusqlite::Row) -> Result<Quote, rusqlite::Error> {
    Ok(Quote {
        date: row.get(0)?,
        stock_id: row.get(1)?,
        open: get_decimal_value(row, 2)?,
        high: get_decimal_value(row, 3)?,
        low: get_decimal_value(row, 4)?,
        close: get_decimal_value(row, 5)?,
    })
}

/// Quotes stored for one date, by stock id
pub fn get_quotes_on(conn: &Connection, date: NaiveDate) -> Result<Vec<Quote>> {
    let mut stmt = conn.prepare(
        "SELECT date, stock_id, open, high, low, close
         FROM quotes WHERE date = ?1 ORDER BY stock_id",
    )?;

    let quotes = stmt
        .query_map(params![date], quote_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quotes)
}

/// Every stored quote, ordered by stock then date
pub fn list_quotes(conn: &Connection) -> Result<Vec<Quote>> {
    let mut stmt = conn.prepare(
        "SELECT date, stock_id, open, high, low, close
         FROM quotes ORDER BY stock_id, date",
    )?;

    let quotes = stmt
        .query_map([], quote_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quotes)
}

/// Rewrite the quotes table so its physical order is (stock_id, date)
///
/// Runs in one transaction; row count and values are unchanged. Rows are
/// copied as stored, never re-parsed, so legacy NULL prices survive too.
pub fn rebuild_quotes(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TEMP TABLE quotes_rebuild AS
            SELECT date, stock_id, open, high, low, close
            FROM quotes ORDER BY stock_id, date;
         DELETE FROM quotes;",
    )
    .context("Failed to stage quotes for rebuild")?;

    let staged: i64 = tx.query_row("SELECT COUNT(*) FROM quotes_rebuild", [], |row| row.get(0))?;

    let copied = tx
        .execute(
            "INSERT INTO quotes (date, stock_id, open, high, low, close)
             SELECT date, stock_id, open, high, low, close
             FROM quotes_rebuild ORDER BY stock_id, date",
            [],
        )
        .context("Failed to reinsert quotes")?;

    if copied as i64 != staged {
        // Dropping the transaction rolls the delete back
        return Err(SummaryError::Database(format!(
            "quotes rebuild copied {} of {} rows",
            copied, staged
        ))
        .into());
    }

    tx.execute_batch("DROP TABLE quotes_rebuild;")?;
    tx.commit()?;

    info!("Rebuilt quotes table ({} rows)", copied);
    Ok(copied)
}

/// Insert or replace the report line for (date, stock_symbol)
pub fn upsert_report_line(conn: &Connection, line: &ReportLine) -> Result<()> {
    conn.execute(
        "INSERT INTO report_lines (
            date, stock_name, stock_symbol, quantity,
            open_value, high_value, low_value, close_value
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(date, stock_symbol) DO UPDATE SET
            stock_name = excluded.stock_name,
            quantity = excluded.quantity,
            open_value = excluded.open_value,
            high_value = excluded.high_value,
            low_value = excluded.low_value,
            close_value = excluded.close_value",
        params![
            line.date,
            line.stock_name,
            line.stock_symbol,
            line.quantity.to_string(),
            line.open_value.to_string(),
            line.high_value.to_string(),
            line.low_value.to_string(),
            line.close_value.to_string(),
        ],
    )?;

    Ok(())
}

/// Report lines stored for one date, by stock name
pub fn get_report_lines(conn: &Connection, date: NaiveDate) -> Result<Vec<ReportLine>> {
    let mut stmt = conn.prepare(
        "SELECT date, stock_name, stock_symbol, quantity,
                open_value, high_value, low_value, close_value
         FROM report_lines
         WHERE date = ?1
         ORDER BY stock_name ASC",
    )?;

    let lines = stmt
        .query_map(params![date], |row| {
            Ok(ReportLine {
                date: row.get(0)?,
                stock_name: row.get(1)?,
                stock_symbol: row.get(2)?,
                quantity: get_decimal_value(row, 3)?,
                open_value: get_decimal_value(row, 4)?,
                high_value: get_decimal_value(row, 5)?,
                low_value: get_decimal_value(row, 6)?,
                close_value: get_decimal_value(row, 7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines)
}

/// Sum the report lines of one date
///
/// Values are added as `Decimal`, so the total is exactly the sum of the
/// stored lines. Returns `None` when no line exists for the date.
pub fn summarize_report_lines(conn: &Connection, date: NaiveDate) -> Result<Option<ReportSummary>> {
    let mut stmt = conn.prepare(
        "SELECT open_value, high_value, low_value, close_value
         FROM report_lines
         WHERE date = ?1",
    )?;
    let mut rows = stmt.query(params![date])?;
    let mut summary: Option<ReportSummary> = None;

    while let Some(row) = rows.next()? {
        let total = summary.get_or_insert(ReportSummary {
            date,
            open_value: Decimal::ZERO,
            high_value: Decimal::ZERO,
            low_value: Decimal::ZERO,
            close_value: Decimal::ZERO,
        });
        total.open_value += get_decimal_value(row, 0)?;
        total.high_value += get_decimal_value(row, 1)?;
        total.low_value += get_decimal_value(row, 2)?;
        total.close_value += get_decimal_value(row, 3)?;
    }

    Ok(summary)
}

/// Remove the report lines of `date` whose symbol is not in `keep`
///
/// Returns the number of rows deleted.
pub fn delete_report_lines_except(
    conn: &Connection,
    date: NaiveDate,
    keep: &[String],
) -> Result<usize> {
    let mut stmt = conn.prepare("SELECT stock_symbol FROM report_lines WHERE date = ?1")?;
    let stale: Vec<String> = stmt
        .query_map(params![date], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?
        .into_iter()
        .filter(|symbol| !keep.contains(symbol))
        .collect();

    let mut deleted = 0;
    for symbol in &stale {
        deleted += conn
            .execute(
                "DELETE FROM report_lines WHERE date = ?1 AND stock_symbol = ?2",
                params![date, symbol],
            )
            .with_context(|| format!("Failed to delete report line {} on {}", symbol, date))?;
    }

    if deleted > 0 {
        debug!("Removed {} stale report lines on {}", deleted, date);
    }
    Ok(deleted)
}

/// Remove the summary row of a date, if any
pub fn delete_report_summary(conn: &Connection, date: NaiveDate) -> Result<usize> {
    let deleted = conn
        .execute("DELETE FROM report_summary WHERE date = ?1", params![date])
        .context("Failed to delete report summary")?;
    Ok(deleted)
}

/// Insert or replace the summary row for a date
pub fn upsert_report_summary(conn: &Connection, summary: &ReportSummary) -> Result<()> {
    conn.execute(
        "INSERT INTO report_summary (date, open_value, high_value, low_value, close_value)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(date) DO UPDATE SET
            open_value = excluded.open_value,
            high_value = excluded.high_value,
            low_value = excluded.low_value,
            close_value = excluded.close_value",
        params![
            summary.date,
            summary.open_value.to_string(),
            summary.high_value.to_string(),
            summary.low_value.to_string(),
            summary.close_value.to_string(),
        ],
    )?;

    Ok(())
}

/// Stored summary for a date, if any
pub fn get_report_summary(conn: &Connection, date: NaiveDate) -> Result<Option<ReportSummary>> {
    let result = conn
        .query_row(
            "SELECT date, open_value, high_value, low_value, close_value
             FROM report_summary
             WHERE date = ?1 AND open_value IS NOT NULL",
            params![date],
            |row| {
                Ok(ReportSummary {
                    date: row.get(0)?,
                    open_value: get_decimal_value(row, 1)?,
                    high_value: get_decimal_value(row, 2)?,
                    low_value: get_decimal_value(row, 3)?,
                    close_value: get_decimal_value(row, 4)?,
                })
            },
        )
        .optional()?;

    Ok(result)
}

/// Number of rows stored in `table` for a date
pub fn count_rows_on(conn: &Connection, table: Table, date: NaiveDate) -> Result<i64> {
    let sql = format!("SELECT COUNT(1) FROM {} WHERE date = ?1", table.as_str());
    let count: i64 = conn
        .query_row(&sql, params![date], |row| row.get(0))
        .context(format!("Failed to count {} rows", table))?;
    Ok(count)
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::{Type, ValueRef};

    let conversion = |ty: Type, e: Box<dyn std::error::Error + Send + Sync>| {
        rusqlite::Error::FromSqlConversionFailure(idx, ty, e)
    };

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes).map_err(|e| conversion(Type::Text, Box::new(e)))?;
            Decimal::from_str(s.trim()).map_err(|e| conversion(Type::Text, Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| conversion(Type::Real, Box::new(e))),
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            Type::Null,
        )),
    }
}
