// Reports module - the three table updates run for each report date

pub mod lines;
pub mod quotes;
pub mod summary;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{error, info};

use crate::db::{self, Table};

pub use lines::update_report_lines;
pub use quotes::update_quotes;
pub use summary::update_report_summary;

/// What happened to one item (stock, holding, summary row) in a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Written,
    /// The price source had nothing for the date; the item was skipped
    NoData,
    /// The price lookup failed; the item was skipped
    Failed(String),
}

/// Result of one table update for one date
#[derive(Debug, Clone)]
pub struct StepReport {
    pub table: Table,
    pub date: NaiveDate,
    pub items: Vec<(String, ItemOutcome)>,
    /// Rows present in the table for the date once the step finished
    pub rows_on_date: i64,
}

impl StepReport {
    /// True when the postcondition check found rows for the date
    pub fn has_rows(&self) -> bool {
        self.rows_on_date > 0
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Written))
    }

    pub fn skipped_symbols(&self) -> Vec<&str> {
        self.symbols(|o| matches!(o, ItemOutcome::NoData))
    }

    pub fn failed_symbols(&self) -> Vec<&str> {
        self.symbols(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| pred(o)).count()
    }

    fn symbols(&self, pred: impl Fn(&ItemOutcome) -> bool) -> Vec<&str> {
        self.items
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(s, _)| s.as_str())
            .collect()
    }
}

/// Postcondition shared by every step: count the rows stored for `date`.
///
/// Zero rows is reported but never aborts the run.
fn finish_step(
    conn: &Connection,
    table: Table,
    date: NaiveDate,
    items: Vec<(String, ItemOutcome)>,
) -> Result<StepReport> {
    let rows_on_date = db::count_rows_on(conn, table, date)?;

    if rows_on_date == 0 {
        error!("No records have been inserted into the {} table for date {}", table, date);
    } else {
        info!("{} records in {} table for date {}", rows_on_date, table, date);
    }

    Ok(StepReport {
        table,
        date,
        items,
        rows_on_date,
    })
}
