use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::warn;

use super::{finish_step, ItemOutcome, StepReport};
use crate::db::{self, Table};

/// Label used for the summary row in a [`StepReport`]
pub const SUMMARY_ITEM: &str = "portfolio";

/// Store the sum of the date's report lines as the portfolio summary.
///
/// With no report lines for the date no summary is written and a summary left
/// by an earlier run of the date is removed.
pub fn update_report_summary(conn: &Connection, date: NaiveDate) -> Result<StepReport> {
    let mut items = Vec::with_capacity(1);

    match db::summarize_report_lines(conn, date)? {
        Some(summary) => {
            db::upsert_report_summary(conn, &summary)
                .with_context(|| format!("Failed to store report summary for {}", date))?;
            items.push((SUMMARY_ITEM.to_string(), ItemOutcome::Written));
        }
        None => {
            warn!("No report lines for {}, summary not written", date);
            db::delete_report_summary(conn, date)
                .with_context(|| format!("Failed to clear report summary for {}", date))?;
            items.push((SUMMARY_ITEM.to_string(), ItemOutcome::NoData));
        }
    }

    finish_step(conn, Table::ReportSummary, date, items)
}
