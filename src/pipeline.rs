//! Daily summary orchestration
//!
//! For each report date: check it is a trading day, then update quotes,
//! report lines and the report summary, strictly in that order. A failing
//! date is recorded and the batch moves on to the next one.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::error::SummaryError;
use crate::pricing::PriceSource;
use crate::reports::{self, StepReport};
use crate::trading_day::{ensure_trading_day, parse_report_date};

/// Step reports of a date that went through the whole pipeline
#[derive(Debug, Clone)]
pub struct DateReport {
    pub date: NaiveDate,
    pub quotes: StepReport,
    pub report_lines: StepReport,
    pub report_summary: StepReport,
}

impl DateReport {
    pub fn steps(&self) -> [&StepReport; 3] {
        [&self.quotes, &self.report_lines, &self.report_summary]
    }
}

#[derive(Debug, Clone)]
pub enum DateStatus {
    Completed(DateReport),
    /// The reference instrument has no data; nothing was written
    InvalidTradingDay,
    /// Bad date string, price source or store failure
    Failed(String),
}

/// Outcome of one configured date
#[derive(Debug, Clone)]
pub struct DateRun {
    pub input: String,
    pub date: Option<NaiveDate>,
    pub status: DateStatus,
}

impl DateRun {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, DateStatus::Completed(_))
    }
}

/// Outcome of a whole batch, in configured order
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub runs: Vec<DateRun>,
}

impl BatchOutcome {
    pub fn all_completed(&self) -> bool {
        self.runs.iter().all(DateRun::is_completed)
    }

    pub fn completed_count(&self) -> usize {
        self.runs.iter().filter(|r| r.is_completed()).count()
    }
}

/// Runs the summary steps against one store with one price source
pub struct Pipeline<'a, S> {
    conn: &'a Connection,
    source: S,
    reference_symbol: String,
}

impl<'a, S: PriceSource> Pipeline<'a, S> {
    pub fn new(conn: &'a Connection, source: S, reference_symbol: impl Into<String>) -> Self {
        Self {
            conn,
            source,
            reference_symbol: reference_symbol.into(),
        }
    }

    /// Validate `date` and run the three updates.
    ///
    /// Fails with `SummaryError::InvalidTradingDay` before touching the store
    /// when the reference instrument has no data for the date.
    pub fn run_date(&self, date: NaiveDate) -> Result<DateReport> {
        ensure_trading_day(&self.source, &self.reference_symbol, date)?;

        info!("Generating portfolio summary for {}", date);
        let quotes = reports::update_quotes(self.conn, &self.source, date)?;
        let report_lines = reports::update_report_lines(self.conn, &self.source, date)?;
        let report_summary = reports::update_report_summary(self.conn, date)?;

        Ok(DateReport {
            date,
            quotes,
            report_lines,
            report_summary,
        })
    }

    /// Run every date in order; no date can stop the others
    pub fn run_batch(&self, dates: &[String]) -> BatchOutcome {
        self.run_batch_with_progress(dates, |_| {})
    }

    /// Same as [`Pipeline::run_batch`], calling `on_date` as each date finishes
    pub fn run_batch_with_progress<F>(&self, dates: &[String], mut on_date: F) -> BatchOutcome
    where
        F: FnMut(&DateRun),
    {
        let mut outcome = BatchOutcome::default();

        for input in dates {
            let run = self.run_one(input);
            on_date(&run);
            outcome.runs.push(run);
        }

        info!(
            "Batch finished: {}/{} dates completed",
            outcome.completed_count(),
            outcome.runs.len()
        );
        outcome
    }

    fn run_one(&self, input: &str) -> DateRun {
        let date = match parse_report_date(input) {
            Ok(date) => date,
            Err(e) => {
                error!("{:#}", e);
                return DateRun {
                    input: input.to_string(),
                    date: None,
                    status: DateStatus::Failed(format!("{:#}", e)),
                };
            }
        };

        let status = match self.run_date(date) {
            Ok(report) => DateStatus::Completed(report),
            Err(e) => match e.downcast_ref::<SummaryError>() {
                Some(SummaryError::InvalidTradingDay(_)) => {
                    warn!("{}", e);
                    DateStatus::InvalidTradingDay
                }
                _ => {
                    error!("Summary for {} failed: {:#}", date, e);
                    DateStatus::Failed(format!("{:#}", e))
                }
            },
        };

        DateRun {
            input: input.to_string(),
            date: Some(date),
            status,
        }
    }
}
