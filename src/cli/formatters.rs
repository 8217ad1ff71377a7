//! Output formatting module for CLI display
//!
//! Turns the structured outcomes returned by the library into the lines and
//! tables printed to the terminal.

use colored::Colorize;
use portfolio_summary::db::{ReportLine, ReportSummary};
use portfolio_summary::pipeline::{BatchOutcome, DateRun, DateStatus};
use portfolio_summary::reports::StepReport;
use portfolio_summary::utils::{format_decimal, format_money};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Row-count line for one table update, mirroring the postcondition check
pub fn format_step(step: &StepReport) -> String {
    let mut output = if step.has_rows() {
        format!(
            "{} {} records have been inserted into {} table for date {}.",
            "✓".green(),
            step.rows_on_date,
            step.table,
            step.date
        )
    } else {
        format!(
            "{} ERROR: No records have been inserted into the {} table for date {}.",
            "❌".red(),
            step.table,
            step.date
        )
    };

    let failed = step.failed_symbols();
    if !failed.is_empty() {
        output.push_str(&format!(
            "\n  {} price lookup failed: {}",
            "⚠".yellow(),
            failed.join(", ")
        ));
    }

    output
}

/// Everything printed for one configured date
pub fn format_date_run(run: &DateRun) -> String {
    match &run.status {
        DateStatus::Completed(report) => report
            .steps()
            .iter()
            .map(|step| format_step(step))
            .collect::<Vec<_>>()
            .join("\n"),
        DateStatus::InvalidTradingDay => format!(
            "{} ERROR: The date provided ({}) is not a valid trading day.",
            "❌".red(),
            run.input
        ),
        DateStatus::Failed(reason) => format!(
            "{} ERROR: Summary for {} failed: {}",
            "❌".red(),
            run.input,
            reason
        ),
    }
}

/// Closing line of a batch
pub fn format_batch_footer(outcome: &BatchOutcome) -> String {
    let total = outcome.runs.len();
    let completed = outcome.completed_count();
    if total == 0 {
        return format!("{} No report dates configured", "ℹ".blue().bold());
    }
    if outcome.all_completed() {
        format!("\n{} {} of {} dates completed", "✓".green().bold(), completed, total)
    } else {
        format!(
            "\n{} {} of {} dates completed",
            "⚠".yellow().bold(),
            completed,
            total
        )
    }
}

/// Stored report for one date as a table
pub fn format_report_table(
    date: &str,
    lines: &[ReportLine],
    summary: Option<&ReportSummary>,
) -> String {
    if lines.is_empty() && summary.is_none() {
        return format!("{} No report stored for {}", "ℹ".blue().bold(), date);
    }

    #[derive(Tabled)]
    struct LineRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Open")]
        open: String,
        #[tabled(rename = "High")]
        high: String,
        #[tabled(rename = "Low")]
        low: String,
        #[tabled(rename = "Close")]
        close: String,
    }

    let mut rows: Vec<LineRow> = lines
        .iter()
        .map(|l| LineRow {
            symbol: l.stock_symbol.clone(),
            name: l.stock_name.clone(),
            quantity: l.quantity.normalize().to_string(),
            open: format_money(l.open_value),
            high: format_money(l.high_value),
            low: format_money(l.low_value),
            close: format_money(l.close_value),
        })
        .collect();

    if let Some(s) = summary {
        rows.push(LineRow {
            symbol: "TOTAL".to_string(),
            name: String::new(),
            quantity: String::new(),
            open: format_money(s.open_value),
            high: format_money(s.high_value),
            low: format_money(s.low_value),
            close: format_money(s.close_value),
        });
    }

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();

    let mut output = format!("\n{} Portfolio on {}\n\n", "📊".cyan().bold(), date);
    output.push_str(&table);

    if let Some(s) = summary {
        output.push_str(&format!(
            "\n\nClose value: {}",
            format_decimal(s.close_value).bold()
        ));
    }

    output
}
