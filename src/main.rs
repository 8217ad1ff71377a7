mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{formatters, Cli, Commands};
use colored::Colorize;
use portfolio_summary::config::{Overrides, Settings};
use portfolio_summary::pricing::{PriceFetcher, YahooPriceSource};
use portfolio_summary::{db, pipeline::Pipeline, trading_day};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let command = cli.command_or_default();
    let dates = match &command {
        Commands::Run { dates } => dates.clone(),
        _ => None,
    };
    let settings = Settings::resolve(Overrides {
        config_path: cli.config_path(),
        db_path: cli.db.clone(),
        dates,
    })?;

    match command {
        Commands::Run { .. } => {
            let all_completed = handle_run(&settings)?;
            if !all_completed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Init => {
            db::init_database(settings.db_path.clone())?;
            println!("{} Database ready", "✓".green().bold());
            Ok(())
        }
        Commands::Show { date } => handle_show(&settings, &date),
        Commands::RebuildQuotes => {
            let mut conn = db::open_db(settings.db_path.clone())?;
            db::apply_schema(&conn)?;
            let rows = db::rebuild_quotes(&mut conn)?;
            println!("{} Rebuilt quotes table ({} rows)", "✓".green().bold(), rows);
            Ok(())
        }
    }
}

/// Run the pipeline for every configured date; false when any date did not complete
fn handle_run(settings: &Settings) -> Result<bool> {
    if settings.dates.is_empty() {
        anyhow::bail!(
            "No report dates configured. Set `dates` under [parameters] or pass --dates."
        );
    }

    info!(
        "Running summary for {} dates (reference {})",
        settings.dates.len(),
        settings.reference_symbol
    );

    let conn = db::open_db(settings.db_path.clone())?;
    db::apply_schema(&conn)?;

    let source = YahooPriceSource::with_base_url(&settings.base_url, settings.timeout)
        .context("Failed to set up price source")?;
    let pipeline = Pipeline::new(&conn, PriceFetcher::new(source), &settings.reference_symbol);

    let outcome = pipeline.run_batch_with_progress(&settings.dates, |run| {
        println!("{}", formatters::format_date_run(run));
    });
    println!("{}", formatters::format_batch_footer(&outcome));

    Ok(outcome.all_completed())
}

fn handle_show(settings: &Settings, date: &str) -> Result<()> {
    let date = trading_day::parse_report_date(date)?;
    let conn = db::open_db(settings.db_path.clone())?;
    db::apply_schema(&conn)?;

    let lines = db::get_report_lines(&conn, date)?;
    let summary = db::get_report_summary(&conn, date)?;

    println!(
        "{}",
        formatters::format_report_table(&date.to_string(), &lines, summary.as_ref())
    );
    Ok(())
}
