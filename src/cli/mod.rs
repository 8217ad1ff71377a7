use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "portfolio-summary")]
#[command(version, about = "Daily investment portfolio valuation")]
#[command(
    long_about = "Values the portfolio recorded in a SQLite database for each configured date: stores the day's quotes, one valued line per holding and a portfolio-level summary."
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration file given positionally, as in `portfolio-summary summary.toml`
    #[arg(value_name = "CONFIG", conflicts_with = "config")]
    pub config_file: Option<PathBuf>,

    /// Database path (overrides the configuration file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Generate quotes, report lines and summary for each configured date (default)
    Run {
        /// Comma-separated YYYY-MM-DD dates (overrides the configuration file)
        #[arg(long, value_delimiter = ',')]
        dates: Option<Vec<String>>,
    },

    /// Create the database tables and unique indexes if missing
    Init,

    /// Show the stored report lines and summary for a date
    Show {
        /// Report date (YYYY-MM-DD)
        date: String,
    },

    /// Rewrite the quotes table ordered by stock and date
    RebuildQuotes,
}

impl Cli {
    /// Configuration path from `--config` or the positional argument
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| self.config_file.clone())
    }

    /// Subcommand to execute; `run` with configured dates when none is given
    pub fn command_or_default(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Run { dates: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_run() {
        let cli = Cli::parse_from(["portfolio-summary", "--config", "summary.toml"]);
        assert_eq!(cli.config_path(), Some(PathBuf::from("summary.toml")));
        assert_eq!(cli.command_or_default(), Commands::Run { dates: None });
    }

    #[test]
    fn test_positional_config_runs_by_default() {
        let cli = Cli::parse_from(["portfolio-summary", "summary.toml"]);
        assert_eq!(cli.config_path(), Some(PathBuf::from("summary.toml")));
        assert_eq!(cli.command_or_default(), Commands::Run { dates: None });
    }

    #[test]
    fn test_subcommand_name_is_not_a_config_path() {
        let cli = Cli::parse_from(["portfolio-summary", "init"]);
        assert_eq!(cli.config_path(), None);
        assert_eq!(cli.command_or_default(), Commands::Init);
    }

    #[test]
    fn test_positional_and_flag_config_conflict() {
        let result = Cli::try_parse_from(["portfolio-summary", "a.toml", "--config", "b.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_dates_are_comma_separated() {
        let cli = Cli::parse_from([
            "portfolio-summary",
            "run",
            "--dates",
            "2023-01-03,2023-01-04",
            "--db",
            "p.db",
        ]);
        assert_eq!(cli.db, Some(PathBuf::from("p.db")));
        assert_eq!(
            cli.command_or_default(),
            Commands::Run {
                dates: Some(vec!["2023-01-03".to_string(), "2023-01-04".to_string()])
            }
        );
    }

    #[test]
    fn test_show_takes_a_date() {
        let cli = Cli::parse_from(["portfolio-summary", "--no-color", "show", "2023-01-03"]);
        assert!(cli.no_color);
        assert_eq!(
            cli.command_or_default(),
            Commands::Show {
                date: "2023-01-03".to_string()
            }
        );
    }
}
