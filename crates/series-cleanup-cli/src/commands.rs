use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "series-cleanup")]
#[command(about = "Deletes watched TV episodes once their grace period has passed", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./series-cleanup.* if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, overrides TRACING_LEVEL (e.g. "debug", "series_cleanup_core=trace")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Console log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable, colored
    #[default]
    Console,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the configured folders and delete watched episodes
    Run {
        /// Report what would be deleted without touching any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Print configuration values
    PrintConfig,
    /// Authorize access to the Trakt account and cache the token
    Authorize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_defaults_to_console() {
        let cli = Cli::try_parse_from(["series-cleanup", "run"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Console);
        assert!(matches!(cli.command, Some(Commands::Run { dry_run: false })));
    }

    #[test]
    fn test_log_format_json_after_subcommand() {
        let cli =
            Cli::try_parse_from(["series-cleanup", "run", "--dry-run", "--log-format", "json"])
                .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Some(Commands::Run { dry_run: true })));
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["series-cleanup", "--log-format", "xml", "run"]).is_err());
    }
}
