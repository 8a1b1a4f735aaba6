mod commands;
mod logging;
mod progress;
mod shutdown;

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use series_cleanup_core::config::load_configuration;
use series_cleanup_core::provider::trakt::TraktClient;
use series_cleanup_core::{AppConfig, CancellationToken, CleanupEngine, Decision};
use tracing::{error, info, warn};

const EXIT_FATAL: i32 = 1;
const EXIT_DELETION_FAILURES: i32 = 2;

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let guard = logging::init_logger(args.log_level.as_deref(), args.log_format);

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let code = match execute(command, args.config.as_deref()) {
        Ok(code) => code,
        Err(err) => {
            error!("Error: {:#}", err);
            EXIT_FATAL
        }
    };

    drop(guard);
    process::exit(code);
}

fn execute(command: Commands, config_path: Option<&Path>) -> Result<i32> {
    let mut config = load_configuration(config_path).context("Error loading configuration")?;

    match command {
        Commands::Run { dry_run } => {
            if dry_run {
                config.dry_run = true;
            }
            run_cleanup(config)
        }
        Commands::PrintConfig => {
            let rendered =
                toml::to_string_pretty(&config).context("Error rendering configuration")?;
            println!("{}", rendered);
            Ok(0)
        }
        Commands::Authorize => {
            let reporter = CliReporter::new();
            let mut client = TraktClient::new(&config.trakt)?;
            client
                .authenticate(&config.trakt.cache_dir, &reporter)
                .context("Trakt authorization failed")?;
            println!("{}", "Trakt authorization is cached.".green());
            Ok(0)
        }
    }
}

fn run_cleanup(config: AppConfig) -> Result<i32> {
    let reporter = CliReporter::new();
    let mut client = TraktClient::new(&config.trakt)?;
    client
        .authenticate(&config.trakt.cache_dir, &reporter)
        .context("Trakt authorization failed")?;

    // Ctrl-C must still abort the device flow above.
    let cancel = CancellationToken::new();
    if let Err(e) = shutdown::cancel_on_signal(cancel.clone()) {
        warn!("Signal handling unavailable, Ctrl-C will stop immediately: {}", e);
    }

    let dry_run = config.dry_run;
    let engine = CleanupEngine::new(config, &client)
        .with_reporter(&reporter)
        .with_cancellation(cancel);
    let result = engine.run()?;
    let retention = &result.retention;

    println!();
    info!(
        "History: {}, Scan: {}, Retention: {}",
        format!("{:.2}s", result.history_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.retention_duration.as_secs_f64()).green(),
    );
    info!(
        "{} files scanned, {} episodes in {} shows",
        format!("{}", result.total_files_scanned).cyan(),
        format!("{}", result.episodes).cyan(),
        format!("{}", result.shows).cyan(),
    );
    if dry_run {
        info!(
            "{} files would be deleted",
            format!("{}", retention.would_delete_files).yellow(),
        );
    } else {
        info!(
            "{} files deleted",
            format!("{}", retention.deleted_files).red(),
        );
    }
    info!(
        "{} unwatched, {} recently watched, {} kept by folder rules",
        retention.count(Decision::Unwatched),
        retention.count(Decision::RecentlyWatched),
        retention.count(Decision::KeepShow) + retention.count(Decision::KeepSeason),
    );

    for failure in &result.parse_failures {
        warn!(file = %failure.path.display(), "Not an episode: {}", failure.reason);
    }
    if retention.cancelled {
        warn!(
            "Run was interrupted, {} episodes were not processed",
            retention.count(Decision::Cancelled)
        );
    }

    if result.is_clean() {
        Ok(0)
    } else {
        for failure in &retention.failures {
            error!(file = %failure.path.display(), "Could not delete: {}", failure.reason);
        }
        error!(
            "{} files could not be deleted",
            format!("{}", retention.failures.len()).red()
        );
        Ok(EXIT_DELETION_FAILURES)
    }
}
