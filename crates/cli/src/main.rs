//! mbvault CLI - mbv command

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use cli_lib::{cmd, logging, system_config, util};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use vault_core::ListFilter;

/// mbvault - Incremental MariaDB backups in object storage
#[derive(Parser)]
#[command(name = "mbv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a backup (incremental unless --full or no local base exists)
    Create {
        /// Storage prefix (default: storage.path or S3_PATH)
        #[arg(short, long)]
        path: Option<String>,
        /// Force a full backup
        #[arg(short, long)]
        full: bool,
    },
    /// Restore the state as of a point in time into <data_dir>/restore
    Restore {
        /// Point in time, "YYYY-MM-DD HH:mm:ss"
        #[arg(value_parser = util::parse_datetime_arg)]
        date_time: NaiveDateTime,
        /// Storage prefix (default: storage.path or S3_PATH)
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Delete backups outside the retention policy
    Prune {
        /// Storage prefix (default: storage.path or S3_PATH)
        #[arg(short, long)]
        path: Option<String>,
        /// Retention spec, e.g. "7:days,4:weeks,12:months,5:years"
        #[arg(short, long)]
        retention: Option<String>,
        /// Show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored backups
    List {
        /// Storage prefix (default: storage.path or S3_PATH)
        #[arg(short, long)]
        path: Option<String>,
        /// Only backups taken after this time
        #[arg(short, long, value_parser = util::parse_datetime_arg)]
        after: Option<NaiveDateTime>,
        /// Only backups taken before this time
        #[arg(short, long, value_parser = util::parse_datetime_arg)]
        before: Option<NaiveDateTime>,
        /// Only full backups
        #[arg(long, alias = "fullOnly")]
        full_only: bool,
    },
    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    List,
    /// Show the config file path
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Create { path, full } => cmd::create::run(path.as_deref(), full).await,
        Commands::Restore { date_time, path } => cmd::restore::run(date_time, path.as_deref()).await,
        Commands::Prune {
            path,
            retention,
            dry_run,
        } => cmd::prune::run(path.as_deref(), retention.as_deref(), dry_run).await,
        Commands::List {
            path,
            after,
            before,
            full_only,
        } => {
            let filter = ListFilter {
                after,
                before,
                full_only,
            };
            cmd::list::run(path.as_deref(), filter).await
        }
        Commands::Config(ConfigCommands::List) => cmd::config::run_list().await,
        Commands::Config(ConfigCommands::Path { create }) => cmd::config::run_path(create).await,
        Commands::Config(ConfigCommands::Example) => cmd::config::run_example().await,
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The log directory comes from the config file; a broken file is
    // reported by the command itself.
    let log_dir = system_config::load().ok().and_then(|c| c.logging.dir);
    let _log_guard = match logging::init(cli.verbose, log_dir.as_deref()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {:#}", "warning:".yellow(), e);
            None
        }
    };

    // Dropping the command future releases the working directory lock and
    // kills any running backup tool.
    let outcome = tokio::select! {
        result = run(cli.command) => result,
        _ = shutdown_signal() => {
            tracing::warn!("interrupted, aborting");
            eprintln!("{}", "Interrupted".red());
            return ExitCode::from(130);
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
