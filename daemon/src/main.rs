//! `rollcall`: runs a presence token broadcaster and inspects stored profiles.

mod commands;
mod config;
mod error;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rollcall_types::GeoPoint;
use rollcall_utils::{init_logging, LogFormat};

use crate::config::{DaemonConfig, Overrides};
use crate::shutdown::ShutdownController;

#[derive(Parser)]
#[command(name = "rollcall", about = "Presence verification tooling")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and environment variables override them.
    #[arg(long, env = "ROLLCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the scheduling backend.
    #[arg(long, env = "ROLLCALL_BACKEND_URL")]
    backend_url: Option<String>,

    /// WebSocket endpoint delivering token pushes.
    #[arg(long, env = "ROLLCALL_PUSH_URL")]
    push_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ROLLCALL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ROLLCALL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Rotate presence tokens for a set of scopes until interrupted or idle.
    Broadcast {
        /// Scopes to broadcast (comma-separated). Defaults to the config file.
        #[arg(long, env = "ROLLCALL_SCOPES", value_delimiter = ',')]
        scopes: Vec<String>,
    },

    /// Inspect stored profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Cosine similarity of two embeddings stored as JSON arrays.
    Similarity {
        a: PathBuf,
        b: PathBuf,
        #[arg(long, default_value_t = 0.7)]
        threshold: f64,
    },

    /// Distance between two "lat,lng" points.
    Distance {
        #[arg(allow_hyphen_values = true)]
        from: GeoPoint,
        #[arg(allow_hyphen_values = true)]
        to: GeoPoint,
        /// Also report whether `to` lies within this radius of `from`.
        #[arg(long)]
        radius: Option<f64>,
    },
}

#[derive(clap::Subcommand)]
enum ProfileAction {
    /// Validate a profile document (JSON with `face` and/or `geofence`).
    Check { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => DaemonConfig::from_toml_file(path)?,
        None => DaemonConfig::default(),
    };
    let scopes = match &cli.command {
        Command::Broadcast { scopes } => scopes.clone(),
        _ => Vec::new(),
    };
    let config = file_config.apply(Overrides {
        backend_url: cli.backend_url,
        push_url: cli.push_url,
        scopes,
        log_level: cli.log_level,
        log_format: cli.log_format,
    });

    init_logging(config.log_format, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    match cli.command {
        Command::Broadcast { .. } => {
            let shutdown = Arc::new(ShutdownController::new());
            let listener = tokio::spawn({
                let shutdown = Arc::clone(&shutdown);
                async move { shutdown.wait_for_signal().await }
            });
            let result = commands::run_broadcast(&config, &shutdown).await;
            listener.abort();
            result?;
        }
        Command::Profile {
            action: ProfileAction::Check { file },
        } => {
            for line in commands::check_profile_file(&file)? {
                println!("{line}");
            }
        }
        Command::Similarity { a, b, threshold } => {
            println!("{}", commands::similarity_files(&a, &b, threshold)?);
        }
        Command::Distance { from, to, radius } => {
            println!("{}", commands::distance_report(from, to, radius)?);
        }
    }

    Ok(())
}
