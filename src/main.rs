//! PASHA Benefits Portal
//!
//! Membership verification and partner offers, served with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ session ──▶ dispatcher ──▶ route table
//!                                                     │
//!                                                     ▼
//!                                            controller action
//!                                         (store, services, views)
//!                                                     │
//!     Client Response                                 ▼
//!     ◀────────────── security headers ◀── response render ◀──┘
//!
//!     Cross-cutting: config, observability (tracing + metrics), lifecycle
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use pasha_portal::config::{load_config, parse_config};
use pasha_portal::lifecycle::signals::spawn_signal_handler;
use pasha_portal::lifecycle::startup;
use pasha_portal::observability::init_logging;
use pasha_portal::routes::ROUTES;
use pasha_portal::Shutdown;

#[derive(Parser)]
#[command(name = "pasha-portal")]
#[command(about = "PASHA Benefits Portal", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the portal (default)
    Serve,
    /// Print the route table in match order
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => parse_config("")?,
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Routes => {
            for (method, pattern, handler) in ROUTES {
                println!("{:<5} {:<45} {}", method.as_str(), pattern, handler);
            }
        }
        Commands::Serve => {
            init_logging(&config.observability)?;

            tracing::info!(
                version = %config.app.version,
                bind_address = %config.listener.bind_address,
                base_path = %config.app.base_path,
                request_timeout_secs = config.timeouts.request_secs,
                "pasha-portal starting"
            );

            let shutdown = Arc::new(Shutdown::new());
            spawn_signal_handler(Arc::clone(&shutdown));

            startup::start(config, shutdown).await?;
            tracing::info!("Shutdown complete");
        }
    }

    Ok(())
}
