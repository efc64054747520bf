//! PasteBox - clipboard history manager
//!
//! This is the main entry point for the `pastebox` command.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pastebox::cli::{Cli, CliHandler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings decide the log level, so load them before logging starts
    let handler = CliHandler::new(cli.config.clone());
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        handler
            .as_ref()
            .map(|h| h.log_level().to_lowercase())
            .unwrap_or_else(|_| "info".to_string())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pastebox={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    debug!("PasteBox v{}", pastebox::VERSION);

    let mut handler = handler?;
    handler.handle_command(cli.command).await?;

    Ok(())
}
