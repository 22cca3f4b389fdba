//! Gemini Relay - command-line host
//!
//! Loads `relay_config.json`, builds one `ServiceState` and runs a single
//! command, streaming `data: {"type":..,"content":..}` frames to stdout.
//! Ctrl-C cancels the in-flight request.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gemini_relay_core::modules::config::{load_config, resolve_config_path};
use gemini_relay_core::ServiceState;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref())?;

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let state = Arc::new(ServiceState::from_config(&config)?);
    info!(
        default_model = %state.catalog().default_model(),
        tier = %state.key_pool().tier(),
        "Relay ready"
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Chat { prompt, model, history, images, documents, document_mime } => {
            let args = commands::ChatArgs { prompt, model, history, images, documents, document_mime };
            commands::chat(state, args, cancel).await
        },
        Commands::Minutes { file } => commands::minutes(state, &config, &file, cancel).await,
        Commands::Upload { file, mime } => commands::upload(state, &file, &mime).await,
        Commands::RefreshModels => commands::refresh_models(state, config, &config_path).await,
    }
}
