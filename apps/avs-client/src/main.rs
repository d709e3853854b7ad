//! avs-client - Headless Alexa Voice Service client daemon.
//!
//! Wires a microphone and an external decoder process into the `avs-core`
//! protocol engine and runs it until a shutdown signal arrives.

mod config;
mod microphone;
mod player;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use avs_core::{BootstrapConfig, ClientRuntime, LoggingEventEmitter, TokioSpawner};
use bytes::Bytes;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::microphone::CpalMicrophone;
use crate::player::ProcessAudioPlayer;

/// Headless Alexa Voice Service client.
#[derive(Parser, Debug)]
#[command(name = "avs-client")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (JSON).
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "AVS_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Input device name to capture from (overrides the system default).
    #[arg(long, env = "AVS_INPUT_DEVICE")]
    input_device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("avs-client v{}", env!("CARGO_PKG_VERSION"));

    let config =
        ClientConfig::load(&args.config).context("Failed to load configuration")?;

    if config.needs_authorization() {
        anyhow::bail!(
            "No refresh_token present in {}. Complete the Login with Amazon \
             authorization flow and write the resulting refresh token into \
             this file before starting the client.",
            args.config.display()
        );
    }

    let alert_tone = match &config.alert_tone_path {
        Some(path) => Bytes::from(
            std::fs::read(path)
                .with_context(|| format!("Failed to read alert tone: {}", path.display()))?,
        ),
        None => {
            log::warn!("No alert_tone_path configured; alerts will play silently");
            Bytes::new()
        }
    };

    let microphone = Arc::new(CpalMicrophone::new(args.input_device));
    let player = Arc::new(ProcessAudioPlayer::new_default());
    let spawner = Arc::new(TokioSpawner::current());
    let emitter = Arc::new(LoggingEventEmitter);

    let stop = CancellationToken::new();

    let bootstrap_config = BootstrapConfig {
        credentials: config.to_credentials(),
        microphone,
        player,
        alert_tone,
        wake_word: config.wake_word.clone(),
        emitter,
        spawner,
    };

    let runtime = ClientRuntime::bootstrap(bootstrap_config, stop.clone())
        .await
        .context("Failed to bootstrap AVS client")?;

    log::info!(
        "AVS client bootstrapped successfully, listening for \"{}\"",
        config.wake_word
    );

    let run_handle = tokio::spawn(async move {
        runtime.run().await;
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, stopping...");
    stop.cancel();

    if let Err(e) = run_handle.await {
        log::warn!("Dialog driver task did not exit cleanly: {e}");
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
