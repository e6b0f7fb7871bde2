//! sd - API call scheduler daemon
//!
//! Binds the intake socket and runs the scheduler until SIGINT or SIGTERM.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};

use scheduler::cli::{Cli, get_log_path};
use scheduler::config::Config;
use scheduler::daemon::Daemon;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(path) = cli.path {
        config.intake.socket_path = path;
    }

    if cli.dump {
        print!("{}", config.dump()?);
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;
    info!(
        "Scheduler loaded config: socket={}, capacity={}, drain={}s",
        config.intake.socket_path.display(),
        config.scheduler.bucket_capacity,
        config.scheduler.drain_interval_secs
    );

    let daemon = Daemon::new(config);
    let shutdown_tx = daemon.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            warn!(error = %e, "Signal handling failed, shutting down");
        }
        notify_shutdown(&shutdown_tx);
    });

    let summary = daemon.run().await?;
    info!(
        submitted = summary.submitted,
        responses = summary.responses,
        "Daemon shut down"
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        _ = sigint.recv() => warn!("SIGINT received"),
        _ = sigterm.recv() => warn!("SIGTERM received"),
    }
    Ok(())
}

fn notify_shutdown(shutdown_tx: &broadcast::Sender<()>) {
    if shutdown_tx.send(()).is_err() {
        warn!("No components listening for shutdown");
    }
}
