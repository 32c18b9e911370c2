//! Handover chat service entry point.
//!
//! Binary name: `handover`
//!
//! Parses CLI arguments, loads configuration from the data directory,
//! initializes the database and services, then starts the HTTP/WebSocket
//! server and the background ownership sweep.

mod http;
mod realtime;
mod state;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use state::AppState;

/// Real-time customer support chat service with admin takeover.
#[derive(Debug, Parser)]
#[command(name = "handover", version)]
struct Cli {
    /// Bind address override (e.g. 0.0.0.0:8900).
    #[arg(long)]
    bind: Option<String>,

    /// Data directory override.
    #[arg(long, env = "HANDOVER_DATA_DIR")]
    data_dir: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,handover=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let state = AppState::init(cli.data_dir.as_deref()).await?;

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| state.config.server.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "handover listening");

    // Background sweep returning idle-owned conversations to the assistant.
    let shutdown = CancellationToken::new();
    let sweep_handle = tokio::spawn(run_sweep(state.clone(), shutdown.clone()));

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    let _ = sweep_handle.await;

    tracing::info!("server stopped");
    Ok(())
}

/// Periodically release ownership of conversations whose admin went idle.
async fn run_sweep(state: AppState, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(state.config.takeover.sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let timeout = state.config.takeover.inactivity_timeout();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match state.arbitrator.sweep_inactive(timeout).await {
                    Ok(released) if !released.is_empty() => {
                        tracing::info!(count = released.len(), "released idle conversations");
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!(%error, "ownership sweep failed");
                    }
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
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
