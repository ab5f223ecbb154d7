//! Monster Battle Server - authoritative sync server for two-player battles
//!
//! This is the main entry point. It handles:
//! - Loading configuration and the monster catalog
//! - Running the match task and the TCP accept loop
//! - Graceful shutdown on Ctrl+C / SIGTERM

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use monster_battle_server::app::AppState;
use monster_battle_server::config::{Config, LogFormat};
use monster_battle_server::game::Catalog;
use monster_battle_server::net;
use monster_battle_server::util::time::{init_server_time, uptime_secs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Monster Battle Server");
    info!("Server address: {}", config.server_addr);

    let catalog = match &config.catalog_path {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("loading catalog from {}", path.display()))?;
            info!(
                path = %path.display(),
                monsters = catalog.monster_names().count(),
                "Catalog loaded"
            );
            catalog
        }
        None => Catalog::default(),
    };

    let listener = net::bind(config.server_addr)
        .with_context(|| format!("binding {}", config.server_addr))?;

    // Create application state
    let (state, game_match) = AppState::new(config, catalog);

    // Spawn the match task
    let match_task = tokio::spawn(game_match.run());

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    net::serve(listener, state).await;

    if let Err(e) = match_task.await {
        tracing::error!(error = %e, "Match task failed");
    }

    info!(uptime_secs = uptime_secs(), "Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
