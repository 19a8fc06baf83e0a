//! palaverd — Palaver chat daemon.

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use palaver_core::config::PalaverConfig;
use palaver_server::ChatServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = PalaverConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = PalaverConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PalaverConfig::default()
    });

    let server = ChatServer::bind(&config)
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.network.bind_addr, config.network.port
            )
        })?;

    tracing::info!(
        addr = %server.local_addr()?,
        max_connections = config.limits.max_connections,
        "palaverd starting"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    server
        .run(shutdown_tx.subscribe())
        .await
        .context("chat server terminated")?;

    Ok(())
}
