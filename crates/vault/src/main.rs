//! `vault` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Load the key ring from `CURRENT_KEY` / `PREVIOUS_KEY_*`.
//! 4. Select the audit sink.
//! 5. Build the Axum router and serve until SIGINT/SIGTERM.
//! 6. Drain the audit writer and report how many entries were dropped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use vault::audit::{AuditLog, ChannelAuditSink};
use vault::config::{AuditSinkKind, Config};
use vault::server::{self, state::AppState};
use vault::{keyring, telemetry, FieldSchema, FieldVault};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;
    let sink_kind = cfg.audit_sink_kind()?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        current_key_version = %cfg.current_key_version,
        "vault starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key ring
    // -----------------------------------------------------------------------
    let keyring = keyring::load_from_env(&cfg.current_key_version).map_err(|e| {
        tracing::error!(error = %e, "key ring failed to load");
        e
    })?;

    // -----------------------------------------------------------------------
    // 4. Audit sink
    // -----------------------------------------------------------------------
    let (audit, audit_buffer, audit_writer) = match sink_kind {
        AuditSinkKind::Memory => {
            let (log, buffer) = AuditLog::in_memory(cfg.audit_buffer_capacity);
            (log, Some(buffer), None)
        }
        AuditSinkKind::Log => {
            let (sink, writer) = ChannelAuditSink::spawn(cfg.audit_buffer_capacity);
            (AuditLog::new(Arc::new(sink)), None, Some(writer))
        }
    };
    info!(sink = ?sink_kind, capacity = cfg.audit_buffer_capacity, "audit sink ready");

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let vault = FieldVault::new(keyring, FieldSchema::default(), audit);
    let router = server::router::build(AppState::new(vault, audit_buffer));

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // -----------------------------------------------------------------------
    // 6. Audit drain
    // -----------------------------------------------------------------------
    // The router held the last sink clone; serving has ended, so the queue is closed.
    if let Some(writer) = audit_writer {
        match tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, writer).await {
            Ok(Ok(0)) => info!("audit writer drained"),
            Ok(Ok(dropped)) => warn!(dropped, "audit writer drained; entries were dropped"),
            Ok(Err(e)) => warn!(error = %e, "audit writer task failed"),
            Err(_) => warn!("audit writer did not drain in time; queued entries lost"),
        }
    }

    info!("vault stopped");
    Ok(())
}

/// Upper bound on waiting for queued audit entries at shutdown.
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
