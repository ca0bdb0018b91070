//! Startup orchestration.
//!
//! Order: metrics (optional) → dispatch engine and router → listener →
//! signal handler → serve. Any failure before serving is fatal.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::net::listener::{self, ListenerError};
use crate::observability::metrics;

/// Error type for startup and the serving run.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Start the gateway with a validated configuration and serve until an OS
/// signal triggers the drain.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(metrics_address = %addr, error = %e, "Failed to parse metrics address"),
        }
    }

    // The engine is built before binding so a bad setup never accepts a
    // connection.
    let server = HttpServer::new(config)?;
    let listener = listener::bind(&server.config().listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    server.run(listener, server_shutdown).await?;
    Ok(())
}
