//! HTTP server setup and the gateway run loop.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy handler and middleware
//! - Turn each inbound request into a dispatch job and wait for its outcome
//! - Drive the lifecycle: serve, drain on shutdown, stop
//!
//! # Shutdown
//! ```text
//! shutdown signal
//!     → stop accepting connections, close admission queue   (Draining)
//!     → wait for open requests and the governor to drain
//!     → bounded by the grace period, if one is configured   (Stopped)
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::dispatch::{Admitter, DispatchEngine, EngineError};
use crate::http::request::{request_id, MakeRequestUuid, RequestTranslator, X_REQUEST_ID};
use crate::http::response::GatewayError;
use crate::lifecycle::shutdown::{Lifecycle, Phase};

/// Error type for the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start dispatch engine: {0}")]
    Engine(#[from] EngineError),
    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server task failed: {0}")]
    Join(#[from] JoinError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub translator: Arc<RequestTranslator>,
    pub admitter: Admitter,
    pub max_body_size: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    engine: DispatchEngine,
    config: GatewayConfig,
    lifecycle: Lifecycle,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let engine = DispatchEngine::new(&config)?;

        let state = AppState {
            translator: Arc::new(RequestTranslator::new(&config.upstream)),
            admitter: engine.admitter(),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            engine,
            config,
            lifecycle: Lifecycle::new(),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            )
    }

    /// Lifecycle handle, for observing phase transitions.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let HttpServer {
            router,
            engine,
            config,
            lifecycle,
        } = self;

        let admitter = engine.admitter();
        let governor = engine.spawn();
        lifecycle.advance(Phase::Serving);
        tracing::info!(
            address = %addr,
            upstream = %config.upstream.base_url(),
            "HTTP server listening"
        );

        let graceful = {
            let admitter = admitter.clone();
            let lifecycle = lifecycle.clone();
            async move {
                let _ = shutdown.recv().await;
                lifecycle.advance(Phase::Draining);
                admitter.close();
            }
        };
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
        });

        let stopped_early = tokio::select! {
            result = &mut server => Some(result),
            _ = lifecycle.reached(Phase::Draining) => None,
        };

        if let Some(result) = stopped_early {
            tracing::error!("HTTP server stopped without a shutdown signal");
            lifecycle.advance(Phase::Draining);
            admitter.close();
            governor.await?;
            lifecycle.advance(Phase::Stopped);
            return Ok(result??);
        }

        tracing::info!(
            in_flight = admitter.tracker().active_count(),
            grace = ?config.shutdown.grace_period(),
            "Draining in-flight requests"
        );

        let drained = async {
            let served = (&mut server).await;
            let governed = governor.await;
            (served, governed)
        };

        let outcome = match config.shutdown.grace_period() {
            Some(grace) => tokio::time::timeout(grace, drained).await.ok(),
            None => Some(drained.await),
        };

        let result = match outcome {
            Some((served, governed)) => {
                governed?;
                served?.map_err(ServerError::from)
            }
            None => {
                tracing::warn!(
                    in_flight = admitter.tracker().active_count(),
                    "Grace period elapsed, abandoning in-flight requests"
                );
                server.abort();
                Ok(())
            }
        };

        lifecycle.advance(Phase::Stopped);
        tracing::info!("HTTP server stopped");
        result
    }
}

/// Main proxy handler.
/// Translates the request, admits it, and waits for its terminal response.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers());
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) if exceeded_length_limit(&e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request body too large");
            return GatewayError::PayloadTooLarge.into_response();
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return GatewayError::BadRequest.into_response();
        }
    };

    let outbound = match state.translator.translate(&parts, body) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Request translation failed");
            return GatewayError::BadRequest.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %parts.uri.path(),
        "Admitting request"
    );

    let completion = match state.admitter.admit(outbound, request_id.clone()).await {
        Ok(completion) => completion,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request refused");
            return GatewayError::Draining.into_response();
        }
    };

    match completion.await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(request_id = %request_id, "Job dropped without a response");
            GatewayError::Unreachable.into_response()
        }
    }
}

/// Whether a body read failed because the size limit was hit, as opposed to
/// the client going away or sending a malformed body.
fn exceeded_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_body_is_a_length_limit_error() {
        let err = axum::body::to_bytes(Body::from(vec![0u8; 64]), 16).await.unwrap_err();
        assert!(exceeded_length_limit(&err));
    }

    #[test]
    fn aborted_body_is_not_a_length_limit_error() {
        let err = axum::Error::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        ));
        assert!(!exceeded_length_limit(&err));
    }
}
