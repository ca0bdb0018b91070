//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn an upstream response into the client response
//! - Map gateway-side failures to HTTP status codes
//!
//! # Design Decisions
//! - Status, headers and body are relayed verbatim, minus hop-by-hop headers
//! - Upstream error statuses are relayed, not interpreted
//! - Transport failures are 502, timeouts 504

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::security::headers::strip_hop_by_hop;

/// Build the client response from an upstream status, headers and body.
pub fn relay(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Response {
    strip_hop_by_hop(&mut headers);
    // The body is re-framed by the server.
    headers.remove(axum::http::header::CONTENT_LENGTH);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// A failure produced by the gateway itself rather than the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    /// The upstream could not be reached.
    Unreachable,
    /// The per-call timeout elapsed.
    Timeout,
    /// The upstream kept throttling past the retry bound.
    Throttled,
    /// The gateway is draining and takes no new work.
    Draining,
    /// The inbound request could not be translated.
    BadRequest,
    /// The inbound body exceeded the configured limit.
    PayloadTooLarge,
}

impl GatewayError {
    pub fn status(self) -> StatusCode {
        match self {
            GatewayError::Unreachable => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Throttled | GatewayError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::BadRequest => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn message(self) -> &'static str {
        match self {
            GatewayError::Unreachable => "Upstream request failed",
            GatewayError::Timeout => "Upstream request timed out",
            GatewayError::Throttled => "Upstream is throttling requests",
            GatewayError::Draining => "Gateway is shutting down",
            GatewayError::BadRequest => "Request could not be forwarded",
            GatewayError::PayloadTooLarge => "Request body too large",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}
