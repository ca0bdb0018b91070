//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit)
//!     → request.rs (translate to the upstream request, inject credential)
//!     → [dispatch subsystem: queue, governor, outbound call]
//!     → response.rs (relay upstream response or map gateway error)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{OutboundRequest, RequestTranslator, TranslateError, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{HttpServer, ServerError};
