//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → body size limit (tower-http, configured in http/server.rs)
//!     → headers.rs (strip hop-by-hop before forwarding)
//!     → credential injection (http/request.rs)
//!
//! Upstream response:
//!     → headers.rs (strip hop-by-hop before relaying)
//! ```
//!
//! # Design Decisions
//! - The client never chooses the upstream credential
//! - No trust in client-supplied hop-by-hop headers

pub mod headers;
