//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID and job ID are attached to every dispatch log line
//! - Credentials never appear in logs
//! - Metrics are cheap and off unless an address is configured

pub mod logging;
pub mod metrics;
