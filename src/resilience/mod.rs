//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → timeouts.rs (per-call deadline, failure classification)
//!     → On 429: retries.rs (retry or give up)
//!         → backoff.rs (cooldown before re-enqueue)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Throttling is the only retried outcome
//! - Retries go back through the rate governor, never around it

pub mod backoff;
pub mod retries;
pub mod timeouts;
