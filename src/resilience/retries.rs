//! Throttle retry policy.
//!
//! # Responsibilities
//! - Decide whether a throttled (429) job goes back into the queue
//! - Pick the cooldown before it does
//!
//! # Design Decisions
//! - Only throttling is retried; transport errors and other statuses are
//!   terminal
//! - The cooldown is fixed (plus jitter), not exponential
//! - A retry bound of zero keeps retrying for as long as the upstream throttles

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::cooldown_with_jitter;

/// What to do with a throttled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after the given cooldown.
    Retry(Duration),
    /// Stop and report the upstream as unavailable.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    cooldown: Duration,
    jitter_ratio: f64,
    max_retries: Option<u32>,
}

impl ThrottlePolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            jitter_ratio: config.jitter_ratio,
            max_retries: (config.max_retries > 0).then_some(config.max_retries),
        }
    }

    /// Decide for a job that has already been retried `retries` times.
    pub fn decide(&self, retries: u32) -> RetryDecision {
        match self.max_retries {
            Some(max) if retries >= max => RetryDecision::GiveUp,
            _ => RetryDecision::Retry(cooldown_with_jitter(self.cooldown, self.jitter_ratio)),
        }
    }
}
