//! Request admission, rate-governed dispatch and retry.
//!
//! # Data Flow
//! ```text
//! inbound handler
//!     → queue.rs (Admitter::admit, waits when full)
//!     → governor.rs (one release per window slot, FIFO)
//!     → dispatcher.rs (task per release, outbound call)
//!         → 429: cooldown → queue.rs (Requeue, at the tail)
//!         → otherwise: job.rs (complete, caller wakes up)
//!
//! Drain:
//!     Admitter::close → tracker.rs refuses new jobs
//!     → governor keeps releasing until the last job completes → stops
//! ```
//!
//! # Design Decisions
//! - The queue is the only structure shared between producers and consumer
//! - A job owns its completion sender; completing consumes the job
//! - The in-flight guard travels with the job across retries

pub mod dispatcher;
pub mod governor;
pub mod job;
pub mod queue;
pub mod tracker;

use std::num::NonZeroU32;

use tokio::task::JoinHandle;

use crate::config::{GatewayConfig, MAX_REQUESTS_PER_SECOND};
use crate::resilience::retries::ThrottlePolicy;
use crate::resilience::timeouts::upstream_client;

pub use dispatcher::Dispatcher;
pub use governor::{RateGovernor, RateWindow};
pub use job::{Completion, DispatchJob};
pub use queue::{admission_queue, AdmissionReceiver, AdmitError, Admitter, Requeue};
pub use tracker::{InFlightTracker, JobGuard, JobId};

/// Receives jobs released by the governor.
pub trait Dispatch: Send + 'static {
    /// Start processing `job`. Must not block the governor loop.
    fn dispatch(&self, job: DispatchJob);
}

/// Error type for engine startup.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("requests_per_second must be greater than zero")]
    ZeroRate,
    #[error("requests_per_second must be at most {}", MAX_REQUESTS_PER_SECOND)]
    RateTooHigh,
    #[error("queue_capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// The admission/governor/dispatcher pipeline, built but not yet running.
pub struct DispatchEngine {
    admitter: Admitter,
    governor: RateGovernor<Dispatcher>,
}

impl DispatchEngine {
    /// Build the pipeline from `config`.
    pub fn new(config: &GatewayConfig) -> Result<Self, EngineError> {
        let rate = NonZeroU32::new(config.rate_limit.requests_per_second).ok_or(EngineError::ZeroRate)?;
        if rate.get() > MAX_REQUESTS_PER_SECOND {
            return Err(EngineError::RateTooHigh);
        }
        if config.rate_limit.queue_capacity == 0 {
            return Err(EngineError::ZeroQueueCapacity);
        }
        let client = upstream_client(config.timeouts.upstream())?;

        let tracker = InFlightTracker::new();
        let (admitter, receiver) = admission_queue(config.rate_limit.queue_capacity, tracker.clone());
        let dispatcher = Dispatcher::new(
            client,
            admitter.requeue(),
            ThrottlePolicy::new(&config.retries),
            tracker.clone(),
        );
        let window = RateWindow::new(rate, config.rate_limit.pacing);

        Ok(Self {
            admitter,
            governor: RateGovernor::new(receiver, window, tracker, dispatcher),
        })
    }

    /// Handle for inbound handlers.
    pub fn admitter(&self) -> Admitter {
        self.admitter.clone()
    }

    /// Spawn the governor loop. The handle resolves once the queue has been
    /// closed and drained.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.governor.run())
    }
}
