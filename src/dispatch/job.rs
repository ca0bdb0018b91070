//! The unit of work flowing through the admission queue.

use axum::response::Response;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::dispatch::tracker::{JobGuard, JobId};
use crate::http::request::OutboundRequest;

/// Receives the terminal response of a job.
pub type Completion = oneshot::Receiver<Response>;

/// An outbound request paired with the way back to its caller.
///
/// The completion sender is consumed by [`DispatchJob::complete`], so a job
/// can signal its caller at most once. Retries move the same job back into
/// the queue and keep the same sender.
#[derive(Debug)]
pub struct DispatchJob {
    pub request: OutboundRequest,
    /// Inbound request ID, for log correlation.
    pub request_id: String,
    /// Throttle retries performed so far.
    pub retries: u32,
    pub admitted_at: Instant,
    completion: oneshot::Sender<Response>,
    guard: JobGuard,
}

impl DispatchJob {
    /// Create a job and the receiver its caller waits on.
    pub fn new(request: OutboundRequest, request_id: String, guard: JobGuard) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        let job = Self {
            request,
            request_id,
            retries: 0,
            admitted_at: Instant::now(),
            completion: tx,
            guard,
        };
        (job, rx)
    }

    pub fn id(&self) -> JobId {
        self.guard.id()
    }

    /// Deliver the terminal response and release the job.
    ///
    /// Returns false if the caller went away before the response arrived.
    pub fn complete(self, response: Response) -> bool {
        let id = self.id();
        let delivered = self.completion.send(response).is_ok();
        if !delivered {
            tracing::debug!(job_id = %id, request_id = %self.request_id, "Caller gone, response discarded");
        }
        delivered
    }
}
