//! Admission queue.
//!
//! A bounded FIFO between the inbound handlers (many producers) and the rate
//! governor (single consumer). A full queue makes producers wait, so inbound
//! handlers absorb the backpressure instead of memory growing without bound.
//!
//! Throttled jobs re-enter through [`Requeue`] at the tail, behind anything
//! admitted in the meantime.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::dispatch::job::{Completion, DispatchJob};
use crate::dispatch::tracker::InFlightTracker;
use crate::http::request::OutboundRequest;

/// Error type for admission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmitError {
    /// The queue was closed for draining.
    #[error("admission queue is closed")]
    Closed,
    /// The governor loop is gone.
    #[error("dispatch loop has stopped")]
    Stopped,
}

/// Create a queue with room for `capacity` pending jobs.
pub fn admission_queue(capacity: usize, tracker: InFlightTracker) -> (Admitter, AdmissionReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (Admitter { tx, tracker }, AdmissionReceiver { rx })
}

/// Producer side used by inbound handlers.
#[derive(Debug, Clone)]
pub struct Admitter {
    tx: mpsc::Sender<DispatchJob>,
    tracker: InFlightTracker,
}

impl Admitter {
    /// Enqueue a translated request, waiting for a free slot if the queue is
    /// full. Returns the receiver the caller waits on for its response.
    pub async fn admit(&self, request: OutboundRequest, request_id: String) -> Result<Completion, AdmitError> {
        let guard = self.tracker.track().ok_or(AdmitError::Closed)?;
        let (job, completion) = DispatchJob::new(request, request_id, guard);
        let job_id = job.id();

        self.tx.send(job).await.map_err(|_| AdmitError::Stopped)?;
        tracing::trace!(job_id = %job_id, "Job admitted");
        Ok(completion)
    }

    /// Close the queue to new admissions. Jobs already admitted, including
    /// ones waiting on a throttle cooldown, still run to completion.
    pub fn close(&self) {
        if !self.tracker.is_closed() {
            tracing::info!(in_flight = self.tracker.active_count(), "Admission queue closed");
        }
        self.tracker.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Handle for putting throttled jobs back at the tail.
    pub fn requeue(&self) -> Requeue {
        Requeue { tx: self.tx.clone() }
    }

    pub fn tracker(&self) -> &InFlightTracker {
        &self.tracker
    }
}

/// Re-submission handle held by the dispatcher.
///
/// It bypasses the closed check: a retried job was admitted before any drain
/// began.
#[derive(Debug, Clone)]
pub struct Requeue {
    tx: mpsc::Sender<DispatchJob>,
}

impl Requeue {
    /// Append `job` at the tail. Hands the job back if the governor is gone.
    pub async fn resubmit(&self, job: DispatchJob) -> Result<(), DispatchJob> {
        self.tx.send(job).await.map_err(|mpsc::error::SendError(job)| job)
    }
}

/// Consumer side, owned by the rate governor.
#[derive(Debug)]
pub struct AdmissionReceiver {
    rx: mpsc::Receiver<DispatchJob>,
}

impl AdmissionReceiver {
    pub async fn recv(&mut self) -> Option<DispatchJob> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<DispatchJob> {
        self.rx.try_recv().ok()
    }
}

/// Shorthand for tests: an outbound GET with no headers or body.
#[cfg(test)]
pub(crate) fn test_request(path: &str) -> OutboundRequest {
    OutboundRequest {
        method: axum::http::Method::GET,
        url: url::Url::parse(&format!("http://upstream.test{}", path)).unwrap(),
        headers: axum::http::HeaderMap::new(),
        body: bytes::Bytes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order_with_requeue_at_tail() {
        let (admitter, mut rx) = admission_queue(8, InFlightTracker::new());

        let _a = admitter.admit(test_request("/a"), "a".into()).await.unwrap();
        let _b = admitter.admit(test_request("/b"), "b".into()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.request.url.path(), "/a");

        let _c = admitter.admit(test_request("/c"), "c".into()).await.unwrap();
        admitter.requeue().resubmit(first).await.unwrap();

        let order: Vec<String> = (0..3)
            .map(|_| rx.try_recv().unwrap().request.url.path().to_string())
            .collect();
        assert_eq!(order, vec!["/b", "/c", "/a"]);
    }

    #[tokio::test]
    async fn closed_queue_rejects_but_requeue_still_works() {
        let (admitter, mut rx) = admission_queue(8, InFlightTracker::new());
        let _a = admitter.admit(test_request("/a"), "a".into()).await.unwrap();
        let job = rx.recv().await.unwrap();

        admitter.close();
        let rejected = admitter.admit(test_request("/late"), "late".into()).await;
        assert_eq!(rejected.unwrap_err(), AdmitError::Closed);

        admitter.requeue().resubmit(job).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().request.url.path(), "/a");
    }

    #[tokio::test]
    async fn full_queue_blocks_producer() {
        let (admitter, mut rx) = admission_queue(1, InFlightTracker::new());
        let _a = admitter.admit(test_request("/a"), "a".into()).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(20),
            admitter.admit(test_request("/b"), "b".into()),
        )
        .await;
        assert!(blocked.is_err(), "second admit should wait for a free slot");

        rx.recv().await.unwrap();
        let admitted = admitter.admit(test_request("/c"), "c".into()).await;
        assert!(admitted.is_ok());
    }

    #[tokio::test]
    async fn stopped_governor_is_reported() {
        let (admitter, rx) = admission_queue(1, InFlightTracker::new());
        drop(rx);
        let result = admitter.admit(test_request("/a"), "a".into()).await;
        assert_eq!(result.unwrap_err(), AdmitError::Stopped);
        assert_eq!(admitter.tracker().active_count(), 0);
    }
}
