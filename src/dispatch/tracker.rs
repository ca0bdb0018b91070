//! In-flight job tracking for drain.
//!
//! # Responsibilities
//! - Count admitted jobs that have not reached a terminal outcome
//! - Refuse new admissions once closed
//! - Let the governor wait until a closed queue has fully drained
//! - Generate unique job IDs for tracing

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Global atomic counter for job IDs.
/// Relaxed ordering is enough; only uniqueness matters.
static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a dispatch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    /// Generate a new unique job ID.
    pub fn new() -> Self {
        Self(JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    closed: AtomicBool,
    changed: Notify,
}

/// Tracks admitted jobs so shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<Inner>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new admitted job. Returns `None` once the tracker is closed.
    pub fn track(&self) -> Option<JobGuard> {
        // Count first, then check: a concurrent `close` either sees this job
        // or this call sees the close.
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        if self.inner.closed.load(Ordering::SeqCst) {
            self.release();
            return None;
        }
        Some(JobGuard {
            tracker: self.clone(),
            id: JobId::new(),
        })
    }

    /// Stop accepting new jobs. Already admitted jobs are unaffected.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Current number of admitted, unfinished jobs.
    pub fn active_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Resolves once the tracker is closed and every admitted job finished.
    pub async fn drained(&self) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() && self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
    }
}

/// Guard held by a job for its whole life, across retries.
/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct JobGuard {
    tracker: InFlightTracker,
    id: JobId,
}

impl JobGuard {
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.tracker.release();
        tracing::trace!(job_id = %self.id, "Job finished");
    }
}
