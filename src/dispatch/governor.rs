//! Rate governor.
//!
//! # Responsibilities
//! - Pull jobs from the admission queue in order
//! - Release at most N jobs per second to the dispatcher
//! - Stop once the queue is closed and every admitted job has finished
//!
//! # Design Decisions
//! - The window budget is owned by the governor loop alone
//! - Unused budget is never carried into a later window
//! - The gate controls release only; dispatch duration is not bounded here

use std::num::NonZeroU32;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::PacingStrategy;
use crate::dispatch::queue::AdmissionReceiver;
use crate::dispatch::tracker::InFlightTracker;
use crate::dispatch::Dispatch;

/// A recurring release window with a fixed budget.
///
/// `Spaced` pacing uses windows of `1s / N` with a budget of one; `Burst`
/// pacing uses one-second windows with a budget of N. A new window opens at
/// the first release after the previous one expired, with a fresh budget.
///
/// Windows are anchored to releases, not to a fixed clock. With `Burst`, a
/// sliding one-second span can therefore see up to `2N - 1` releases: the
/// tail of one window followed by the full budget of the next. `Spaced`
/// windows hold one release each, so any one-second span sees at most N + 1.
#[derive(Debug, Clone)]
pub struct RateWindow {
    length: Duration,
    budget: u32,
    remaining: u32,
    opened_at: Option<Instant>,
}

impl RateWindow {
    pub fn new(requests_per_second: NonZeroU32, pacing: PacingStrategy) -> Self {
        let (length, budget) = match pacing {
            PacingStrategy::Spaced => (Duration::from_secs(1) / requests_per_second.get(), 1),
            PacingStrategy::Burst => (Duration::from_secs(1), requests_per_second.get()),
        };
        Self {
            length,
            budget,
            remaining: budget,
            opened_at: None,
        }
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    /// Take one release at `now`, or return the instant the next window opens.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Instant> {
        match self.opened_at {
            Some(opened) if now < opened + self.length => {}
            _ => {
                self.opened_at = Some(now);
                self.remaining = self.budget;
            }
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            Ok(())
        } else {
            // `opened_at` was set above.
            Err(self.opened_at.map_or(now, |opened| opened + self.length))
        }
    }

    /// Wait until a release is allowed, then take it.
    pub async fn acquire(&mut self) {
        while let Err(next) = self.try_acquire(Instant::now()) {
            tokio::time::sleep_until(next).await;
        }
    }
}

/// Moves jobs from the admission queue to the dispatcher at the configured
/// rate.
pub struct RateGovernor<D> {
    queue: AdmissionReceiver,
    window: RateWindow,
    tracker: InFlightTracker,
    dispatcher: D,
}

impl<D: Dispatch> RateGovernor<D> {
    pub fn new(queue: AdmissionReceiver, window: RateWindow, tracker: InFlightTracker, dispatcher: D) -> Self {
        Self {
            queue,
            window,
            tracker,
            dispatcher,
        }
    }

    /// Run until the queue is closed and drained.
    pub async fn run(mut self) {
        tracing::info!(window = ?self.window.length(), "Rate governor starting");

        loop {
            let job = tokio::select! {
                biased;
                job = self.queue.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = self.tracker.drained() => break,
            };

            self.window.acquire().await;
            tracing::debug!(
                job_id = %job.id(),
                queued_for = ?job.admitted_at.elapsed(),
                retries = job.retries,
                "Job released"
            );
            self.dispatcher.dispatch(job);
        }

        tracing::info!("Rate governor drained and stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::job::DispatchJob;
    use crate::dispatch::queue::{admission_queue, test_request};
    use std::sync::{Arc, Mutex};

    fn rps(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn spaced_window_allows_one_per_slot() {
        let mut window = RateWindow::new(rps(5), PacingStrategy::Spaced);
        let start = Instant::now();

        assert!(window.try_acquire(start).is_ok());
        let next = window.try_acquire(start).unwrap_err();
        assert_eq!(next, start + Duration::from_millis(200));
        assert!(window.try_acquire(start + Duration::from_millis(199)).is_err());
        assert!(window.try_acquire(start + Duration::from_millis(200)).is_ok());
    }

    #[test]
    fn burst_window_allows_n_then_blocks() {
        let mut window = RateWindow::new(rps(3), PacingStrategy::Burst);
        let start = Instant::now();

        for _ in 0..3 {
            assert!(window.try_acquire(start).is_ok());
        }
        assert_eq!(window.try_acquire(start).unwrap_err(), start + Duration::from_secs(1));
        assert!(window.try_acquire(start + Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn idle_time_is_not_banked() {
        let mut window = RateWindow::new(rps(2), PacingStrategy::Burst);
        let start = Instant::now();

        assert!(window.try_acquire(start).is_ok());
        // Ten idle seconds later only one window's budget is available.
        let later = start + Duration::from_secs(10);
        assert!(window.try_acquire(later).is_ok());
        assert!(window.try_acquire(later).is_ok());
        assert!(window.try_acquire(later).is_err());
    }

    #[test]
    fn burst_windows_follow_releases_not_the_clock() {
        let mut window = RateWindow::new(rps(3), PacingStrategy::Burst);
        let start = Instant::now();
        let late = start + Duration::from_millis(900);
        let next = start + Duration::from_secs(1);

        assert!(window.try_acquire(start).is_ok());
        assert!(window.try_acquire(late).is_ok());
        assert!(window.try_acquire(late).is_ok());
        for _ in 0..3 {
            assert!(window.try_acquire(next).is_ok());
        }
        // Five releases within 100ms, and no more until the window ends.
        assert_eq!(window.try_acquire(next).unwrap_err(), next + Duration::from_secs(1));
    }

    #[derive(Clone, Default)]
    struct Recorder {
        released: Arc<Mutex<Vec<(String, Instant)>>>,
    }

    impl Dispatch for Recorder {
        fn dispatch(&self, job: DispatchJob) {
            let path = job.request.url.path().to_string();
            self.released.lock().unwrap().push((path, Instant::now()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn releases_in_order_and_at_rate() {
        let tracker = InFlightTracker::new();
        let (admitter, rx) = admission_queue(16, tracker.clone());
        let recorder = Recorder::default();
        let governor = RateGovernor::new(
            rx,
            RateWindow::new(rps(4), PacingStrategy::Spaced),
            tracker,
            recorder.clone(),
        );
        let handle = tokio::spawn(governor.run());

        let mut completions = Vec::new();
        for i in 0..8 {
            completions.push(admitter.admit(test_request(&format!("/{}", i)), i.to_string()).await.unwrap());
        }
        tokio::time::sleep(Duration::from_secs(3)).await;

        let released = recorder.released.lock().unwrap().clone();
        let paths: Vec<&str> = released.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/0", "/1", "/2", "/3", "/4", "/5", "/6", "/7"]);
        for pair in released.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(250));
        }

        admitter.close();
        drop(completions);
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_close_once_jobs_finish() {
        let tracker = InFlightTracker::new();
        let (admitter, rx) = admission_queue(4, tracker.clone());
        let governor = RateGovernor::new(
            rx,
            RateWindow::new(rps(10), PacingStrategy::Spaced),
            tracker,
            Recorder::default(),
        );
        let handle = tokio::spawn(governor.run());

        admitter.close();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
