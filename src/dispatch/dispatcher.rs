//! Dispatcher.
//!
//! Every released job gets its own task: the outbound call runs concurrently
//! with other dispatches, and the governor has already moved on to the next
//! release. Outcomes:
//! - transport failure: 502 (504 on timeout) to the caller, terminal
//! - 429: cooldown, then back to the queue tail; the caller keeps waiting
//! - anything else: relayed verbatim, terminal

use std::time::Instant;

use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::dispatch::job::DispatchJob;
use crate::dispatch::queue::Requeue;
use crate::dispatch::tracker::InFlightTracker;
use crate::dispatch::Dispatch;
use crate::http::request::OutboundRequest;
use crate::http::response::{relay, GatewayError};
use crate::observability::metrics;
use crate::resilience::retries::{RetryDecision, ThrottlePolicy};
use crate::resilience::timeouts::TransportFailure;

/// Sends released jobs upstream and routes the outcome.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    requeue: Requeue,
    policy: ThrottlePolicy,
    tracker: InFlightTracker,
}

enum Attempt {
    Response(axum::response::Response),
    Throttled,
    Failed(TransportFailure),
}

impl Dispatcher {
    pub fn new(client: reqwest::Client, requeue: Requeue, policy: ThrottlePolicy, tracker: InFlightTracker) -> Self {
        Self {
            client,
            requeue,
            policy,
            tracker,
        }
    }

    /// Run one attempt for `job` and route its outcome.
    pub async fn execute(self, mut job: DispatchJob) {
        metrics::set_jobs_in_flight(self.tracker.active_count());

        match self.attempt(&job).await {
            Attempt::Response(response) => {
                job.complete(response);
            }
            Attempt::Failed(failure) => {
                job.complete(failure.gateway_error().into_response());
            }
            Attempt::Throttled => match self.policy.decide(job.retries) {
                RetryDecision::Retry(cooldown) => {
                    job.retries += 1;
                    tracing::warn!(
                        job_id = %job.id(),
                        request_id = %job.request_id,
                        retry = job.retries,
                        cooldown = ?cooldown,
                        "Upstream throttled, re-enqueueing"
                    );
                    tokio::time::sleep(cooldown).await;
                    if let Err(job) = self.requeue.resubmit(job).await {
                        tracing::error!(job_id = %job.id(), "Dispatch loop gone, cannot retry");
                        job.complete(GatewayError::Unreachable.into_response());
                    }
                }
                RetryDecision::GiveUp => {
                    tracing::warn!(
                        job_id = %job.id(),
                        request_id = %job.request_id,
                        retries = job.retries,
                        "Upstream still throttling, giving up"
                    );
                    job.complete(GatewayError::Throttled.into_response());
                }
            },
        }

        metrics::set_jobs_in_flight(self.tracker.active_count());
    }

    async fn attempt(&self, job: &DispatchJob) -> Attempt {
        let request = &job.request;
        let start = Instant::now();

        let result = match self.send(request).await {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    metrics::record_throttled();
                    Ok((status, None))
                } else {
                    let headers = response.headers().clone();
                    response.bytes().await.map(|body| (status, Some((headers, body))))
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((status, relayed)) => {
                metrics::record_dispatch(status.as_u16(), start);
                tracing::info!(
                    job_id = %job.id(),
                    request_id = %job.request_id,
                    attempt = job.retries + 1,
                    method = %request.method,
                    url = %request.redacted_url(),
                    status = status.as_u16(),
                    elapsed = ?start.elapsed(),
                    "Dispatched"
                );
                match relayed {
                    Some((headers, body)) => Attempt::Response(relay(status, headers, body)),
                    None => Attempt::Throttled,
                }
            }
            Err(e) => {
                let failure = TransportFailure::classify(&e);
                metrics::record_transport_error(failure.as_str());
                tracing::error!(
                    job_id = %job.id(),
                    request_id = %job.request_id,
                    attempt = job.retries + 1,
                    method = %request.method,
                    url = %request.redacted_url(),
                    kind = failure.as_str(),
                    error = %e,
                    elapsed = ?start.elapsed(),
                    "Upstream error"
                );
                Attempt::Failed(failure)
            }
        }
    }

    async fn send(&self, request: &OutboundRequest) -> reqwest::Result<reqwest::Response> {
        self.client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
    }
}

impl Dispatch for Dispatcher {
    fn dispatch(&self, job: DispatchJob) {
        let this = self.clone();
        tokio::spawn(this.execute(job));
    }
}
