//! Timeout enforcement and transport failure classification.
//!
//! The per-call deadline is set on the upstream client, so it covers
//! connecting, sending and reading the whole response body. A call that runs
//! past it is reported as 504; every other transport failure as 502.

use std::time::Duration;

use crate::http::response::GatewayError;

/// Why an outbound call produced no usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Connect,
    Other,
}

impl TransportFailure {
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportFailure::Timeout
        } else if err.is_connect() {
            TransportFailure::Connect
        } else {
            TransportFailure::Other
        }
    }

    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportFailure::Timeout => "timeout",
            TransportFailure::Connect => "connect",
            TransportFailure::Other => "other",
        }
    }

    pub fn gateway_error(self) -> GatewayError {
        match self {
            TransportFailure::Timeout => GatewayError::Timeout,
            TransportFailure::Connect | TransportFailure::Other => GatewayError::Unreachable,
        }
    }
}

/// Build the upstream client with the per-call timeout applied.
pub fn upstream_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = upstream_client(Duration::from_secs(2)).unwrap();
        let err = client.get(format!("http://{}", addr)).send().await.unwrap_err();

        let failure = TransportFailure::classify(&err);
        assert_ne!(failure, TransportFailure::Timeout);
        assert_eq!(failure.gateway_error(), GatewayError::Unreachable);
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and never answer.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = upstream_client(Duration::from_millis(100)).unwrap();
        let err = client.get(format!("http://{}", addr)).send().await.unwrap_err();

        assert_eq!(TransportFailure::classify(&err), TransportFailure::Timeout);
        assert_eq!(TransportFailure::Timeout.gateway_error(), GatewayError::Timeout);
    }
}
