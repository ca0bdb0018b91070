//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. All errors are
//! collected so an operator sees every problem at once.

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::config::schema::{GatewayConfig, MAX_REQUESTS_PER_SECOND};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api key missing")]
    MissingApiKey,
    #[error("base id missing")]
    MissingBaseId,
    #[error("invalid upstream base url {url:?}: {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),
    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
    #[error("requests_per_second must be greater than zero")]
    ZeroRate,
    #[error("requests_per_second must be at most {max}, got {got}")]
    RateTooHigh { got: u32, max: u32 },
    #[error("upstream timeout must be greater than zero")]
    ZeroTimeout,
    #[error("queue_capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("jitter_ratio must be within 0.0..=1.0, got {0}")]
    JitterOutOfRange(String),
    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),
}

/// Validate a configuration before it is accepted into the system.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }
    if config.upstream.base_id.trim().is_empty() {
        errors.push(ValidationError::MissingBaseId);
    } else {
        let base_url = config.upstream.base_url();
        match Url::parse(&base_url) {
            Ok(url) if url.cannot_be_a_base() => errors.push(ValidationError::InvalidUpstreamUrl {
                url: base_url,
                reason: "not a base url".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidUpstreamUrl {
                url: base_url,
                reason: e.to_string(),
            }),
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListenAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::ZeroRate);
    } else if config.rate_limit.requests_per_second > MAX_REQUESTS_PER_SECOND {
        errors.push(ValidationError::RateTooHigh {
            got: config.rate_limit.requests_per_second,
            max: MAX_REQUESTS_PER_SECOND,
        });
    }
    if config.rate_limit.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if !(0.0..=1.0).contains(&config.retries.jitter_ratio) {
        errors.push(ValidationError::JitterOutOfRange(
            config.retries.jitter_ratio.to_string(),
        ));
    }
    if config.observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
