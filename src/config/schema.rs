//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API and credential.
    pub upstream: UpstreamConfig,

    /// Outbound rate ceiling and queue sizing.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Throttle retry configuration.
    pub retries: RetryConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Inbound request limits.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Where the credential is placed on outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `Authorization: Bearer <key>`.
    #[default]
    Header,
    /// `api_key=<key>` appended to the query string.
    Query,
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API root the base id is appended to.
    pub api_root: String,

    /// Base identifier; the last path segment of the upstream base URL.
    pub base_id: String,

    /// Credential injected into every outbound request.
    pub api_key: String,

    /// Credential placement.
    pub auth_mode: AuthMode,
}

impl UpstreamConfig {
    /// Full upstream base URL (`api_root/base_id`), without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}/{}", self.api_root.trim_end_matches('/'), self.base_id)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_root: "https://api.airtable.com/v0".to_string(),
            base_id: String::new(),
            api_key: String::new(),
            auth_mode: AuthMode::Header,
        }
    }
}

/// How the governor spreads its per-second budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PacingStrategy {
    /// One release every `1s / N`.
    #[default]
    Spaced,
    /// Up to N releases at the top of each one-second window.
    Burst,
}

/// Highest accepted `requests_per_second`. Spaced windows stay at or above
/// one millisecond, the timer resolution.
pub const MAX_REQUESTS_PER_SECOND: u32 = 1_000;

/// Outbound rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum outbound requests per second.
    pub requests_per_second: u32,

    /// Release pacing within a second.
    pub pacing: PacingStrategy,

    /// Admission queue capacity; producers wait when it is full.
    pub queue_capacity: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            pacing: PacingStrategy::Spaced,
            queue_capacity: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per outbound call timeout in seconds.
    pub upstream_secs: u64,
}

impl TimeoutConfig {
    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { upstream_secs: 30 }
    }
}

/// Retry configuration for throttled (429) dispatches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Fixed cooldown before a throttled job is re-enqueued, in milliseconds.
    pub cooldown_ms: u64,

    /// Upper bound of random jitter added to the cooldown, as a fraction of it.
    pub jitter_ratio: f64,

    /// Maximum throttle retries per job. `0` retries forever.
    pub max_retries: u32,
}

impl RetryConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1000,
            jitter_ratio: 0.1,
            max_retries: 10,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Drain deadline in seconds. `0` waits for every admitted job.
    pub grace_secs: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Option<Duration> {
        (self.grace_secs > 0).then(|| Duration::from_secs(self.grace_secs))
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Prometheus endpoint bind address; metrics are off when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
