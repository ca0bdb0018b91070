//! Command-line flags with environment fallbacks.
//!
//! Every flag is optional; unset flags leave the file/default value alone.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{AuthMode, GatewayConfig, LogFormat, PacingStrategy};

#[derive(Debug, Default, Parser)]
#[command(name = "airtabler")]
#[command(about = "Rate-governed reverse proxy for the Airtable API", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address.
    #[arg(long)]
    pub addr: Option<String>,

    /// Airtable base id.
    #[arg(long = "baseid", env = "AIRTABLE_BASE_ID")]
    pub base_id: Option<String>,

    /// Airtable API key.
    #[arg(long = "apikey", env = "AIRTABLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API root the base id is appended to.
    #[arg(long)]
    pub api_root: Option<String>,

    /// Credential placement on outbound requests.
    #[arg(long, value_enum)]
    pub auth_mode: Option<AuthMode>,

    /// Outbound requests per second.
    #[arg(long)]
    pub rate: Option<u32>,

    /// Release pacing within a second.
    #[arg(long, value_enum)]
    pub pacing: Option<PacingStrategy>,

    /// Admission queue capacity.
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Upstream request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Cooldown before a throttled request is retried, in milliseconds.
    #[arg(long)]
    pub cooldown_ms: Option<u64>,

    /// Maximum throttle retries per request (0 = unlimited).
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Shutdown drain deadline in seconds (0 = wait for every request).
    #[arg(long)]
    pub grace_secs: Option<u64>,

    /// Log level.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Prometheus metrics endpoint address.
    #[arg(long)]
    pub metrics_addr: Option<String>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }

        set(&mut config.listener.bind_address, &self.addr);
        set(&mut config.upstream.base_id, &self.base_id);
        set(&mut config.upstream.api_key, &self.api_key);
        set(&mut config.upstream.api_root, &self.api_root);
        set(&mut config.upstream.auth_mode, &self.auth_mode);
        set(&mut config.rate_limit.requests_per_second, &self.rate);
        set(&mut config.rate_limit.pacing, &self.pacing);
        set(&mut config.rate_limit.queue_capacity, &self.queue_capacity);
        set(&mut config.timeouts.upstream_secs, &self.timeout_secs);
        set(&mut config.retries.cooldown_ms, &self.cooldown_ms);
        set(&mut config.retries.max_retries, &self.max_retries);
        set(&mut config.shutdown.grace_secs, &self.grace_secs);
        set(&mut config.observability.log_level, &self.log_level);
        set(&mut config.observability.log_format, &self.log_format);
        if self.metrics_addr.is_some() {
            config.observability.metrics_address = self.metrics_addr.clone();
        }
    }
}
