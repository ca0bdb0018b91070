//! airtabler: rate-governed reverse proxy for the Airtable API.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────────┐
//!                        │                        AIRTABLER                         │
//!                        │                                                          │
//!   Client Request       │  ┌──────────┐   ┌───────────┐   ┌─────────────────┐     │
//!   ─────────────────────┼─▶│  http    │──▶│ translate │──▶│ admission queue │     │
//!                        │  │  server  │   │ + api key │   │  (bounded FIFO) │     │
//!                        │  └────▲─────┘   └───────────┘   └────────┬────────┘     │
//!                        │       │                                  │              │
//!                        │       │ completion                       ▼              │
//!                        │       │                         ┌─────────────────┐     │
//!                        │       │                         │  rate governor  │     │
//!                        │       │                         │  (N per second) │     │
//!                        │       │                         └────────┬────────┘     │
//!                        │       │                                  │              │
//!   Client Response      │  ┌────┴─────┐    429: cooldown  ┌────────▼────────┐     │
//!   ◀────────────────────┼──│ response │◀──── requeue ─────│   dispatcher    │─────┼──▶ Upstream
//!                        │  │  relay   │◀──────────────────│ (task per job)  │◀────┼─── API
//!                        │  └──────────┘                   └─────────────────┘     │
//!                        │                                                          │
//!                        │  config · lifecycle (drain) · observability · resilience │
//!                        └──────────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use airtabler::config::{self, Cli, ObservabilityConfig};
use airtabler::lifecycle::startup;
use airtabler::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        requests_per_second = config.rate_limit.requests_per_second,
        pacing = ?config.rate_limit.pacing,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "airtabler starting"
    );

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
