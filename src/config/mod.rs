//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment + flags (cli.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value with every subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the gateway is serving traffic
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_file, resolve, ConfigError};
pub use schema::{
    AuthMode, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, PacingStrategy,
    RateLimitConfig, RetryConfig, SecurityConfig, ShutdownConfig, TimeoutConfig, UpstreamConfig,
    MAX_REQUESTS_PER_SECOND,
};
pub use validation::{validate_config, ValidationError};
