//! Logging setup.
//!
//! All logs go to **stderr**. stdout carries the JSON result of `eks-compose`
//! and must stay machine-readable.
//!
//! # Quick Start
//!
//! ```ignore
//! use eks_component_sdk::init_logging;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Reads RUST_LOG
//!     init_logging();
//!
//!     tracing::info!("Composing cluster");
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (e.g. `info`, `eks_component_sdk=debug`)
//!
//! ```bash
//! # Per-request logs from the composer
//! RUST_LOG=eks_component_sdk=debug eks-compose --definition cluster.json
//!
//! # Include gRPC transport internals
//! RUST_LOG=debug,h2=info eks-compose --definition cluster.json
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Initialize the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LOG_LEVEL);
}

/// Like [`init_logging`], with a different fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = try_init_with(default_level) {
        panic!("failed to initialize logging: {}", e);
    }
}

/// Try to initialize logging, returning false if a subscriber already exists.
pub fn try_init_logging() -> bool {
    try_init_with(DEFAULT_LOG_LEVEL).is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can be set once per process, so only filter
    // parsing and the idempotent entry point are tested here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_LEVEL).is_ok());
        assert!(EnvFilter::try_new("eks_component_sdk=debug").is_ok());
        assert!(EnvFilter::try_new("warn,eks_component_sdk::compose=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        try_init_logging();
        assert!(!try_init_logging());
    }
}
