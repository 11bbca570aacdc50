//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to decide where they go.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use wagerpot_types::{Result, WagerpotError};

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"wagerpot_settlement=debug,info"`.
    pub log_level: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `WAGERPOT_LOG_LEVEL` and `WAGERPOT_JSON_LOGS` over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(level) = std::env::var("WAGERPOT_LOG_LEVEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
        {
            cfg.log_level = level;
        }
        if let Ok(json) = std::env::var("WAGERPOT_JSON_LOGS") {
            cfg.json_logs = matches!(json.trim(), "1" | "true" | "yes");
        }
        cfg
    }
}

/// Install the global subscriber.
///
/// # Errors
/// `Configuration` if the filter does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| WagerpotError::Configuration(format!("log filter: {e}")))?;

    let installed = if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    installed.map_err(|e| WagerpotError::Configuration(format!("tracing init: {e}")))?;

    tracing::info!(
        engine = wagerpot_types::constants::ENGINE_NAME,
        version = wagerpot_types::constants::VERSION,
        json = config.json_logs,
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        let cfg = TelemetryConfig::default();
        let _ = init_tracing(&cfg);
        assert!(matches!(
            init_tracing(&cfg),
            Err(WagerpotError::Configuration(_))
        ));
    }

    #[test]
    fn default_is_human_readable_info() {
        let cfg = TelemetryConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.json_logs);
    }
}
