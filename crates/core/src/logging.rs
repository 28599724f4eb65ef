use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::CoreError;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `trade_journal_core=debug`
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

/// Install a console subscriber for the host application.
///
/// The library itself only emits `tracing` events; call this once from the
/// binary or UI shell. A second call returns `CoreError::Config`.
pub fn init_logging(config: LoggingConfig) -> Result<(), CoreError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| CoreError::Config(format!("Invalid log filter '{}': {e}", config.log_level)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| CoreError::Config(format!("Logging already initialised: {e}")))?;

    tracing::debug!(level = %config.log_level, "logging initialised");
    Ok(())
}
