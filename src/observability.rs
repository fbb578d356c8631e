//! Structured logging configuration.
//!
//! Sets up the `tracing` subscriber with a plain or JSON formatter and an
//! `EnvFilter` that `RUST_LOG` can override.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl From<&crate::Config> for TracingConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            level: config.log_level.to_lowercase(),
            json: config.log_json,
        }
    }
}

/// Initialize tracing with the given configuration.
///
/// Logs go to stderr so stdout stays free for events.
///
/// # Panics
///
/// Panics if tracing subscriber has already been initialized in this process.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!(
        "Tracing initialized: level={}, json={}",
        config.level,
        config.json
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_tracing_config_from_config() {
        let config = crate::Config {
            log_level: "DEBUG".to_string(),
            log_json: true,
            ..Default::default()
        };
        let tracing = TracingConfig::from(&config);
        assert_eq!(tracing.level, "debug");
        assert!(tracing.json);
    }
}
