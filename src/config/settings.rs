//! Configuration settings and validation.

use crate::watcher::WatchOptions;
use crate::{Error, Result};
use std::path::PathBuf;

/// How the CLI prints events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `kind path` per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Main configuration for the treewatch CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Files or directories to watch.
    pub paths: Vec<PathBuf>,

    /// Watch the existing subtree of directories.
    pub recurse: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON.
    pub log_json: bool,

    /// Event output format.
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            recurse: true,
            log_level: "info".to_string(),
            log_json: false,
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(Error::config("at least one path to watch is required"));
        }

        if let Some(empty) = self.paths.iter().find(|p| p.as_os_str().is_empty()) {
            return Err(Error::config(format!("invalid empty path {empty:?}")));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Options applied to every watched path.
    #[must_use]
    pub const fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            recurse: self.recurse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_path() -> Config {
        Config {
            paths: vec![PathBuf::from("/srv/data")],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.recurse);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.output, OutputFormat::Text);
        assert!(with_path().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_paths() {
        let err = Config::new().validate().unwrap_err();
        assert!(err.to_string().contains("at least one path"));
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let config = Config {
            paths: vec![PathBuf::new()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("empty path"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..with_path()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..with_path()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }

    #[test]
    fn test_watch_options() {
        let config = Config {
            recurse: false,
            ..with_path()
        };
        assert!(!config.watch_options().recurse);
        assert!(with_path().watch_options().recurse);
    }
}
