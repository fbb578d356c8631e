//! Configuration management for treewatch.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Defaults (lowest priority)

mod settings;

pub use settings::{Config, OutputFormat};
