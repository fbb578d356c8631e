//! treewatch
//!
//! Recursive filesystem change notification: watch a file or a directory
//! tree and receive create, change and delete events for every node in it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::Path;

pub mod config;
pub mod error;
pub mod observability;
pub mod watcher;

pub use config::{Config, OutputFormat};
pub use error::{Error, Result, WatchError};
pub use watcher::{EventKind, PathStat, WatchEvent, WatchOptions, WatchTree};

/// Create a watch tree and start watching `path`.
///
/// Events emitted while the initial tree is set up are not observable
/// through this constructor; build the tree with [`WatchTree::new`] and
/// subscribe first if they matter.
///
/// # Errors
///
/// Returns an error if the backend cannot start or `path` cannot be watched.
pub fn watch(path: impl AsRef<Path>, options: WatchOptions) -> Result<WatchTree> {
    let mut tree = WatchTree::new(options)?;
    tree.watch(path)?;
    Ok(tree)
}
