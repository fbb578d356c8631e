//! Filesystem metadata access used by the watch tree.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::WatchError;
use crate::Result;

/// Snapshot of a path's metadata, taken fresh for every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathStat {
    /// Path is a directory.
    pub is_dir: bool,
    /// Path is a regular file.
    pub is_file: bool,
    /// Last modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl PathStat {
    /// Whether the path is something the tree can watch.
    #[must_use]
    pub const fn is_watchable(&self) -> bool {
        self.is_dir || self.is_file
    }
}

impl From<&fs::Metadata> for PathStat {
    fn from(meta: &fs::Metadata) -> Self {
        Self {
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

/// Source of filesystem facts for the watch tree.
pub trait PathInspector {
    /// Stat a path, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::NotFound` if the path is missing, or
    /// `WatchError::StatFailed` for any other failure.
    fn stat(&self, path: &Path) -> Result<PathStat>;

    /// Test whether a path currently exists.
    fn exists(&self, path: &Path) -> bool;

    /// List the names of a directory's immediate children.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::ListFailed` if the directory cannot be read.
    fn list_children(&self, path: &Path) -> Result<Vec<OsString>>;
}

/// Inspector backed by the operating system's filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsInspector;

impl PathInspector for OsInspector {
    fn stat(&self, path: &Path) -> Result<PathStat> {
        let meta = fs::metadata(path).map_err(|e| WatchError::stat(path, &e))?;
        Ok(PathStat::from(&meta))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_children(&self, path: &Path) -> Result<Vec<OsString>> {
        let entries = fs::read_dir(path).map_err(|e| WatchError::list(path, &e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WatchError::list(path, &e))?;
            names.push(entry.file_name());
        }
        names.sort();

        Ok(names)
    }
}
