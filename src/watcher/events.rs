//! Watch tree event types and subscribers.

#![allow(clippy::missing_const_for_fn)]

use std::fmt;
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use serde::Serialize;

use super::inspector::PathStat;

/// Kind of a watch tree event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Watch,
    Create,
    Change,
    Delete,
    Unwatch,
}

impl EventKind {
    /// Lowercase name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watch => "watch",
            Self::Create => "create",
            Self::Change => "change",
            Self::Delete => "delete",
            Self::Unwatch => "unwatch",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted by a watch tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WatchEvent {
    /// Path is now actively monitored.
    Watch { path: PathBuf },
    /// Path appeared under a watched directory.
    Create { path: PathBuf, stat: PathStat },
    /// Watched file's modification time advanced.
    Change { path: PathBuf, stat: PathStat },
    /// Watched path disappeared.
    Delete { path: PathBuf },
    /// Path is no longer monitored.
    Unwatch { path: PathBuf },
}

impl WatchEvent {
    /// Get the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Watch { .. } => EventKind::Watch,
            Self::Create { .. } => EventKind::Create,
            Self::Change { .. } => EventKind::Change,
            Self::Delete { .. } => EventKind::Delete,
            Self::Unwatch { .. } => EventKind::Unwatch,
        }
    }

    /// Get the path this event is about.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Watch { path }
            | Self::Create { path, .. }
            | Self::Change { path, .. }
            | Self::Delete { path }
            | Self::Unwatch { path } => path,
        }
    }

    /// Get the stat snapshot carried by create and change events.
    #[must_use]
    pub fn stat(&self) -> Option<&PathStat> {
        match self {
            Self::Create { stat, .. } | Self::Change { stat, .. } => Some(stat),
            _ => None,
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path().display())
    }
}

/// Receiver of watch tree events.
pub trait Subscriber {
    /// Called once per emitted event, in emission order.
    fn on_event(&mut self, event: &WatchEvent);
}

impl<F> Subscriber for F
where
    F: FnMut(&WatchEvent),
{
    fn on_event(&mut self, event: &WatchEvent) {
        self(event);
    }
}

/// Subscriber that forwards copies of events into a channel.
#[derive(Debug)]
pub(crate) struct ChannelSubscriber(pub(crate) Sender<WatchEvent>);

impl Subscriber for ChannelSubscriber {
    fn on_event(&mut self, event: &WatchEvent) {
        // A dropped receiver just stops listening.
        let _ = self.0.send(event.clone());
    }
}
