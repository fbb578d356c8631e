//! Recursive file system watching.
//!
//! This module provides:
//! - The watch tree, which keeps one subscription per watched path
//! - Path inspection and single-path watch primitives it builds on
//! - Typed events and activity counters

mod events;
mod inspector;
mod primitive;
mod stats;
mod tree;

pub use events::{EventKind, Subscriber, WatchEvent};
pub use inspector::{OsInspector, PathInspector, PathStat};
pub use primitive::{
    ManualPrimitive, Notification, NotificationSink, NotifyPrimitive, SubscriptionId,
    WatchPrimitive,
};
pub use stats::{WatcherStats, WatcherStatsSnapshot};
pub use tree::{WatchOptions, WatchTree};
