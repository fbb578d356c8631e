//! Counters for watch tree activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::events::WatchEvent;

/// Statistics for a watch tree.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub notifications: AtomicU64,
    pub watched: AtomicU64,
    pub created: AtomicU64,
    pub changed: AtomicU64,
    pub suppressed: AtomicU64,
    pub deleted: AtomicU64,
    pub unwatched: AtomicU64,
    pub errors: AtomicU64,
}

impl WatcherStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count an emitted event.
    pub fn record(&self, event: &WatchEvent) {
        let counter = match event {
            WatchEvent::Watch { .. } => &self.watched,
            WatchEvent::Create { .. } => &self.created,
            WatchEvent::Change { .. } => &self.changed,
            WatchEvent::Delete { .. } => &self.deleted,
            WatchEvent::Unwatch { .. } => &self.unwatched,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            notifications: self.notifications.load(Ordering::Relaxed),
            watched: self.watched.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            changed: self.changed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            unwatched: self.unwatched.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub notifications: u64,
    pub watched: u64,
    pub created: u64,
    pub changed: u64,
    pub suppressed: u64,
    pub deleted: u64,
    pub unwatched: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = WatcherStats::new();
        assert_eq!(stats.snapshot(), WatcherStatsSnapshot::default());
    }

    #[test]
    fn test_record_counts_by_kind() {
        let stats = WatcherStats::new();
        let path = PathBuf::from("/w/a.txt");

        stats.record(&WatchEvent::Watch { path: path.clone() });
        stats.record(&WatchEvent::Unwatch { path: path.clone() });
        stats.record(&WatchEvent::Delete { path });
        stats.suppressed.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.watched, 1);
        assert_eq!(snapshot.unwatched, 1);
        assert_eq!(snapshot.deleted, 1);
        assert_eq!(snapshot.suppressed, 2);
        assert_eq!(snapshot.created, 0);
    }
}
