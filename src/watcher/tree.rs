//! Recursive watch tree.
//!
//! A [`WatchTree`] keeps one low-level subscription per watched path and
//! turns raw "something happened here" notifications into create, change
//! and delete events. Notifications carry no payload the tree trusts: every
//! one is answered by a fresh stat (and, for directories, a fresh listing).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver};

use super::events::{ChannelSubscriber, Subscriber, WatchEvent};
use super::inspector::{OsInspector, PathInspector, PathStat};
use super::primitive::{
    Notification, NotificationSink, NotifyPrimitive, SubscriptionId, WatchPrimitive,
};
use super::stats::WatcherStats;
use crate::{Error, Result};

/// Options for watching a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Watch the existing subtree of a directory at setup.
    pub recurse: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { recurse: true }
    }
}

/// Registry entry for one watched path.
#[derive(Debug)]
struct WatchHandle {
    /// `None` once released.
    subscription: Option<SubscriptionId>,
    options: WatchOptions,
    last_change: Option<DateTime<Utc>>,
}

impl WatchHandle {
    fn release<P: WatchPrimitive>(&mut self, primitive: &mut P, path: &Path) {
        let Some(id) = self.subscription.take() else {
            return;
        };
        if let Err(e) = primitive.release(id) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to release watch");
        }
    }
}

/// Recursive watcher over files and directory trees.
///
/// All work happens on the caller's thread: notifications queue up in a
/// channel and are handled by [`process_pending`](Self::process_pending),
/// [`process_timeout`](Self::process_timeout) or [`run`](Self::run).
pub struct WatchTree<I: PathInspector = OsInspector, P: WatchPrimitive = NotifyPrimitive> {
    inspector: I,
    primitive: P,
    registry: HashMap<PathBuf, WatchHandle>,
    options: WatchOptions,
    subscribers: Vec<Box<dyn Subscriber>>,
    sink: NotificationSink,
    notifications: Receiver<Notification>,
    stats: Arc<WatcherStats>,
}

impl WatchTree {
    /// Create a watch tree backed by the OS filesystem and `notify`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new(options: WatchOptions) -> Result<Self> {
        Ok(Self::with_backend(OsInspector, NotifyPrimitive::new()?, options))
    }
}

impl<I: PathInspector, P: WatchPrimitive> WatchTree<I, P> {
    /// Create a watch tree over custom collaborators.
    #[must_use]
    pub fn with_backend(inspector: I, primitive: P, options: WatchOptions) -> Self {
        let (tx, notifications) = unbounded();
        Self {
            inspector,
            primitive,
            registry: HashMap::new(),
            options,
            subscribers: Vec::new(),
            sink: NotificationSink::new(tx),
            notifications,
            stats: WatcherStats::new(),
        }
    }

    /// Register a callback for every subsequent event.
    pub fn on_event<S: Subscriber + 'static>(&mut self, subscriber: S) -> &mut Self {
        self.subscribers.push(Box::new(subscriber));
        self
    }

    /// Get a channel that receives a copy of every subsequent event.
    pub fn subscribe(&mut self) -> Receiver<WatchEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(Box::new(ChannelSubscriber(tx)));
        rx
    }

    /// Watch a path with the tree's default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the path (or, when recursing, any node below it)
    /// cannot be stat'ed, listed or subscribed.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let options = self.options;
        self.watch_with(path, options)
    }

    /// Watch a path with explicit options.
    ///
    /// Watching an already watched path installs nothing new for it, but a
    /// recursive call still descends into its children.
    ///
    /// # Errors
    ///
    /// Same as [`watch`](Self::watch).
    pub fn watch_with(&mut self, path: impl AsRef<Path>, options: WatchOptions) -> Result<&mut Self> {
        let path = absolute(path.as_ref())?;
        tracing::info!(path = %path.display(), recurse = options.recurse, "Watching path");

        self.install(&path, options)?;
        Ok(self)
    }

    /// Stop watching a single path. The `unwatch` event fires even if the
    /// path was never watched.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = absolute_or_given(path.as_ref());
        self.unwatch_path(&path);
        self
    }

    /// Stop watching every path.
    pub fn clear(&mut self) -> &mut Self {
        let mut paths: Vec<PathBuf> = self.registry.keys().cloned().collect();
        paths.sort();

        for path in paths {
            self.unwatch_path(&path);
        }
        self
    }

    /// Handle every queued notification without blocking.
    ///
    /// Returns the number of notifications handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            self.dispatch(&notification);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a notification, then handle everything queued.
    ///
    /// Returns the number of notifications handled.
    pub fn process_timeout(&mut self, timeout: Duration) -> usize {
        match self.notifications.recv_timeout(timeout) {
            Ok(notification) => {
                self.dispatch(&notification);
                1 + self.process_pending()
            }
            Err(_) => 0,
        }
    }

    /// Handle notifications until nothing is left to watch.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification channel closes.
    pub fn run(&mut self) -> Result<()> {
        while !self.registry.is_empty() {
            let notification = self
                .notifications
                .recv()
                .map_err(|e| Error::internal(format!("notification channel closed: {e}")))?;
            self.dispatch(&notification);
        }

        tracing::info!("Nothing left to watch");
        Ok(())
    }

    /// Re-derive the state of `path` after the primitive reported activity.
    ///
    /// Queued notifications go through a subscription check first; calling
    /// this directly skips it.
    pub fn handle_notification(&mut self, path: &Path) {
        let path = absolute_or_given(path);
        let _span = tracing::debug_span!("notification", path = %path.display()).entered();
        self.stats.notifications.fetch_add(1, Ordering::Relaxed);

        if !self.inspector.exists(&path) {
            self.remove_missing(&path);
            return;
        }

        let stat = match self.inspector.stat(&path) {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => {
                self.remove_missing(&path);
                return;
            }
            Err(e) => {
                self.handler_error(&path, &e);
                return;
            }
        };

        if stat.is_file {
            self.file_changed(&path, stat);
        } else if stat.is_dir {
            self.dir_changed(&path, stat);
        }
    }

    /// Whether `path` is currently watched.
    #[must_use]
    pub fn is_watched(&self, path: impl AsRef<Path>) -> bool {
        self.registry
            .contains_key(&absolute_or_given(path.as_ref()))
    }

    /// All watched paths, sorted.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.registry.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of watched paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Default options of this tree.
    #[must_use]
    pub const fn options(&self) -> WatchOptions {
        self.options
    }

    /// Shared activity counters.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }

    /// The watch primitive in use.
    #[must_use]
    pub const fn primitive(&self) -> &P {
        &self.primitive
    }

    /// Install watches on `path` and, when recursing, its existing subtree.
    ///
    /// Children are installed before their parent. Returns the stat of
    /// `path` if a new watch was installed for it.
    fn install(&mut self, path: &Path, options: WatchOptions) -> Result<Option<PathStat>> {
        let stat = self.inspector.stat(path)?;

        if stat.is_dir && options.recurse {
            for name in self.inspector.list_children(path)? {
                self.install(&path.join(name), options)?;
            }
        }

        if self.registry.contains_key(path) {
            tracing::trace!(path = %path.display(), "Already watched");
            return Ok(None);
        }

        if !stat.is_watchable() {
            tracing::debug!(path = %path.display(), "Skipping path that is neither file nor directory");
            return Ok(None);
        }

        let id = self.primitive.subscribe(path, &self.sink)?;
        self.registry.insert(
            path.to_path_buf(),
            WatchHandle {
                subscription: Some(id),
                options,
                last_change: None,
            },
        );
        self.emit(WatchEvent::Watch {
            path: path.to_path_buf(),
        });

        Ok(Some(stat))
    }

    /// Handle a queued notification if the subscription that raised it is
    /// still the live one for its path.
    fn dispatch(&mut self, notification: &Notification) {
        let live = self
            .registry
            .get(&notification.path)
            .is_some_and(|handle| handle.subscription == Some(notification.id));

        if live {
            self.handle_notification(&notification.path);
        } else {
            tracing::trace!(
                path = %notification.path.display(),
                "Dropping notification from released subscription"
            );
        }
    }

    fn file_changed(&mut self, path: &Path, stat: PathStat) {
        let Some(handle) = self.registry.get_mut(path) else {
            tracing::trace!("Ignoring notification for unwatched file");
            return;
        };

        let newer = match (stat.modified, handle.last_change) {
            (Some(now), Some(last)) => now > last,
            _ => true,
        };
        handle.last_change = stat.modified;

        if newer {
            self.emit(WatchEvent::Change {
                path: path.to_path_buf(),
                stat,
            });
        } else {
            tracing::trace!("Modification time unchanged, suppressing change");
            self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn dir_changed(&mut self, path: &Path, stat: PathStat) {
        let options = if let Some(handle) = self.registry.get(path) {
            handle.options
        } else {
            // Only a directory appearing under a live parent counts as new.
            let Some(options) = path
                .parent()
                .and_then(|parent| self.registry.get(parent))
                .map(|parent| parent.options)
            else {
                tracing::trace!("Ignoring notification for unwatched directory");
                return;
            };
            // Its children are handled by the listing below.
            if let Err(e) = self.install(path, WatchOptions { recurse: false }) {
                self.handler_error(path, &e);
                return;
            }
            self.emit(WatchEvent::Create {
                path: path.to_path_buf(),
                stat,
            });
            options
        };

        let names = match self.inspector.list_children(path) {
            Ok(names) => names,
            Err(e) if e.is_not_found() => {
                self.remove_missing(path);
                return;
            }
            Err(e) => {
                self.handler_error(path, &e);
                return;
            }
        };

        for name in names {
            let child = path.join(name);
            if self.registry.contains_key(&child) {
                continue;
            }

            match self.install(&child, options) {
                Ok(Some(stat)) => self.emit(WatchEvent::Create { path: child, stat }),
                Ok(None) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(path = %child.display(), "Child vanished before it could be watched");
                }
                Err(e) => self.handler_error(&child, &e),
            }
        }
    }

    fn remove_missing(&mut self, path: &Path) {
        if !self.registry.contains_key(path) {
            tracing::trace!("Ignoring notification for unwatched missing path");
            return;
        }

        self.unwatch_path(path);
        self.emit(WatchEvent::Delete {
            path: path.to_path_buf(),
        });
    }

    fn unwatch_path(&mut self, path: &Path) {
        if let Some(mut handle) = self.registry.remove(path) {
            handle.release(&mut self.primitive, path);
            tracing::debug!(path = %path.display(), "Stopped watching path");
        }

        self.emit(WatchEvent::Unwatch {
            path: path.to_path_buf(),
        });
    }

    fn handler_error(&self, path: &Path, err: &Error) {
        tracing::warn!(path = %path.display(), error = %err, "Failed to handle notification");
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn emit(&mut self, event: WatchEvent) {
        tracing::debug!(event = %event.kind(), path = %event.path().display(), "Emitting event");
        self.stats.record(&event);

        for subscriber in &mut self.subscribers {
            subscriber.on_event(&event);
        }
    }
}

impl<I: PathInspector, P: WatchPrimitive> Drop for WatchTree<I, P> {
    fn drop(&mut self) {
        for (path, handle) in &mut self.registry {
            handle.release(&mut self.primitive, path);
        }
    }
}

/// Make `path` absolute against the current directory, dropping `.` parts.
/// Symlinks are left alone.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}

fn absolute_or_given(path: &Path) -> PathBuf {
    absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
