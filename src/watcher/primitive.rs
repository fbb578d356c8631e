//! Single-path change subscriptions.
//!
//! A [`WatchPrimitive`] reports "this path changed" through a
//! [`NotificationSink`]; it never says what changed. The watch tree
//! re-derives that from the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Sender;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::error::WatchError;
use crate::Result;

/// Identifier of one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A change report raised by one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Subscription that raised the report.
    pub id: SubscriptionId,
    /// Path the subscription watches.
    pub path: PathBuf,
}

/// Channel through which a primitive reports changed paths.
#[derive(Debug, Clone)]
pub struct NotificationSink(Sender<Notification>);

impl NotificationSink {
    /// Wrap a channel sender.
    #[must_use]
    pub const fn new(tx: Sender<Notification>) -> Self {
        Self(tx)
    }

    /// Report a change on `path` raised by subscription `id`.
    /// Returns false once the receiver is gone.
    pub fn notify(&self, id: SubscriptionId, path: PathBuf) -> bool {
        self.0.send(Notification { id, path }).is_ok()
    }
}

/// Low-level change notification for a single path.
pub trait WatchPrimitive {
    /// Start reporting changes on `path` into `sink`.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::WatchFailed` if the subscription cannot be made.
    fn subscribe(&mut self, path: &Path, sink: &NotificationSink) -> Result<SubscriptionId>;

    /// Stop a subscription. Releasing an unknown id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::ReleaseFailed` if the backend refuses.
    fn release(&mut self, id: SubscriptionId) -> Result<()>;
}

/// Subscriptions shared between the caller and the backend callback.
type Routes = Arc<Mutex<HashMap<PathBuf, (SubscriptionId, NotificationSink)>>>;

/// Primitive backed by the platform's recommended `notify` watcher.
///
/// One shared watcher holds a non-recursive OS watch per subscribed path.
pub struct NotifyPrimitive {
    watcher: RecommendedWatcher,
    routes: Routes,
    ids: HashMap<SubscriptionId, PathBuf>,
    next_id: u64,
}

impl NotifyPrimitive {
    /// Create the backend watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> Result<Self> {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let routes_clone = Arc::clone(&routes);

        let watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    let routes = routes_clone.lock();
                    if event.need_rescan() {
                        for (path, (id, sink)) in routes.iter() {
                            sink.notify(*id, path.clone());
                        }
                        return;
                    }
                    for raw in &event.paths {
                        for target in route(raw, &routes) {
                            if let Some((id, sink)) = routes.get(&target) {
                                sink.notify(*id, target);
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Watch error: {:?}", e);
                }
            },
        )
        .map_err(|e| WatchError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            watcher,
            routes,
            ids: HashMap::new(),
            next_id: 0,
        })
    }
}

impl WatchPrimitive for NotifyPrimitive {
    fn subscribe(&mut self, path: &Path, sink: &NotificationSink) -> Result<SubscriptionId> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.ids.insert(id, path.to_path_buf());
        self.routes
            .lock()
            .insert(path.to_path_buf(), (id, sink.clone()));

        Ok(id)
    }

    fn release(&mut self, id: SubscriptionId) -> Result<()> {
        let Some(path) = self.ids.remove(&id) else {
            return Ok(());
        };
        {
            let mut routes = self.routes.lock();
            // A later subscription on the same path owns the route now.
            if routes.get(&path).is_some_and(|(current, _)| *current == id) {
                routes.remove(&path);
            }
        }

        match self.watcher.unwatch(&path) {
            Ok(()) => Ok(()),
            // The OS drops watches on deleted paths by itself.
            Err(e) if matches!(e.kind, notify::ErrorKind::WatchNotFound) || !path.exists() => {
                tracing::debug!(path = %path.display(), "Watch already gone");
                Ok(())
            }
            Err(e) => Err(WatchError::ReleaseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

/// Map a raw event path to the subscribed paths that should hear about it.
///
/// A path is notified about itself; a directory is notified about its
/// immediate children.
fn route<T>(raw: &Path, subscribed: &HashMap<PathBuf, T>) -> Vec<PathBuf> {
    let mut targets = Vec::with_capacity(2);
    if subscribed.contains_key(raw) {
        targets.push(raw.to_path_buf());
    }
    if let Some(parent) = raw.parent() {
        if subscribed.contains_key(parent) {
            targets.push(parent.to_path_buf());
        }
    }
    targets
}

/// Primitive whose notifications are delivered by hand.
///
/// Useful when the host detects changes on its own (polling, an external
/// event source) and in tests.
#[derive(Debug, Default)]
pub struct ManualPrimitive {
    active: HashMap<SubscriptionId, (PathBuf, NotificationSink)>,
    next_id: u64,
    released: usize,
}

impl ManualPrimitive {
    /// Create an empty primitive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification for `path` if it is subscribed.
    ///
    /// Returns whether a notification was sent.
    pub fn fire(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.active
            .iter()
            .find(|(_, (p, _))| p == path)
            .is_some_and(|(id, (p, sink))| sink.notify(*id, p.clone()))
    }

    /// Whether `path` has a live subscription.
    #[must_use]
    pub fn is_subscribed(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.active.values().any(|(p, _)| p == path)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of subscriptions released so far.
    #[must_use]
    pub const fn released_count(&self) -> usize {
        self.released
    }
}

impl WatchPrimitive for ManualPrimitive {
    fn subscribe(&mut self, path: &Path, sink: &NotificationSink) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.active.insert(id, (path.to_path_buf(), sink.clone()));
        Ok(id)
    }

    fn release(&mut self, id: SubscriptionId) -> Result<()> {
        if self.active.remove(&id).is_some() {
            self.released += 1;
        }
        Ok(())
    }
}
