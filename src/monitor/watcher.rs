//! File watchers feeding the change monitor.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crossbeam_channel::Sender;
use notify::event::EventKind;
use notify::{RecommendedWatcher, RecursiveMode};
use thiserror::Error;
use tracing::{debug, warn};

use super::{ChangeEvent, ChangeKind};
use crate::sync::lock;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to start file watcher: {0}")]
    Start(#[from] notify::Error),
}

/// Subscribes paths for change events.
///
/// Directories are watched non-recursively; events name the changed path.
pub trait Watcher: Send + Sync {
    fn watch(&self, path: &Path) -> Result<(), WatchError>;
    fn unwatch(&self, path: &Path) -> Result<(), WatchError>;
}

/// Watcher backed by the platform's native notification API
pub struct NotifyWatcher {
    inner: Mutex<RecommendedWatcher>,
}

impl NotifyWatcher {
    /// Forward translated events to `sender`
    pub fn new(sender: Sender<ChangeEvent>) -> Result<Self, WatchError> {
        let handler = move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                let Some(kind) = translate(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    // The receiver only goes away when the monitor shuts down
                    let _ = sender.send(ChangeEvent { path, kind });
                }
            }
            Err(err) => warn!(error = %err, "file watcher error"),
        };
        let watcher = notify::recommended_watcher(handler)?;
        Ok(Self {
            inner: Mutex::new(watcher),
        })
    }
}

impl Watcher for NotifyWatcher {
    fn watch(&self, path: &Path) -> Result<(), WatchError> {
        notify::Watcher::watch(&mut *lock(&self.inner), path, RecursiveMode::NonRecursive).map_err(
            |source| WatchError::Notify {
                path: path.to_path_buf(),
                source,
            },
        )
    }

    fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        notify::Watcher::unwatch(&mut *lock(&self.inner), path).map_err(|source| {
            WatchError::Notify {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

fn translate(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Modified),
        EventKind::Access(_) => None,
    }
}

/// Watcher driven by hand, for embedding and tests.
///
/// Records which paths are watched and forwards [`emit`](Self::emit)ted
/// events to the monitor channel.
pub struct ManualWatcher {
    sender: Sender<ChangeEvent>,
    watched: Mutex<BTreeMap<PathBuf, usize>>,
}

impl ManualWatcher {
    pub fn new(sender: Sender<ChangeEvent>) -> Self {
        Self {
            sender,
            watched: Mutex::new(BTreeMap::new()),
        }
    }

    /// Currently watched paths
    pub fn watched(&self) -> Vec<PathBuf> {
        lock(&self.watched).keys().cloned().collect()
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        lock(&self.watched).contains_key(path)
    }

    /// Deliver an event as if the file system had reported it
    pub fn emit(&self, path: impl Into<PathBuf>, kind: ChangeKind) {
        let event = ChangeEvent {
            path: path.into(),
            kind,
        };
        if self.sender.send(event).is_err() {
            debug!("change monitor is gone; dropping event");
        }
    }
}

impl Watcher for ManualWatcher {
    fn watch(&self, path: &Path) -> Result<(), WatchError> {
        *lock(&self.watched).entry(path.to_path_buf()).or_insert(0) += 1;
        Ok(())
    }

    fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        let mut watched = lock(&self.watched);
        if let Some(count) = watched.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                watched.remove(path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_translate() {
        assert_eq!(
            translate(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            translate(&EventKind::Remove(RemoveKind::Any)),
            Some(ChangeKind::Removed)
        );
        assert_eq!(
            translate(&EventKind::Modify(ModifyKind::Any)),
            Some(ChangeKind::Modified)
        );
        assert_eq!(translate(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn test_manual_watcher_counts_and_emits() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let watcher = ManualWatcher::new(tx);
        let path = Path::new("/etc/xdg/menus");

        watcher.watch(path).unwrap();
        watcher.watch(path).unwrap();
        watcher.unwatch(path).unwrap();
        assert!(watcher.is_watched(path));
        watcher.unwatch(path).unwrap();
        assert!(watcher.watched().is_empty());

        watcher.emit("/etc/xdg/menus/applications.menu", ChangeKind::Modified);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Modified);
        assert!(event.path.ends_with("applications.menu"));
    }
}
