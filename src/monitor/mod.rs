//! Change monitoring.
//!
//! Watchers push [`ChangeEvent`]s into a channel. A [`ChangeMonitor`] owns
//! the thread that drains that channel, coalesces each burst into one batch
//! and hands it to the tree cache, which rebuilds and notifies every
//! affected tree once.

mod registry;
mod watcher;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::cache::{CacheShared, TreeCache};

pub(crate) use registry::MonitorRegistry;
pub use registry::MonitorFn;
pub use watcher::{ManualWatcher, NotifyWatcher, WatchError, Watcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// One file-system change reported by a watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Processes change events on a dedicated thread.
///
/// Dropping the monitor stops the thread and waits for the batch in
/// progress to finish.
pub struct ChangeMonitor {
    shutdown_sender: Sender<()>,
    job_thread: Option<JoinHandle<()>>,
}

impl ChangeMonitor {
    /// Start processing `events` for `cache`.
    ///
    /// After the first event of a burst, further events are collected until
    /// `debounce` passes without a new one.
    pub fn start(cache: &TreeCache, events: Receiver<ChangeEvent>, debounce: Duration) -> Self {
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);
        let cache = cache.downgrade();

        let job_thread = thread::Builder::new()
            .name("menutree change monitor".to_owned())
            .spawn(move || {
                trace!("change monitor thread started");
                run(&cache, &events, &shutdown_receiver, debounce);
                trace!("change monitor thread stopped");
            });

        let job_thread = match job_thread {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "failed to spawn change monitor thread");
                None
            }
        };

        Self {
            shutdown_sender,
            job_thread,
        }
    }
}

fn run(
    cache: &Weak<CacheShared>,
    events: &Receiver<ChangeEvent>,
    shutdown: &Receiver<()>,
    debounce: Duration,
) {
    loop {
        let first = select! {
            recv(shutdown) -> _ => return,
            recv(events) -> event => match event {
                Ok(event) => event,
                // Every watcher is gone
                Err(_) => return,
            },
        };

        let Some(batch) = collect_batch(first, events, shutdown, debounce) else {
            return;
        };

        let Some(cache) = TreeCache::upgrade(cache) else {
            return;
        };
        debug!(paths = batch.len(), "processing change batch");
        cache.handle_changes(batch);
    }
}

/// Gather a burst of events; `None` when shutdown was requested meanwhile
fn collect_batch(
    first: ChangeEvent,
    events: &Receiver<ChangeEvent>,
    shutdown: &Receiver<()>,
    debounce: Duration,
) -> Option<BTreeSet<PathBuf>> {
    let mut batch = BTreeSet::new();
    batch.insert(first.path);

    let mut deadline = Instant::now() + debounce;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        select! {
            recv(shutdown) -> _ => return None,
            recv(events) -> event => match event {
                Ok(event) => {
                    batch.insert(event.path);
                    deadline = Instant::now() + debounce;
                }
                Err(_) => break,
            },
            default(remaining) => break,
        }
    }

    // Whatever is already queued belongs to this batch too
    batch.extend(events.try_iter().map(|e| e.path));
    Some(batch)
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown_sender.try_send(());
        if let Some(handle) = self.job_thread.take() {
            // The monitor thread may hold the last cache handle and end up
            // dropping us itself
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
