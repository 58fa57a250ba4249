//! The tree cache.
//!
//! Trees are keyed by canonical definition path and build flags. The cache
//! only holds weak references: a tree lives as long as some caller holds a
//! handle, and dropping the last handle evicts it.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, OnceLock, Weak};

use crossbeam_channel::unbounded;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{EffectiveConfig, EngineConfig};
use crate::error::MenuError;
use crate::flags::TreeFlags;
use crate::merge::TreeBuilder;
use crate::monitor::{ChangeMonitor, NotifyWatcher, Watcher};
use crate::sync::{lock, wait};
use crate::tree::{Tree, TreeInner};

/// Identity of a cached tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TreeKey {
    /// Canonical path of the definition file
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_flags")]
    pub flags: TreeFlags,
}

fn serialize_flags<S: serde::Serializer>(flags: &TreeFlags, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(flags.bits())
}

enum Slot {
    /// A build for this key is in flight
    Building,
    Ready(Weak<TreeInner>),
}

/// Shared handle to a set of cached trees
#[derive(Clone)]
pub struct TreeCache {
    shared: Arc<CacheShared>,
}

pub(crate) struct CacheShared {
    builder: Arc<TreeBuilder>,
    slots: Mutex<HashMap<TreeKey, Slot>>,
    /// Signalled whenever a build finishes, successfully or not
    built: Condvar,
    pub(crate) watches: WatchSet,
    /// Monitor started by [`TreeCache::watching`]
    monitor: Mutex<Option<ChangeMonitor>>,
}

impl TreeCache {
    /// A cache whose trees are never rebuilt automatically
    pub fn new(builder: TreeBuilder) -> Self {
        Self::with_parts(builder, None)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(TreeBuilder::from_config(config))
    }

    /// A cache that subscribes every tracked path with `watcher`.
    ///
    /// Events from the watcher only take effect once a [`ChangeMonitor`] is
    /// started for this cache.
    pub fn with_watcher(builder: TreeBuilder, watcher: Arc<dyn Watcher>) -> Self {
        Self::with_parts(builder, Some(watcher))
    }

    /// A cache wired to the native file watcher with its own monitor thread
    pub fn watching(config: &EngineConfig) -> Result<Self, MenuError> {
        let (sender, receiver) = unbounded();
        let watcher = NotifyWatcher::new(sender)?;
        let cache = Self::with_watcher(TreeBuilder::from_config(config), Arc::new(watcher));
        let monitor = ChangeMonitor::start(&cache, receiver, config.monitor.debounce());
        *lock(&cache.shared.monitor) = Some(monitor);
        Ok(cache)
    }

    fn with_parts(builder: TreeBuilder, watcher: Option<Arc<dyn Watcher>>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                builder: Arc::new(builder),
                slots: Mutex::new(HashMap::new()),
                built: Condvar::new(),
                watches: WatchSet::new(watcher),
                monitor: Mutex::new(None),
            }),
        }
    }

    pub fn builder(&self) -> &TreeBuilder {
        &self.shared.builder
    }

    /// Tree for a definition name or absolute path.
    ///
    /// Returns the live tree when one exists; otherwise builds it once,
    /// even when several threads ask at the same time. `None` when the
    /// definition does not exist or cannot be parsed.
    pub fn lookup(&self, name: &str, flags: TreeFlags) -> Option<Tree> {
        let path = self.shared.builder.resolver().resolve_definition(name)?;
        let key = TreeKey { path, flags };

        let mut slots = lock(&self.shared.slots);
        loop {
            match slots.get(&key) {
                Some(Slot::Ready(weak)) => match weak.upgrade() {
                    Some(inner) => return Some(Tree::from_inner(inner)),
                    None => break,
                },
                Some(Slot::Building) => slots = wait(&self.shared.built, slots),
                None => break,
            }
        }
        slots.insert(key.clone(), Slot::Building);
        drop(slots);

        let guard = BuildGuard {
            shared: &self.shared,
            key: &key,
        };
        let tree = Tree::build(
            key.clone(),
            Arc::clone(&self.shared.builder),
            Arc::downgrade(&self.shared),
        );
        guard.finish(tree.as_ref());

        match &tree {
            Some(_) => info!(definition = %key.path.display(), flags = flags.bits(), "cached menu tree"),
            None => debug!(definition = %key.path.display(), "menu tree build failed"),
        }
        tree
    }

    /// Like [`lookup`](Self::lookup) with raw flag bits; undefined bits are
    /// dropped before keying
    pub fn lookup_bits(&self, name: &str, bits: u32) -> Option<Tree> {
        self.lookup(name, TreeFlags::from_raw(bits))
    }

    /// Rebuild and notify every live tree affected by `paths`.
    ///
    /// A path affects a tree when the tree tracks it or the directory
    /// containing it. Returns the number of trees rebuilt.
    pub fn handle_changes<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let changed: BTreeSet<PathBuf> = paths.into_iter().collect();
        if changed.is_empty() {
            return 0;
        }

        let mut rebuilt = 0;
        for tree in self.live_trees() {
            if changed.iter().any(|path| tree.tracks(path)) {
                tree.rebuild();
                tree.notify_changed();
                rebuilt += 1;
            }
        }
        debug!(changed = changed.len(), rebuilt, "handled change batch");
        rebuilt
    }

    /// Handles to every tree currently alive
    pub fn live_trees(&self) -> Vec<Tree> {
        lock(&self.shared.slots)
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(weak) => weak.upgrade().map(Tree::from_inner),
                Slot::Building => None,
            })
            .collect()
    }

    pub(crate) fn downgrade(&self) -> Weak<CacheShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(weak: &Weak<CacheShared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }
}

impl CacheShared {
    /// Evict `key` when it still refers to the tree at `tree`
    pub(crate) fn forget(&self, key: &TreeKey, tree: *const TreeInner) {
        let mut slots = lock(&self.slots);
        if let Some(Slot::Ready(weak)) = slots.get(key) {
            if weak.as_ptr() == tree {
                slots.remove(key);
                debug!(definition = %key.path.display(), "evicted menu tree");
            }
        }
    }
}

/// Marks a build finished even if building panics
struct BuildGuard<'a> {
    shared: &'a CacheShared,
    key: &'a TreeKey,
}

impl BuildGuard<'_> {
    fn finish(self, tree: Option<&Tree>) {
        if let Some(tree) = tree {
            lock(&self.shared.slots).insert(self.key.clone(), Slot::Ready(tree.downgrade()));
        }
        // Drop removes a leftover building marker and wakes waiters
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut slots = lock(&self.shared.slots);
        if matches!(slots.get(self.key), Some(Slot::Building)) {
            slots.remove(self.key);
        }
        drop(slots);
        self.shared.built.notify_all();
    }
}

/// Reference-counted watch subscriptions shared by all trees of a cache
pub(crate) struct WatchSet {
    watcher: Option<Arc<dyn Watcher>>,
    counts: Mutex<HashMap<PathBuf, usize>>,
}

impl WatchSet {
    fn new(watcher: Option<Arc<dyn Watcher>>) -> Self {
        Self {
            watcher,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe the directories covering `tracked`; returns what was
    /// subscribed so it can be released later
    pub(crate) fn acquire(&self, tracked: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let Some(watcher) = &self.watcher else {
            return Vec::new();
        };

        let targets: BTreeSet<PathBuf> = tracked.iter().filter_map(|p| watch_target(p)).collect();
        let mut counts = lock(&self.counts);
        for target in &targets {
            let count = counts.entry(target.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                if let Err(err) = watcher.watch(target) {
                    warn!(path = %target.display(), error = %err, "cannot watch path");
                }
            }
        }
        targets.into_iter().collect()
    }

    pub(crate) fn release(&self, targets: &[PathBuf]) {
        let Some(watcher) = &self.watcher else {
            return;
        };

        let mut counts = lock(&self.counts);
        for target in targets {
            let Some(count) = counts.get_mut(target) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                counts.remove(target);
                if let Err(err) = watcher.unwatch(target) {
                    debug!(path = %target.display(), error = %err, "cannot unwatch path");
                }
            }
        }
    }
}

/// Directories are watched directly, files through their directory so that
/// replacing or creating the file is seen
fn watch_target(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        return Some(path.to_path_buf());
    }
    path.parent().filter(|p| p.is_dir()).map(Path::to_path_buf)
}

static GLOBAL: OnceLock<TreeCache> = OnceLock::new();

/// The process-wide cache, configured from the environment on first use
pub fn global() -> &'static TreeCache {
    GLOBAL.get_or_init(|| {
        let config = match EffectiveConfig::from_env() {
            Ok(effective) => effective.config,
            Err(err) => {
                warn!(error = %err, "invalid configuration; using defaults");
                EngineConfig::default()
            }
        };
        TreeCache::watching(&config).unwrap_or_else(|err| {
            warn!(error = %err, "file watching unavailable; trees will not reload");
            TreeCache::from_config(&config)
        })
    })
}

/// Look up a tree in the process-wide cache
pub fn lookup(name: &str, flags: TreeFlags) -> Option<Tree> {
    global().lookup(name, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ManualWatcher;
    use crate::resolver::SourceResolver;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TreeBuilder) {
        let temp = TempDir::new().unwrap();
        let menus = temp.path().join("config/menus");
        fs::create_dir_all(&menus).unwrap();
        fs::create_dir_all(temp.path().join("data/applications")).unwrap();
        fs::write(
            menus.join("applications.menu"),
            "<Menu><Name>Applications</Name><DefaultAppDirs/></Menu>",
        )
        .unwrap();
        let resolver = SourceResolver::new(
            vec![temp.path().join("config")],
            vec![temp.path().join("data")],
        );
        (temp, TreeBuilder::new(resolver, Vec::new()))
    }

    #[test]
    fn test_lookup_shares_and_evicts() {
        let (_temp, builder) = setup();
        let cache = TreeCache::new(builder);

        let a = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        let b = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(cache.live_trees().len(), 1);

        drop(a);
        drop(b);
        assert!(cache.live_trees().is_empty());
        assert!(lock(&cache.shared.slots).is_empty());
    }

    #[test]
    fn test_missing_definition_not_cached() {
        let (_temp, builder) = setup();
        let cache = TreeCache::new(builder);
        assert!(cache.lookup("nope.menu", TreeFlags::empty()).is_none());
        assert!(lock(&cache.shared.slots).is_empty());
    }

    #[test]
    fn test_lookup_bits_masks_unknown() {
        let (_temp, builder) = setup();
        let cache = TreeCache::new(builder);
        let masked = cache.lookup_bits("applications.menu", 0xf2).unwrap();
        let plain = cache.lookup("applications.menu", TreeFlags::SHOW_EMPTY).unwrap();
        assert!(masked.ptr_eq(&plain));
        assert_eq!(masked.flags(), TreeFlags::SHOW_EMPTY);
    }

    #[test]
    fn test_watches_follow_tree_lifetime() {
        let (temp, builder) = setup();
        let (tx, _rx) = unbounded();
        let watcher = Arc::new(ManualWatcher::new(tx));
        let cache = TreeCache::with_watcher(builder, watcher.clone());

        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        let menus = fs::canonicalize(temp.path().join("config/menus")).unwrap();
        assert!(watcher.is_watched(&menus));
        assert!(watcher.is_watched(&temp.path().join("data/applications")));

        drop(tree);
        assert!(watcher.watched().is_empty());
    }

    #[test]
    fn test_watch_target() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.menu");
        assert_eq!(watch_target(&file), Some(temp.path().to_path_buf()));
        assert_eq!(watch_target(temp.path()), Some(temp.path().to_path_buf()));
        assert_eq!(watch_target(&temp.path().join("x/y.menu")), None);
    }
}
