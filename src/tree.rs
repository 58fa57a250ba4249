//! Tree handles.
//!
//! A [`Tree`] is the stable identity of one (definition, flags) pair. Its
//! directory graph is replaced wholesale on every rebuild; the handle, its
//! observers and its extension value survive.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::{debug, warn};

use crate::cache::{CacheShared, TreeKey};
use crate::flags::{SortKey, TreeFlags};
use crate::item::{Directory, DirectoryInfo, Entry, ExtensionSlot, ExtensionValue, Teardown};
use crate::merge::TreeBuilder;
use crate::monitor::{MonitorFn, MonitorRegistry};
use crate::sync::{lock, read, write};

/// Shared handle to a built menu tree
#[derive(Clone)]
pub struct Tree(Arc<TreeInner>);

pub(crate) struct TreeInner {
    key: TreeKey,
    builder: Arc<TreeBuilder>,
    cache: Weak<CacheShared>,
    state: RwLock<TreeState>,
    /// Serializes rebuilds of this tree
    rebuild_lock: Mutex<()>,
    monitors: MonitorRegistry,
    extension: ExtensionSlot,
}

struct TreeState {
    root: Directory,
    tracked: BTreeSet<PathBuf>,
    /// Watch subscriptions held for `tracked`
    watched: Vec<PathBuf>,
    sort_key: SortKey,
}

impl Tree {
    pub(crate) fn from_inner(inner: Arc<TreeInner>) -> Self {
        Self(inner)
    }

    /// Initial build; `None` when the definition cannot be built
    pub(crate) fn build(
        key: TreeKey,
        builder: Arc<TreeBuilder>,
        cache: Weak<CacheShared>,
    ) -> Option<Self> {
        let sort_key = SortKey::default();
        let output = builder.build(&key.path, key.flags, sort_key)?;
        let watched = acquire_watches(&cache, &output.tracked);

        let inner = Arc::new(TreeInner {
            key,
            builder,
            cache,
            state: RwLock::new(TreeState {
                root: output.root.clone(),
                tracked: output.tracked,
                watched,
                sort_key,
            }),
            rebuild_lock: Mutex::new(()),
            monitors: MonitorRegistry::default(),
            extension: ExtensionSlot::default(),
        });
        output.root.attach_tree(Arc::downgrade(&inner));
        Some(Self(inner))
    }

    pub(crate) fn downgrade(&self) -> Weak<TreeInner> {
        Arc::downgrade(&self.0)
    }

    /// Root of the current graph
    pub fn root_directory(&self) -> Directory {
        read(&self.0.state).root.clone()
    }

    /// Canonical path of the definition file
    pub fn menu_file(&self) -> &Path {
        &self.0.key.path
    }

    pub fn flags(&self) -> TreeFlags {
        self.0.key.flags
    }

    pub fn key(&self) -> &TreeKey {
        &self.0.key
    }

    pub fn sort_key(&self) -> SortKey {
        read(&self.0.state).sort_key
    }

    /// Re-sort every merge run under the new key.
    ///
    /// Explicitly placed items keep their positions and no item is
    /// recreated.
    pub fn set_sort_key(&self, key: SortKey) {
        let root = {
            let mut state = write(&self.0.state);
            if state.sort_key == key {
                return;
            }
            state.sort_key = key;
            state.root.clone()
        };
        root.resort(key);
        debug!(definition = %self.0.key.path.display(), sort_key = %key, "resorted menu tree");
    }

    /// Rebuild from the current sources and swap the new graph in.
    ///
    /// When the build fails the tree is left with an empty root so that
    /// holders see the definition is gone; the definition stays tracked and
    /// a later change can bring the contents back. Returns whether the
    /// build succeeded.
    pub fn rebuild(&self) -> bool {
        let _guard = lock(&self.0.rebuild_lock);
        let sort_key = self.sort_key();
        let key = &self.0.key;

        let (root, tracked, ok) = match self.0.builder.build(&key.path, key.flags, sort_key) {
            Some(output) => (output.root, output.tracked, true),
            None => {
                warn!(definition = %key.path.display(), "rebuild failed; tree is now empty");
                (empty_root(&key.path), BTreeSet::from([key.path.clone()]), false)
            }
        };

        // Subscribe before releasing so shared directories are never dropped
        let watched = acquire_watches(&self.0.cache, &tracked);
        root.attach_tree(self.downgrade());

        let (old_root, old_watched) = {
            let mut state = write(&self.0.state);
            let old_root = std::mem::replace(&mut state.root, root);
            state.tracked = tracked;
            let old_watched = std::mem::replace(&mut state.watched, watched);
            // A sort key set during the build must still apply
            if state.sort_key != sort_key {
                state.root.resort(state.sort_key);
            }
            (old_root, old_watched)
        };
        old_root.detach_tree();
        release_watches(&self.0.cache, &old_watched);
        ok
    }

    /// Register `callback` to run with this tree after each rebuild
    pub fn add_monitor<C>(&self, callback: MonitorFn<C>, context: C)
    where
        C: PartialEq + Send + Sync + 'static,
    {
        self.0.monitors.add(callback, context);
    }

    /// Remove registrations of `callback` with an equal context; returns how
    /// many were removed
    pub fn remove_monitor<C>(&self, callback: MonitorFn<C>, context: &C) -> usize
    where
        C: PartialEq + Send + Sync + 'static,
    {
        self.0.monitors.remove(callback, context)
    }

    pub fn monitor_count(&self) -> usize {
        self.0.monitors.len()
    }

    pub(crate) fn notify_changed(&self) {
        self.0.monitors.dispatch(self);
    }

    /// Files and directories the current graph was built from
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        read(&self.0.state).tracked.iter().cloned().collect()
    }

    /// Whether a change at `path` affects this tree
    pub(crate) fn tracks(&self, path: &Path) -> bool {
        let state = read(&self.0.state);
        state.tracked.contains(path) || path.parent().is_some_and(|dir| state.tracked.contains(dir))
    }

    /// Directory at a `/`-separated path of menu ids
    pub fn get_directory_from_path(&self, path: &str) -> Option<Directory> {
        crate::path::directory_from_path(&self.root_directory(), path)
    }

    /// Entry at a path produced by [`Directory::make_path`]
    pub fn get_entry_from_path(&self, path: &str) -> Option<Entry> {
        crate::path::entry_from_path(&self.root_directory(), path)
    }

    pub fn set_extension(&self, value: ExtensionValue, teardown: Option<Teardown>) {
        self.0.extension.set(value, teardown);
    }

    pub fn extension(&self) -> Option<ExtensionValue> {
        self.0.extension.get()
    }

    pub fn clear_extension(&self) {
        self.0.extension.clear();
    }

    /// Number of live handles to this tree
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn empty_root(definition: &Path) -> Directory {
    let menu_id = definition
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let root = Directory::new(DirectoryInfo {
        menu_id,
        ..DirectoryInfo::default()
    });
    root.install(Vec::new(), Vec::new(), SortKey::default());
    root
}

fn acquire_watches(cache: &Weak<CacheShared>, tracked: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    match cache.upgrade() {
        Some(cache) => cache.watches.acquire(tracked),
        None => Vec::new(),
    }
}

fn release_watches(cache: &Weak<CacheShared>, watched: &[PathBuf]) {
    if let Some(cache) = cache.upgrade() {
        cache.watches.release(watched);
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Tree {}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("menu_file", &self.0.key.path)
            .field("flags", &self.0.key.flags)
            .finish()
    }
}

impl Drop for TreeInner {
    fn drop(&mut self) {
        let this: *const TreeInner = self;
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.root.detach_tree();

        if let Some(cache) = self.cache.upgrade() {
            cache.forget(&self.key, this);
            cache.watches.release(&state.watched);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TreeCache;
    use crate::item::Item;
    use crate::resolver::SourceResolver;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn app(temp: &TempDir, id: &str, name: &str) {
        write_file(
            &temp.path().join("data/applications").join(id),
            &format!("[Desktop Entry]\nType=Application\nName={}\nExec={}\n", name, id),
        );
    }

    fn cache(temp: &TempDir) -> TreeCache {
        fs::create_dir_all(temp.path().join("data/applications")).unwrap();
        write_file(
            &temp.path().join("config/menus/applications.menu"),
            "<Menu><Name>Applications</Name><DefaultAppDirs/><Include><All/></Include></Menu>",
        );
        let resolver = SourceResolver::new(
            vec![temp.path().join("config")],
            vec![temp.path().join("data")],
        );
        TreeCache::new(TreeBuilder::new(resolver, Vec::new()))
    }

    fn names(dir: &Directory) -> Vec<String> {
        dir.contents()
            .iter()
            .filter_map(|item| item.as_entry().map(|e| e.name().to_string()))
            .collect()
    }

    #[test]
    fn test_root_knows_its_tree() {
        let temp = TempDir::new().unwrap();
        app(&temp, "a.desktop", "Alpha");
        let cache = cache(&temp);
        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();

        assert_eq!(tree.root_directory().menu_id(), "Applications");
        assert!(tree.root_directory().tree().unwrap().ptr_eq(&tree));
    }

    #[test]
    fn test_rebuild_keeps_identity_and_refreshes() {
        let temp = TempDir::new().unwrap();
        app(&temp, "a.desktop", "Alpha");
        let cache = cache(&temp);
        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        let old_root = tree.root_directory();
        assert_eq!(names(&old_root), vec!["Alpha"]);

        app(&temp, "b.desktop", "Beta");
        assert!(tree.rebuild());

        let new_root = tree.root_directory();
        assert!(!new_root.ptr_eq(&old_root));
        assert_eq!(names(&new_root), vec!["Alpha", "Beta"]);
        assert!(old_root.tree().is_none());
        assert!(cache
            .lookup("applications.menu", TreeFlags::empty())
            .unwrap()
            .ptr_eq(&tree));
    }

    #[test]
    fn test_failed_rebuild_leaves_empty_root() {
        let temp = TempDir::new().unwrap();
        app(&temp, "a.desktop", "Alpha");
        let cache = cache(&temp);
        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();

        fs::remove_file(tree.menu_file()).unwrap();
        assert!(!tree.rebuild());
        assert!(tree.root_directory().contents().is_empty());
        assert_eq!(tree.root_directory().menu_id(), "applications");
        assert_eq!(tree.tracked_files(), vec![tree.menu_file().to_path_buf()]);
    }

    #[test]
    fn test_sort_key_resorts_in_place() {
        let temp = TempDir::new().unwrap();
        write_file(
            &temp.path().join("data/applications/z.desktop"),
            "[Desktop Entry]\nType=Application\nName=Zed\nX-GNOME-FullName=Alpha Zed\n",
        );
        app(&temp, "m.desktop", "Mid");
        let cache = cache(&temp);
        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        let root = tree.root_directory();
        let before: Vec<Item> = root.contents();
        assert_eq!(names(&root), vec!["Mid", "Zed"]);

        tree.set_sort_key(SortKey::DisplayName);
        assert_eq!(names(&root), vec!["Zed", "Mid"]);
        let after = root.contents();
        assert!(before.iter().all(|item| after.iter().any(|other| other.ptr_eq(item))));

        tree.set_sort_key(SortKey::Name);
        assert_eq!(names(&root), vec!["Mid", "Zed"]);
    }

    #[test]
    fn test_extension_teardown_runs_on_last_drop() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        tree.set_extension(
            Arc::new("wrapper"),
            Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        let extra = tree.clone();
        assert_eq!(tree.ref_count(), 2);
        drop(extra);
        assert_eq!(tree.ref_count(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        drop(tree);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tracks_files_inside_tracked_dirs() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
        let apps = temp.path().join("data/applications");

        assert!(tree.tracks(&apps.join("new.desktop")));
        assert!(tree.tracks(tree.menu_file()));
        assert!(!tree.tracks(&temp.path().join("elsewhere/x.desktop")));
    }
}
