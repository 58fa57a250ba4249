//! Tree cache tests: identity, flags, lifetime and concurrent lookups

mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use fixtures::{Layer, Xdg};
use menutree::{SortKey, Tree, TreeFlags};

fn simple_fixture() -> Xdg {
    let xdg = Xdg::new();
    xdg.app(Layer::System, "edit.desktop", "Edit", "Utility;");
    xdg.menu(
        Layer::System,
        "applications.menu",
        "<Menu><Name>Applications</Name><DefaultAppDirs/><Include><All/></Include></Menu>",
    );
    xdg
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_same_key_same_tree() {
    let xdg = simple_fixture();
    let cache = xdg.cache();

    let a = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    let b = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    assert_eq!(a, b);
    assert!(a.root_directory().ptr_eq(&b.root_directory()));

    // Absolute path to the same file is the same key
    let absolute = a.menu_file().to_string_lossy().into_owned();
    let c = cache.lookup(&absolute, TreeFlags::empty()).unwrap();
    assert!(c.ptr_eq(&a));
}

#[test]
fn test_distinct_flags_distinct_trees() {
    let xdg = simple_fixture();
    let cache = xdg.cache();

    let plain = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    let empty = cache.lookup("applications.menu", TreeFlags::SHOW_EMPTY).unwrap();
    assert_ne!(plain, empty);
    assert_eq!(plain.menu_file(), empty.menu_file());
    assert_eq!(cache.live_trees().len(), 2);
}

#[test]
fn test_unknown_definition_is_not_found() {
    let xdg = simple_fixture();
    let cache = xdg.cache();

    assert!(cache.lookup("missing.menu", TreeFlags::empty()).is_none());
    assert!(cache.lookup("/definitely/not/here.menu", TreeFlags::empty()).is_none());
    assert!(cache.live_trees().is_empty());
}

#[test]
fn test_unparseable_definition_is_not_found() {
    let xdg = Xdg::new();
    xdg.menu(Layer::System, "broken.menu", "<Menu><Name>Broken</Menu>");
    xdg.menu(Layer::System, "nameless.menu", "<Menu><DefaultAppDirs/></Menu>");
    let cache = xdg.cache();

    assert!(cache.lookup("broken.menu", TreeFlags::empty()).is_none());
    assert!(cache.lookup("nameless.menu", TreeFlags::empty()).is_none());
}

#[test]
fn test_user_layer_definition_shadows_system() {
    let xdg = simple_fixture();
    xdg.menu(
        Layer::User,
        "applications.menu",
        "<Menu><Name>Mine</Name></Menu>",
    );
    let tree = xdg.cache().lookup("applications.menu", TreeFlags::empty()).unwrap();
    assert_eq!(tree.root_directory().menu_id(), "Mine");
}

#[test]
fn test_menu_prefix_tried_first() {
    let xdg = simple_fixture();
    xdg.menu(
        Layer::System,
        "gnome-applications.menu",
        "<Menu><Name>Gnome</Name></Menu>",
    );
    let mut config = xdg.config();
    config.menu_prefix = Some("gnome-".to_string());
    let cache = menutree::TreeCache::from_config(&config);

    let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    assert_eq!(tree.root_directory().menu_id(), "Gnome");
    let other = cache.lookup("settings.menu", TreeFlags::empty());
    assert!(other.is_none());
}

// =============================================================================
// Lifetime
// =============================================================================

#[test]
fn test_clone_then_drop_keeps_count() {
    let xdg = simple_fixture();
    let cache = xdg.cache();
    let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    assert_eq!(tree.ref_count(), 1);

    let copy = tree.clone();
    assert_eq!(tree.ref_count(), 2);
    drop(copy);
    assert_eq!(tree.ref_count(), 1);

    let root = tree.root_directory();
    let before = root.ref_count();
    let extra = root.clone();
    drop(extra);
    assert_eq!(root.ref_count(), before);
}

#[test]
fn test_last_drop_evicts_and_runs_teardown() {
    let xdg = simple_fixture();
    let cache = xdg.cache();
    let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();

    let tree_teardowns = Arc::new(AtomicUsize::new(0));
    let entry_teardowns = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tree_teardowns);
    tree.set_extension(
        Arc::new(7u32),
        Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );
    let entry = tree.get_entry_from_path("/edit.desktop").unwrap();
    let counter = Arc::clone(&entry_teardowns);
    entry.set_extension(
        Arc::new("wrapper"),
        Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );
    assert_eq!(*tree.extension().unwrap().downcast_ref::<u32>().unwrap(), 7);
    drop(entry);

    drop(tree);
    assert_eq!(tree_teardowns.load(Ordering::SeqCst), 1);
    assert_eq!(entry_teardowns.load(Ordering::SeqCst), 1);
    assert!(cache.live_trees().is_empty());

    // A fresh lookup builds a new tree with an empty slot
    let again = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    assert!(again.extension().is_none());
}

#[test]
fn test_replacing_extension_runs_previous_teardown() {
    let xdg = simple_fixture();
    let tree = xdg.cache().lookup("applications.menu", TreeFlags::empty()).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    for value in 0..3u32 {
        let counter = Arc::clone(&runs);
        tree.set_extension(
            Arc::new(value),
            Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    tree.clear_extension();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    drop(tree);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[test]
fn test_items_outliving_tree_lose_parent() {
    let xdg = simple_fixture();
    let cache = xdg.cache();
    let tree = cache.lookup("applications.menu", TreeFlags::empty()).unwrap();
    let entry = tree.get_entry_from_path("/edit.desktop").unwrap();
    assert!(entry.parent().is_some());

    drop(tree);
    assert!(entry.parent().is_none());
    assert_eq!(entry.name(), "Edit");
}

// =============================================================================
// Sort key
// =============================================================================

#[test]
fn test_sort_key_reorders_without_new_items() {
    let xdg = Xdg::new();
    xdg.app_with(Layer::System, "b.desktop", "Beta", "Utility;", "X-GNOME-FullName=Zulu Beta\n");
    xdg.app_with(Layer::System, "a.desktop", "Alpha", "Utility;", "X-GNOME-FullName=Yankee Alpha\n");
    xdg.app(Layer::System, "c.desktop", "Charlie", "Utility;");
    xdg.menu(
        Layer::System,
        "applications.menu",
        r#"<Menu>
             <Name>Applications</Name>
             <DefaultAppDirs/>
             <Include><All/></Include>
             <Layout>
               <Filename>b.desktop</Filename>
               <Separator/>
               <Merge type="files"/>
             </Layout>
           </Menu>"#,
    );

    let tree = xdg.cache().lookup("applications.menu", TreeFlags::empty()).unwrap();
    let root = tree.root_directory();
    let before = root.contents();
    assert_eq!(
        fixtures::labels(&root),
        vec!["entry:b.desktop", "sep", "entry:a.desktop", "entry:c.desktop"]
    );

    tree.set_sort_key(SortKey::DisplayName);
    assert_eq!(tree.sort_key(), SortKey::DisplayName);
    assert_eq!(
        fixtures::labels(&root),
        vec!["entry:b.desktop", "sep", "entry:c.desktop", "entry:a.desktop"]
    );
    let after = root.contents();
    assert_eq!(before.len(), after.len());
    assert!(before.iter().all(|item| after.iter().any(|other| other.ptr_eq(item))));
    assert!(tree.root_directory().ptr_eq(&root));
}

#[test]
fn test_invalid_sort_key_rejected() {
    assert!(SortKey::try_from(5).is_err());
    assert!("alphabetical".parse::<SortKey>().is_err());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_lookups_share_one_build() {
    let xdg = simple_fixture();
    let cache = xdg.cache();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.lookup("applications.menu", TreeFlags::empty())
            })
        })
        .collect();

    let trees: Vec<Tree> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert!(trees.iter().all(|t| t.ptr_eq(&trees[0])));
    assert_eq!(trees[0].ref_count(), threads);
    assert_eq!(cache.live_trees().len(), 1);
}
