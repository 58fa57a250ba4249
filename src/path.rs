//! Paths into a tree.
//!
//! A path is a `/`-separated list of directory menu ids starting at the
//! root. Entry paths end with the desktop-file id of the entry.

use crate::item::{Directory, Entry, Item};

/// Directory at `path` below `root`.
///
/// Empty components are ignored, so `/`, `` and `//` all name the root and
/// `/Games//Arcade/` equals `Games/Arcade`.
pub fn directory_from_path(root: &Directory, path: &str) -> Option<Directory> {
    components(path).try_fold(root.clone(), |dir, id| dir.subdirectory(id))
}

/// Entry at `path` below `root`; the last component is a desktop-file id
pub fn entry_from_path(root: &Directory, path: &str) -> Option<Entry> {
    let mut parts: Vec<&str> = components(path).collect();
    let entry_id = parts.pop()?;
    let dir = parts
        .into_iter()
        .try_fold(root.clone(), |dir, id| dir.subdirectory(id))?;

    dir.contents().into_iter().find_map(|item| match item {
        Item::Entry(entry) if entry.desktop_file_id() == entry_id => Some(entry),
        _ => None,
    })
}

/// Path of `entry` from the root of its tree, provided `dir` is one of its
/// ancestors.
///
/// Only the entry's true parent chain counts: an entry reachable through an
/// alias is not inside the alias's directory.
pub fn make_path(dir: &Directory, entry: &Entry) -> Option<String> {
    let mut ids = Vec::new();
    let mut inside = false;
    let mut current = entry.parent();
    while let Some(ancestor) = current {
        inside |= ancestor.ptr_eq(dir);
        current = ancestor.parent();
        // The root contributes no component
        if current.is_some() {
            ids.push(ancestor.menu_id().to_string());
        }
    }
    if !inside {
        return None;
    }

    ids.reverse();
    let mut path = String::from("/");
    for id in ids {
        path.push_str(&id);
        path.push('/');
    }
    path.push_str(entry.desktop_file_id());
    Some(path)
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}
