//! Directory items.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, Weak};

use super::{item_handle, Entry, Item, ItemBase};
use crate::flags::SortKey;
use crate::sync::{read, write};
use crate::tree::{Tree, TreeInner};

/// A menu section after merging: display metadata plus ordered contents
#[derive(Clone)]
pub struct Directory(pub(crate) Arc<DirectoryNode>);

item_handle!(Directory);

/// Metadata a directory is created with
#[derive(Debug, Clone, Default)]
pub(crate) struct DirectoryInfo {
    pub menu_id: String,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub icon: Option<String>,
    pub desktop_file_path: Option<PathBuf>,
    pub nodisplay: bool,
}

/// One position of a layout
#[derive(Debug, Clone)]
pub(crate) enum LayoutSlot {
    /// Explicitly placed item; never moves when the sort key changes
    Fixed(Item),
    /// A merge run of groups, kept in build order and sorted on demand by
    /// each group's first item; a group is one item or an inlined block
    Sorted(Vec<Vec<Item>>),
}

impl LayoutSlot {
    /// A run where every item sorts on its own
    pub(crate) fn sorted(items: Vec<Item>) -> Self {
        Self::Sorted(items.into_iter().map(|item| vec![item]).collect())
    }
}

#[derive(Default)]
struct Contents {
    slots: Vec<LayoutSlot>,
    /// Flattened view of `slots` under the active sort key
    items: Vec<Item>,
}

pub(crate) struct DirectoryNode {
    pub(crate) base: ItemBase,
    info: DirectoryInfo,
    contents: RwLock<Contents>,
    subdirs: RwLock<Vec<Directory>>,
    /// Set on the root directory only
    tree: RwLock<Weak<TreeInner>>,
}

impl Directory {
    pub(crate) fn new(info: DirectoryInfo) -> Self {
        Self(Arc::new(DirectoryNode {
            base: ItemBase::default(),
            info,
            contents: RwLock::new(Contents::default()),
            subdirs: RwLock::new(Vec::new()),
            tree: RwLock::new(Weak::new()),
        }))
    }

    /// Display name from the metadata record, else the menu id
    pub fn name(&self) -> &str {
        self.0.info.name.as_deref().unwrap_or(&self.0.info.menu_id)
    }

    /// The section `<Name>` this directory was built from; path components
    /// refer to directories by this id
    pub fn menu_id(&self) -> &str {
        &self.0.info.menu_id
    }

    pub fn comment(&self) -> Option<&str> {
        self.0.info.comment.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.0.info.icon.as_deref()
    }

    /// Directory metadata file the display fields came from
    pub fn desktop_file_path(&self) -> Option<&Path> {
        self.0.info.desktop_file_path.as_deref()
    }

    pub fn is_nodisplay(&self) -> bool {
        self.0.info.nodisplay
    }

    /// Ordered contents as they should be rendered
    pub fn contents(&self) -> Vec<Item> {
        read(&self.0.contents).items.clone()
    }

    /// Child directories owned by this one, including inlined children that
    /// do not appear in [`contents`](Self::contents) themselves
    pub fn subdirectories(&self) -> Vec<Directory> {
        read(&self.0.subdirs).clone()
    }

    /// Child directory with the given menu id
    pub fn subdirectory(&self, menu_id: &str) -> Option<Directory> {
        read(&self.0.subdirs)
            .iter()
            .find(|d| d.menu_id() == menu_id)
            .cloned()
    }

    /// Tree this directory currently belongs to
    pub fn tree(&self) -> Option<Tree> {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        let tree = read(&current.0.tree).upgrade();
        tree.map(Tree::from_inner)
    }

    /// Canonical path of `entry` when it lies in this directory's subtree
    pub fn make_path(&self, entry: &Entry) -> Option<String> {
        crate::path::make_path(self, entry)
    }

    /// Install the final layout, taking ownership of every placed item
    pub(crate) fn install(&self, slots: Vec<LayoutSlot>, subdirs: Vec<Directory>, key: SortKey) {
        let weak = Arc::downgrade(&self.0);
        for slot in &slots {
            match slot {
                LayoutSlot::Fixed(item) => item.set_parent(weak.clone()),
                LayoutSlot::Sorted(run) => {
                    for item in run.iter().flatten() {
                        item.set_parent(weak.clone());
                    }
                }
            }
        }
        for dir in &subdirs {
            dir.0.base.set_parent(weak.clone());
        }

        let items = flatten(&slots, key);
        *write(&self.0.contents) = Contents { slots, items };
        *write(&self.0.subdirs) = subdirs;
    }

    /// Re-sort merge runs in this directory and every descendant
    pub(crate) fn resort(&self, key: SortKey) {
        {
            let mut contents = write(&self.0.contents);
            let items = flatten(&contents.slots, key);
            contents.items = items;
        }
        for dir in self.subdirectories() {
            dir.resort(key);
        }
    }

    pub(crate) fn attach_tree(&self, tree: Weak<TreeInner>) {
        *write(&self.0.tree) = tree;
    }

    pub(crate) fn detach_tree(&self) {
        *write(&self.0.tree) = Weak::new();
    }
}

fn flatten(slots: &[LayoutSlot], key: SortKey) -> Vec<Item> {
    let mut items = Vec::new();
    for slot in slots {
        match slot {
            LayoutSlot::Fixed(item) => items.push(item.clone()),
            LayoutSlot::Sorted(run) => {
                let mut keyed: Vec<(String, &Vec<Item>)> = run
                    .iter()
                    .map(|group| {
                        let label = group.first().map(|i| i.sort_label(key)).unwrap_or_default();
                        (label, group)
                    })
                    .collect();
                // Stable: ties keep build order
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                items.extend(keyed.into_iter().flat_map(|(_, group)| group.iter().cloned()));
            }
        }
    }
    items
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("menu_id", &self.menu_id())
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Debug for DirectoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryNode")
            .field("menu_id", &self.info.menu_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Separator;

    fn dir(id: &str) -> Directory {
        Directory::new(DirectoryInfo {
            menu_id: id.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_name_falls_back_to_menu_id() {
        let d = dir("Games");
        assert_eq!(d.name(), "Games");
        assert_eq!(d.menu_id(), "Games");

        let named = Directory::new(DirectoryInfo {
            menu_id: "Utility".to_string(),
            name: Some("Accessories".to_string()),
            ..Default::default()
        });
        assert_eq!(named.name(), "Accessories");
        assert_eq!(named.menu_id(), "Utility");
    }

    #[test]
    fn test_install_sets_parents() {
        let root = dir("Root");
        let child = dir("Child");
        let sep = Separator::new();

        root.install(
            vec![
                LayoutSlot::Fixed(Item::Separator(sep.clone())),
                LayoutSlot::sorted(vec![Item::Directory(child.clone())]),
            ],
            vec![child.clone()],
            SortKey::Name,
        );

        assert!(child.parent().unwrap().ptr_eq(&root));
        assert!(sep.parent().unwrap().ptr_eq(&root));
        assert!(root.parent().is_none());
        assert_eq!(root.contents().len(), 2);
        assert!(root.subdirectory("Child").unwrap().ptr_eq(&child));
    }

    #[test]
    fn test_sorted_runs_and_fixed_slots() {
        let root = dir("Root");
        let (b, a, c) = (dir("b"), dir("a"), dir("C"));
        let sep = Separator::new();

        root.install(
            vec![
                LayoutSlot::Fixed(Item::Directory(c.clone())),
                LayoutSlot::Fixed(Item::Separator(sep)),
                LayoutSlot::sorted(vec![Item::Directory(b.clone()), Item::Directory(a.clone())]),
            ],
            vec![a.clone(), b.clone(), c.clone()],
            SortKey::Name,
        );

        let ids: Vec<String> = root
            .contents()
            .iter()
            .map(|i| match i {
                Item::Directory(d) => d.menu_id().to_string(),
                _ => "-".to_string(),
            })
            .collect();
        assert_eq!(ids, vec!["C", "-", "a", "b"]);
    }

    #[test]
    fn test_parent_gone_after_release() {
        let child = dir("Child");
        {
            let root = dir("Root");
            root.install(
                vec![LayoutSlot::Fixed(Item::Directory(child.clone()))],
                vec![child.clone()],
                SortKey::Name,
            );
            assert!(child.parent().is_some());
        }
        assert!(child.parent().is_none());
    }
}
