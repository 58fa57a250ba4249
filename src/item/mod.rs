//! Menu item model.
//!
//! Items form a closed set of variants behind [`Item`]. Every variant handle
//! is a cheap shared-ownership pointer: cloning a handle takes a reference,
//! dropping it releases one. Children are owned by their directory; the link
//! back to the parent is weak, so a subtree never keeps its ancestors alive.
//!
//! Handles compare by identity, not by value.

mod directory;
mod entry;
mod marker;
mod slot;

pub use directory::Directory;
pub use entry::Entry;
pub use marker::{Alias, Header, Separator};
pub use slot::{ExtensionValue, Teardown};

pub(crate) use directory::{DirectoryInfo, DirectoryNode, LayoutSlot};
pub(crate) use slot::ExtensionSlot;

use std::sync::{RwLock, Weak};

use serde::Serialize;

use crate::flags::SortKey;
use crate::sync::{read, write};

/// Discriminant of an [`Item`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Directory = 1,
    Entry = 2,
    Separator = 3,
    Header = 4,
    Alias = 5,
}

/// Any node of a menu tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Directory(Directory),
    Entry(Entry),
    Separator(Separator),
    Header(Header),
    Alias(Alias),
}

/// State shared by every item variant
#[derive(Debug, Default)]
pub(crate) struct ItemBase {
    parent: RwLock<Weak<DirectoryNode>>,
    pub(crate) extension: ExtensionSlot,
}

impl ItemBase {
    pub(crate) fn parent(&self) -> Option<Directory> {
        read(&self.parent).upgrade().map(Directory)
    }

    pub(crate) fn set_parent(&self, parent: Weak<DirectoryNode>) {
        *write(&self.parent) = parent;
    }
}

/// Shared handle plumbing: type tag, parent, identity and the extension slot
macro_rules! item_handle {
    ($handle:ident) => {
        impl $handle {
            /// Variant tag of this handle
            pub fn item_type(&self) -> $crate::item::ItemType {
                $crate::item::ItemType::$handle
            }

            /// Directory this item belongs to; `None` for a tree root or
            /// once the owning graph has been released
            pub fn parent(&self) -> Option<$crate::item::Directory> {
                self.0.base.parent()
            }

            /// Number of live handles (internal owners included)
            pub fn ref_count(&self) -> usize {
                std::sync::Arc::strong_count(&self.0)
            }

            /// Identity comparison
            pub fn ptr_eq(&self, other: &Self) -> bool {
                std::sync::Arc::ptr_eq(&self.0, &other.0)
            }

            /// Store a value in the extension slot, tearing down any previous one
            pub fn set_extension(
                &self,
                value: $crate::item::ExtensionValue,
                teardown: Option<$crate::item::Teardown>,
            ) {
                self.0.base.extension.set(value, teardown);
            }

            /// Current extension value
            pub fn extension(&self) -> Option<$crate::item::ExtensionValue> {
                self.0.base.extension.get()
            }

            /// Remove the extension value, running its teardown hook
            pub fn clear_extension(&self) {
                self.0.base.extension.clear();
            }

            /// Wrap this handle as a generic [`Item`]
            pub fn to_item(&self) -> $crate::item::Item {
                $crate::item::Item::$handle(self.clone())
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                self.ptr_eq(other)
            }
        }

        impl Eq for $handle {}

        impl From<$handle> for $crate::item::Item {
            fn from(handle: $handle) -> Self {
                $crate::item::Item::$handle(handle)
            }
        }
    };
}

pub(crate) use item_handle;

macro_rules! dispatch {
    ($item:expr, $h:ident => $body:expr) => {
        match $item {
            Item::Directory($h) => $body,
            Item::Entry($h) => $body,
            Item::Separator($h) => $body,
            Item::Header($h) => $body,
            Item::Alias($h) => $body,
        }
    };
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        dispatch!(self, h => h.item_type())
    }

    pub fn parent(&self) -> Option<Directory> {
        dispatch!(self, h => h.parent())
    }

    pub fn ref_count(&self) -> usize {
        dispatch!(self, h => h.ref_count())
    }

    /// Identity comparison across variants
    pub fn ptr_eq(&self, other: &Item) -> bool {
        match (self, other) {
            (Item::Directory(a), Item::Directory(b)) => a.ptr_eq(b),
            (Item::Entry(a), Item::Entry(b)) => a.ptr_eq(b),
            (Item::Separator(a), Item::Separator(b)) => a.ptr_eq(b),
            (Item::Header(a), Item::Header(b)) => a.ptr_eq(b),
            (Item::Alias(a), Item::Alias(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn set_extension(&self, value: ExtensionValue, teardown: Option<Teardown>) {
        dispatch!(self, h => h.set_extension(value, teardown))
    }

    pub fn extension(&self) -> Option<ExtensionValue> {
        dispatch!(self, h => h.extension())
    }

    pub fn clear_extension(&self) {
        dispatch!(self, h => h.clear_extension())
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Item::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Item::Entry(e) => Some(e),
            _ => None,
        }
    }

    /// Label used when sorting: directories by name, entries by the
    /// comparator, aliases and headers by what they point at
    pub(crate) fn sort_label(&self, key: SortKey) -> String {
        match self {
            Item::Directory(d) => d.name().to_lowercase(),
            Item::Entry(e) => match key {
                SortKey::Name => e.name().to_lowercase(),
                SortKey::DisplayName => e.display_name().to_lowercase(),
            },
            Item::Alias(a) => a.item().sort_label(key),
            Item::Header(h) => h.directory().name().to_lowercase(),
            Item::Separator(_) => String::new(),
        }
    }

    pub(crate) fn set_parent(&self, parent: Weak<DirectoryNode>) {
        match self {
            Item::Directory(h) => h.0.base.set_parent(parent),
            Item::Entry(h) => h.0.base.set_parent(parent),
            Item::Separator(h) => h.0.base.set_parent(parent),
            Item::Header(h) => h.0.base.set_parent(parent),
            Item::Alias(h) => h.0.base.set_parent(parent),
        }
    }
}
