//! Layout-only items: separators, headers and aliases.

use std::fmt;
use std::sync::Arc;

use super::{item_handle, Directory, Item, ItemBase};

/// Visual separator between groups of items
#[derive(Clone)]
pub struct Separator(pub(crate) Arc<SeparatorNode>);

item_handle!(Separator);

pub(crate) struct SeparatorNode {
    pub(crate) base: ItemBase,
}

impl Separator {
    pub(crate) fn new() -> Self {
        Self(Arc::new(SeparatorNode {
            base: ItemBase::default(),
        }))
    }
}

/// Section title introducing an inlined directory
#[derive(Clone)]
pub struct Header(pub(crate) Arc<HeaderNode>);

item_handle!(Header);

pub(crate) struct HeaderNode {
    pub(crate) base: ItemBase,
    directory: Directory,
}

impl Header {
    pub(crate) fn new(directory: Directory) -> Self {
        Self(Arc::new(HeaderNode {
            base: ItemBase::default(),
            directory,
        }))
    }

    /// The directory this header introduces; its own parent is unchanged
    pub fn directory(&self) -> Directory {
        self.0.directory.clone()
    }
}

/// Stand-in for an item that lives elsewhere in the tree
#[derive(Clone)]
pub struct Alias(pub(crate) Arc<AliasNode>);

item_handle!(Alias);

pub(crate) struct AliasNode {
    pub(crate) base: ItemBase,
    item: Item,
}

impl Alias {
    pub(crate) fn new(item: Item) -> Self {
        Self(Arc::new(AliasNode {
            base: ItemBase::default(),
            item,
        }))
    }

    /// Directory the alias appears in
    pub fn directory(&self) -> Option<Directory> {
        self.parent()
    }

    /// The real item, still owned by its true parent
    pub fn item(&self) -> Item {
        self.0.item.clone()
    }
}

impl fmt::Debug for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Separator")
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Header").field(&self.0.directory).finish()
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Alias").field(&self.0.item).finish()
    }
}
