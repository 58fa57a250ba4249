//! Launcher entries.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use menutree_source::LauncherRecord;

use super::{item_handle, ItemBase};

/// One launchable application placed in a directory
#[derive(Clone)]
pub struct Entry(pub(crate) Arc<EntryNode>);

item_handle!(Entry);

pub(crate) struct EntryNode {
    pub(crate) base: ItemBase,
    /// Shared by every entry built from the same desktop-file id
    record: Arc<LauncherRecord>,
    excluded: bool,
    nodisplay: bool,
}

impl Entry {
    pub(crate) fn new(record: Arc<LauncherRecord>, excluded: bool) -> Self {
        let nodisplay = record.no_display;
        Self(Arc::new(EntryNode {
            base: ItemBase::default(),
            record,
            excluded,
            nodisplay,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.record.name
    }

    pub fn generic_name(&self) -> Option<&str> {
        self.0.record.generic_name.as_deref()
    }

    /// Full name when the launcher provides one, else [`name`](Self::name)
    pub fn display_name(&self) -> &str {
        self.0.record.display_name()
    }

    pub fn comment(&self) -> Option<&str> {
        self.0.record.comment.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.0.record.icon.as_deref()
    }

    /// Command line from `Exec`
    pub fn exec(&self) -> Option<&str> {
        self.0.record.exec.as_deref()
    }

    pub fn launch_in_terminal(&self) -> bool {
        self.0.record.terminal
    }

    pub fn categories(&self) -> &[String] {
        &self.0.record.categories
    }

    /// Launcher file this entry was read from
    pub fn desktop_file_path(&self) -> &Path {
        &self.0.record.path
    }

    /// Stable identifier derived from the launcher's path below its AppDir
    pub fn desktop_file_id(&self) -> &str {
        &self.0.record.desktop_file_id
    }

    /// Whether the entry is only present because of `INCLUDE_EXCLUDED`
    pub fn is_excluded(&self) -> bool {
        self.0.excluded
    }

    pub fn is_nodisplay(&self) -> bool {
        self.0.nodisplay
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("desktop_file_id", &self.desktop_file_id())
            .field("name", &self.name())
            .field("excluded", &self.is_excluded())
            .finish()
    }
}
