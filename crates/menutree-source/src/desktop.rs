//! Launcher (`.desktop`) and directory metadata (`.directory`) records.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{SourceError, SourceResult};
use crate::keyfile::{Group, KeyFile};

/// Group holding the record fields in both file kinds
pub const DESKTOP_ENTRY_GROUP: &str = "Desktop Entry";

/// One launchable application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LauncherRecord {
    /// File the record was read from
    pub path: PathBuf,
    /// Path-derived identifier (`sub/app.desktop` → `sub-app.desktop`)
    pub desktop_file_id: String,
    pub name: String,
    pub generic_name: Option<String>,
    /// `X-GNOME-FullName`, used as the display name when present
    pub full_name: Option<String>,
    pub comment: Option<String>,
    pub icon: Option<String>,
    pub exec: Option<String>,
    pub terminal: bool,
    pub categories: Vec<String>,
    pub only_show_in: Vec<String>,
    pub not_show_in: Vec<String>,
    pub no_display: bool,
    /// Deleted by an override; callers drop hidden records
    pub hidden: bool,
}

impl LauncherRecord {
    /// Load a launcher record from disk
    pub fn load(path: &Path, desktop_file_id: impl Into<String>) -> SourceResult<Self> {
        let kf = KeyFile::load(path)?;
        Self::from_key_file(&kf, path, desktop_file_id)
    }

    /// Build a launcher record from an already parsed key file
    pub fn from_key_file(
        kf: &KeyFile,
        path: &Path,
        desktop_file_id: impl Into<String>,
    ) -> SourceResult<Self> {
        let group = entry_group(kf)?;

        let kind = group
            .get("Type")
            .ok_or_else(|| SourceError::MissingKey("Type".to_string()))?;
        if kind != "Application" {
            return Err(SourceError::UnsupportedType(kind.to_string()));
        }

        let hidden = group.get_bool("Hidden");
        // A hidden override needs no Name; it only masks lower-precedence files
        let name = match group.get_string("Name") {
            Some(name) => name,
            None if hidden => String::new(),
            None => return Err(SourceError::MissingKey("Name".to_string())),
        };

        Ok(Self {
            path: path.to_path_buf(),
            desktop_file_id: desktop_file_id.into(),
            name,
            generic_name: group.get_string("GenericName"),
            full_name: group.get_string("X-GNOME-FullName"),
            comment: group.get_string("Comment"),
            icon: group.get_string("Icon"),
            exec: group.get_string("Exec"),
            terminal: group.get_bool("Terminal"),
            categories: group.get_list("Categories"),
            only_show_in: group.get_list("OnlyShowIn"),
            not_show_in: group.get_list("NotShowIn"),
            no_display: group.get_bool("NoDisplay"),
            hidden,
        })
    }

    /// Full name if set, else the plain name
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the record lists `category` in `Categories`
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Evaluate `OnlyShowIn`/`NotShowIn` against the running desktops.
    ///
    /// With no desktops configured, records restricted by `OnlyShowIn` are
    /// not shown and `NotShowIn` is ignored.
    pub fn show_in(&self, desktops: &[String]) -> bool {
        if !self.only_show_in.is_empty() {
            return self.only_show_in.iter().any(|d| desktops.contains(d));
        }
        !self.not_show_in.iter().any(|d| desktops.contains(d))
    }
}

/// Display metadata for one menu section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRecord {
    pub path: PathBuf,
    pub name: String,
    pub comment: Option<String>,
    pub icon: Option<String>,
    pub no_display: bool,
    pub hidden: bool,
}

impl DirectoryRecord {
    /// Load a directory metadata record from disk
    pub fn load(path: &Path) -> SourceResult<Self> {
        let kf = KeyFile::load(path)?;
        Self::from_key_file(&kf, path)
    }

    /// Build a directory record from an already parsed key file
    pub fn from_key_file(kf: &KeyFile, path: &Path) -> SourceResult<Self> {
        let group = entry_group(kf)?;
        let name = group
            .get_string("Name")
            .ok_or_else(|| SourceError::MissingKey("Name".to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            comment: group.get_string("Comment"),
            icon: group.get_string("Icon"),
            no_display: group.get_bool("NoDisplay"),
            hidden: group.get_bool("Hidden"),
        })
    }
}

fn entry_group(kf: &KeyFile) -> SourceResult<&Group> {
    kf.group(DESKTOP_ENTRY_GROUP)
        .ok_or_else(|| SourceError::MissingGroup(DESKTOP_ENTRY_GROUP.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(text: &str) -> SourceResult<LauncherRecord> {
        let kf = KeyFile::parse(text)?;
        LauncherRecord::from_key_file(&kf, Path::new("/apps/test.desktop"), "test.desktop")
    }

    #[test]
    fn test_launcher_fields() {
        let record = launcher(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Terminal\n\
             GenericName=Terminal Emulator\n\
             X-GNOME-FullName=GNOME Terminal\n\
             Exec=gnome-terminal\n\
             Icon=utilities-terminal\n\
             Terminal=false\n\
             Categories=System;TerminalEmulator;\n",
        )
        .unwrap();

        assert_eq!(record.name, "Terminal");
        assert_eq!(record.display_name(), "GNOME Terminal");
        assert_eq!(record.generic_name.as_deref(), Some("Terminal Emulator"));
        assert_eq!(record.exec.as_deref(), Some("gnome-terminal"));
        assert!(record.has_category("System"));
        assert!(!record.has_category("Game"));
        assert!(!record.terminal);
        assert_eq!(record.desktop_file_id, "test.desktop");
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let record = launcher("[Desktop Entry]\nType=Application\nName=Calc\n").unwrap();
        assert_eq!(record.display_name(), "Calc");
    }

    #[test]
    fn test_launcher_requires_name() {
        let err = launcher("[Desktop Entry]\nType=Application\n").unwrap_err();
        assert!(matches!(err, SourceError::MissingKey(ref k) if k == "Name"));
    }

    #[test]
    fn test_hidden_launcher_needs_no_name() {
        let record = launcher("[Desktop Entry]\nType=Application\nHidden=true\n").unwrap();
        assert!(record.hidden);
    }

    #[test]
    fn test_launcher_rejects_links() {
        let err = launcher("[Desktop Entry]\nType=Link\nName=Site\n").unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedType(_)));
    }

    #[test]
    fn test_launcher_requires_entry_group() {
        let err = launcher("[Other]\nType=Application\nName=X\n").unwrap_err();
        assert!(matches!(err, SourceError::MissingGroup(_)));
    }

    #[test]
    fn test_show_in() {
        let mut record = launcher("[Desktop Entry]\nType=Application\nName=X\n").unwrap();
        let mate = vec!["MATE".to_string()];
        assert!(record.show_in(&mate));
        assert!(record.show_in(&[]));

        record.only_show_in = vec!["KDE".to_string()];
        assert!(!record.show_in(&mate));

        record.only_show_in.clear();
        record.not_show_in = vec!["MATE".to_string()];
        assert!(!record.show_in(&mate));
        assert!(record.show_in(&[]));
    }

    #[test]
    fn test_directory_record() {
        let kf = KeyFile::parse(
            "[Desktop Entry]\nType=Directory\nName=Accessories\nIcon=applications-accessories\nNoDisplay=true\n",
        )
        .unwrap();
        let record = DirectoryRecord::from_key_file(&kf, Path::new("/d/Utility.directory")).unwrap();
        assert_eq!(record.name, "Accessories");
        assert_eq!(record.icon.as_deref(), Some("applications-accessories"));
        assert!(record.no_display);
        assert!(record.comment.is_none());
    }
}
