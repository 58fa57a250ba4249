//! Source resolution across layered search roots.
//!
//! Config roots hold menu definitions (`<root>/menus/*.menu`), data roots
//! hold launchers (`<root>/applications`) and directory metadata
//! (`<root>/desktop-directories`). Both lists are ordered lowest precedence
//! first, so later roots override earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::EngineConfig;

/// Subdirectory of a config root holding menu definitions
pub const MENUS_DIR: &str = "menus";

/// Subdirectory of a data root holding launchers
pub const APPLICATIONS_DIR: &str = "applications";

/// Subdirectory of a data root holding directory metadata
pub const DIRECTORIES_DIR: &str = "desktop-directories";

/// Locates definition files and expands default search paths
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    config_roots: Vec<PathBuf>,
    data_roots: Vec<PathBuf>,
    menu_prefix: Option<String>,
}

impl SourceResolver {
    /// Create a resolver from roots ordered lowest precedence first
    pub fn new(config_roots: Vec<PathBuf>, data_roots: Vec<PathBuf>) -> Self {
        Self {
            config_roots,
            data_roots,
            menu_prefix: None,
        }
    }

    /// Prefix tried first for bare definition names (`XDG_MENU_PREFIX`)
    pub fn with_menu_prefix(mut self, prefix: Option<String>) -> Self {
        self.menu_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Build a resolver from engine configuration.
    ///
    /// Configuration lists XDG directories most important first; the user
    /// home directory outranks all of them.
    pub fn from_config(config: &EngineConfig) -> Self {
        let config_roots = config
            .config_dirs
            .iter()
            .rev()
            .chain(std::iter::once(&config.config_home))
            .cloned()
            .collect();
        let data_roots = config
            .data_dirs
            .iter()
            .rev()
            .chain(std::iter::once(&config.data_home))
            .cloned()
            .collect();
        Self::new(config_roots, data_roots).with_menu_prefix(config.menu_prefix.clone())
    }

    pub fn config_roots(&self) -> &[PathBuf] {
        &self.config_roots
    }

    pub fn data_roots(&self) -> &[PathBuf] {
        &self.data_roots
    }

    /// Resolve a definition name or path to its canonical file.
    ///
    /// Absolute paths are taken as-is. Bare names are looked up under
    /// `<root>/menus/` from the highest-precedence root down, trying the
    /// prefixed name first. Returns `None` when nothing exists.
    pub fn resolve_definition(&self, name: &str) -> Option<PathBuf> {
        let requested = Path::new(name);
        if requested.is_absolute() {
            return requested.is_file().then(|| canonical(requested));
        }

        let mut candidates = Vec::new();
        if let Some(prefix) = &self.menu_prefix {
            candidates.push(format!("{}{}", prefix, name));
        }
        candidates.push(name.to_string());

        for candidate in &candidates {
            for root in self.config_roots.iter().rev() {
                let path = root.join(MENUS_DIR).join(candidate);
                if path.is_file() {
                    debug!(definition = %path.display(), "resolved menu definition");
                    return Some(canonical(&path));
                }
            }
        }

        debug!(name, "no menu definition found");
        None
    }

    /// `<data root>/applications` for every data root, lowest precedence first
    pub fn default_app_dirs(&self) -> Vec<PathBuf> {
        self.data_roots.iter().map(|r| r.join(APPLICATIONS_DIR)).collect()
    }

    /// `<data root>/desktop-directories` for every data root
    pub fn default_directory_dirs(&self) -> Vec<PathBuf> {
        self.data_roots.iter().map(|r| r.join(DIRECTORIES_DIR)).collect()
    }

    /// `<config root>/menus/<basename>-merged` for every config root.
    ///
    /// The basename is the definition file name without `.menu` and without
    /// the menu prefix, so `gnome-applications.menu` merges from
    /// `applications-merged`.
    pub fn default_merge_dirs(&self, definition: &Path) -> Vec<PathBuf> {
        let file_name = definition
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut stem = file_name.strip_suffix(".menu").unwrap_or(&file_name);
        if let Some(prefix) = &self.menu_prefix {
            stem = stem.strip_prefix(prefix.as_str()).unwrap_or(stem);
        }
        let merged = format!("{}-merged", stem);

        self.config_roots
            .iter()
            .map(|r| r.join(MENUS_DIR).join(&merged))
            .collect()
    }

    /// The next lower-precedence file with the same path relative to its
    /// config root as `current` (`<MergeFile type="parent">`)
    pub fn parent_definition(&self, current: &Path) -> Option<PathBuf> {
        let current = canonical(current);
        let roots: Vec<PathBuf> = self
            .config_roots
            .iter()
            .map(|r| canonical(&r.join(MENUS_DIR)))
            .collect();

        // Highest-precedence root containing the current file
        let (index, relative) = roots.iter().enumerate().rev().find_map(|(i, root)| {
            current
                .strip_prefix(root)
                .ok()
                .map(|rel| (i, rel.to_path_buf()))
        })?;

        roots[..index]
            .iter()
            .rev()
            .map(|root| root.join(&relative))
            .find(|path| path.is_file())
    }
}

/// Resolve `value` relative to the directory of `base_file`
pub fn resolve_relative(base_file: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base_file.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

pub(crate) fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn layout() -> (TempDir, SourceResolver) {
        let temp = TempDir::new().unwrap();
        let system = temp.path().join("etc/xdg");
        let user = temp.path().join("home/.config");
        let data = temp.path().join("usr/share");
        let data_home = temp.path().join("home/.local/share");
        let resolver = SourceResolver::new(vec![system, user], vec![data, data_home]);
        (temp, resolver)
    }

    #[test]
    fn test_user_definition_wins() {
        let (temp, resolver) = layout();
        write(&temp.path().join("etc/xdg/menus/applications.menu"), "<Menu/>");
        write(&temp.path().join("home/.config/menus/applications.menu"), "<Menu/>");

        let resolved = resolver.resolve_definition("applications.menu").unwrap();
        assert!(resolved.ends_with("home/.config/menus/applications.menu"));
    }

    #[test]
    fn test_system_definition_used_when_no_override() {
        let (temp, resolver) = layout();
        write(&temp.path().join("etc/xdg/menus/applications.menu"), "<Menu/>");

        let resolved = resolver.resolve_definition("applications.menu").unwrap();
        assert!(resolved.ends_with("etc/xdg/menus/applications.menu"));
    }

    #[test]
    fn test_missing_definition_is_none() {
        let (_temp, resolver) = layout();
        assert!(resolver.resolve_definition("applications.menu").is_none());
        assert!(resolver.resolve_definition("/does/not/exist.menu").is_none());
    }

    #[test]
    fn test_menu_prefix_tried_first() {
        let (temp, resolver) = layout();
        let resolver = resolver.with_menu_prefix(Some("mate-".to_string()));
        write(&temp.path().join("etc/xdg/menus/applications.menu"), "<Menu/>");
        write(&temp.path().join("etc/xdg/menus/mate-applications.menu"), "<Menu/>");

        let resolved = resolver.resolve_definition("applications.menu").unwrap();
        assert!(resolved.ends_with("mate-applications.menu"));

        let merge_dirs = resolver.default_merge_dirs(&resolved);
        assert!(merge_dirs[0].ends_with("menus/applications-merged"));
    }

    #[test]
    fn test_absolute_definition() {
        let (temp, resolver) = layout();
        let path = temp.path().join("custom/test.menu");
        write(&path, "<Menu/>");

        let resolved = resolver.resolve_definition(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved, canonical(&path));
    }

    #[test]
    fn test_default_dirs_keep_precedence_order() {
        let (temp, resolver) = layout();
        let apps = resolver.default_app_dirs();
        assert_eq!(apps[0], temp.path().join("usr/share/applications"));
        assert_eq!(apps[1], temp.path().join("home/.local/share/applications"));

        let dirs = resolver.default_directory_dirs();
        assert!(dirs[1].ends_with("home/.local/share/desktop-directories"));
    }

    #[test]
    fn test_parent_definition() {
        let (temp, resolver) = layout();
        let system = temp.path().join("etc/xdg/menus/applications.menu");
        let user = temp.path().join("home/.config/menus/applications.menu");
        write(&system, "<Menu/>");
        write(&user, "<Menu/>");

        let parent = resolver.parent_definition(&user).unwrap();
        assert_eq!(parent, canonical(&system));
        assert!(resolver.parent_definition(&system).is_none());
    }

    #[test]
    fn test_resolve_relative() {
        let base = Path::new("/etc/xdg/menus/applications.menu");
        assert_eq!(
            resolve_relative(base, "applications-merged"),
            PathBuf::from("/etc/xdg/menus/applications-merged")
        );
        assert_eq!(resolve_relative(base, "/opt/apps"), PathBuf::from("/opt/apps"));
    }

    #[test]
    fn test_from_config_orders_home_last() {
        let config = EngineConfig {
            config_dirs: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            config_home: PathBuf::from("/home/u/.config"),
            data_dirs: vec![PathBuf::from("/usr/local/share"), PathBuf::from("/usr/share")],
            data_home: PathBuf::from("/home/u/.local/share"),
            ..EngineConfig::default()
        };
        let resolver = SourceResolver::from_config(&config);
        assert_eq!(
            resolver.config_roots(),
            &[
                PathBuf::from("/b"),
                PathBuf::from("/a"),
                PathBuf::from("/home/u/.config")
            ]
        );
        assert_eq!(resolver.data_roots()[0], PathBuf::from("/usr/share"));
        assert_eq!(resolver.data_roots()[2], PathBuf::from("/home/u/.local/share"));
    }
}
