//! Built-in defaults (layer 1)
//!
//! The XDG base-directory fallbacks used when nothing else is configured.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Debounce applied to change batches when not configured
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Built-in default configuration values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// System config roots, most important first (default: `/etc/xdg`)
    pub config_dirs: Vec<PathBuf>,

    /// System data roots, most important first
    pub data_dirs: Vec<PathBuf>,

    /// User config root (default: `$HOME/.config`)
    pub config_home: PathBuf,

    /// User data root (default: `$HOME/.local/share`)
    pub data_home: PathBuf,

    pub debounce_ms: u64,
}

impl BuiltinDefaults {
    /// Defaults relative to `home`; without a home directory the user roots
    /// are relative to the working directory
    pub fn for_home(home: Option<&Path>) -> Self {
        let home = home.map(Path::to_path_buf).unwrap_or_default();
        Self {
            config_dirs: vec![PathBuf::from("/etc/xdg")],
            data_dirs: vec![
                PathBuf::from("/usr/local/share"),
                PathBuf::from("/usr/share"),
            ],
            config_home: home.join(".config"),
            data_home: home.join(".local/share"),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Convert to a JSON value for merging
    pub fn to_value(&self) -> Value {
        json!({
            "config_dirs": self.config_dirs,
            "data_dirs": self.data_dirs,
            "config_home": self.config_home,
            "data_home": self.data_home,
            "desktops": [],
            "monitor": {
                "debounce_ms": self.debounce_ms
            }
        })
    }
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self::for_home(std::env::var_os("HOME").as_deref().map(Path::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_relative_roots() {
        let defaults = BuiltinDefaults::for_home(Some(Path::new("/home/ada")));
        assert_eq!(defaults.config_home, PathBuf::from("/home/ada/.config"));
        assert_eq!(defaults.data_home, PathBuf::from("/home/ada/.local/share"));
        assert_eq!(defaults.config_dirs, vec![PathBuf::from("/etc/xdg")]);
    }

    #[test]
    fn test_to_value_shape() {
        let value = BuiltinDefaults::for_home(Some(Path::new("/h"))).to_value();
        assert_eq!(value["config_home"], "/h/.config");
        assert_eq!(value["data_dirs"][1], "/usr/share");
        assert_eq!(value["monitor"]["debounce_ms"], DEFAULT_DEBOUNCE_MS);
        assert!(value.get("menu_prefix").is_none());
    }
}
