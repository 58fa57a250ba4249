//! Test fixtures: XDG directory layouts in a temporary root.
//!
//! Layout mirrors a real system with one system and one user layer:
//! - `etc/xdg` / `home/.config` hold menu definitions
//! - `usr/share` / `home/.local/share` hold launchers and directory files

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use menutree::config::MonitorConfig;
use menutree::{Directory, EngineConfig, Item, TreeBuilder, TreeCache};
use tempfile::TempDir;

/// Which layer a file belongs to
#[derive(Debug, Clone, Copy)]
pub enum Layer {
    System,
    User,
}

pub struct Xdg {
    pub temp: TempDir,
}

impl Xdg {
    pub fn new() -> Self {
        let xdg = Self {
            temp: TempDir::new().expect("create temp dir"),
        };
        for layer in [Layer::System, Layer::User] {
            fs::create_dir_all(xdg.config_root(layer).join("menus")).unwrap();
            fs::create_dir_all(xdg.data_root(layer).join("applications")).unwrap();
            fs::create_dir_all(xdg.data_root(layer).join("desktop-directories")).unwrap();
        }
        xdg
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn config_root(&self, layer: Layer) -> PathBuf {
        match layer {
            Layer::System => self.root().join("etc/xdg"),
            Layer::User => self.root().join("home/.config"),
        }
    }

    pub fn data_root(&self, layer: Layer) -> PathBuf {
        match layer {
            Layer::System => self.root().join("usr/share"),
            Layer::User => self.root().join("home/.local/share"),
        }
    }

    pub fn apps_dir(&self, layer: Layer) -> PathBuf {
        self.data_root(layer).join("applications")
    }

    /// Write a menu definition under `<config root>/menus/`
    pub fn menu(&self, layer: Layer, name: &str, xml: &str) -> PathBuf {
        write(&self.config_root(layer).join("menus").join(name), xml)
    }

    /// Write a launcher under `<data root>/applications/`
    pub fn app(&self, layer: Layer, id: &str, name: &str, categories: &str) -> PathBuf {
        self.app_with(layer, id, name, categories, "")
    }

    /// Launcher with extra raw key lines appended to the entry group
    pub fn app_with(&self, layer: Layer, id: &str, name: &str, categories: &str, extra: &str) -> PathBuf {
        let content = format!(
            "[Desktop Entry]\nType=Application\nName={}\nExec={}\nCategories={}\n{}",
            name,
            id.trim_end_matches(".desktop"),
            categories,
            extra
        );
        write(&self.apps_dir(layer).join(id), &content)
    }

    /// Write a directory metadata file under `<data root>/desktop-directories/`
    pub fn directory(&self, layer: Layer, file: &str, name: &str) -> PathBuf {
        let content = format!("[Desktop Entry]\nType=Directory\nName={}\n", name);
        write(
            &self.data_root(layer).join("desktop-directories").join(file),
            &content,
        )
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            config_dirs: vec![self.config_root(Layer::System)],
            config_home: self.config_root(Layer::User),
            data_dirs: vec![self.data_root(Layer::System)],
            data_home: self.data_root(Layer::User),
            menu_prefix: None,
            desktops: vec!["GNOME".to_string()],
            monitor: MonitorConfig { debounce_ms: 10 },
        }
    }

    pub fn builder(&self) -> TreeBuilder {
        TreeBuilder::from_config(&self.config())
    }

    pub fn cache(&self) -> TreeCache {
        TreeCache::new(self.builder())
    }
}

pub fn write(path: &Path, content: &str) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// One label per item of `dir`, in rendered order
pub fn labels(dir: &Directory) -> Vec<String> {
    dir.contents().iter().map(label).collect()
}

pub fn label(item: &Item) -> String {
    match item {
        Item::Directory(d) => format!("dir:{}", d.menu_id()),
        Item::Entry(e) => format!("entry:{}", e.desktop_file_id()),
        Item::Separator(_) => "sep".to_string(),
        Item::Header(h) => format!("header:{}", h.directory().menu_id()),
        Item::Alias(a) => {
            let target = label(&a.item());
            let id = target.split_once(':').map_or("?", |(_, id)| id);
            format!("alias:{}", id)
        }
    }
}

/// Desktop-file ids of every entry directly in `dir`
pub fn entry_ids(dir: &Directory) -> Vec<String> {
    dir.contents()
        .iter()
        .filter_map(|item| item.as_entry().map(|e| e.desktop_file_id().to_string()))
        .collect()
}
