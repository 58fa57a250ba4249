//! Launcher and directory-metadata scanning.
//!
//! One pool lives for a single build so that an AppDir shared by many
//! sections is walked once.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use menutree_source::{DirectoryRecord, LauncherRecord, SourceError};
use tracing::{debug, warn};
use walkdir::WalkDir;

const DESKTOP_EXTENSION: &str = "desktop";

type Scanned = Arc<Vec<(String, Arc<LauncherRecord>)>>;

#[derive(Default)]
pub(crate) struct SourcePool {
    app_dirs: HashMap<PathBuf, Scanned>,
    directory_files: HashMap<PathBuf, Option<Arc<DirectoryRecord>>>,
}

impl SourcePool {
    /// Visible launchers of `app_dirs` keyed by desktop-file id.
    ///
    /// When two directories provide the same id the later one wins, even if
    /// its record is `Hidden`, which is how a user hides a system launcher.
    pub(crate) fn launchers(
        &mut self,
        app_dirs: &[PathBuf],
        tracked: &mut BTreeSet<PathBuf>,
    ) -> BTreeMap<String, Arc<LauncherRecord>> {
        let mut pool = BTreeMap::new();
        for dir in app_dirs {
            for (id, record) in self.scan(dir, tracked).iter() {
                pool.insert(id.clone(), Arc::clone(record));
            }
        }
        pool.retain(|_, record| !record.hidden);
        pool
    }

    fn scan(&mut self, dir: &Path, tracked: &mut BTreeSet<PathBuf>) -> Scanned {
        if let Some(scanned) = self.app_dirs.get(dir) {
            return Arc::clone(scanned);
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "skipping unreadable path");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                tracked.insert(entry.path().to_path_buf());
                continue;
            }
            if entry.path().extension().map_or(true, |ext| ext != DESKTOP_EXTENSION) {
                continue;
            }

            let Some(id) = desktop_file_id(dir, entry.path()) else {
                continue;
            };
            match LauncherRecord::load(entry.path(), id.clone()) {
                Ok(record) => records.push((id, Arc::new(record))),
                Err(SourceError::UnsupportedType(kind)) => {
                    debug!(file = %entry.path().display(), kind = %kind, "ignoring non-application launcher")
                }
                Err(err) => {
                    warn!(file = %entry.path().display(), error = %err, "skipping launcher")
                }
            }
        }
        tracked.insert(dir.to_path_buf());

        debug!(dir = %dir.display(), launchers = records.len(), "scanned application directory");
        let scanned = Arc::new(records);
        self.app_dirs.insert(dir.to_path_buf(), Arc::clone(&scanned));
        scanned
    }

    /// Metadata for the last of `names` found in the last of `dirs` that
    /// has it
    pub(crate) fn directory_record(
        &mut self,
        names: &[String],
        dirs: &[PathBuf],
        tracked: &mut BTreeSet<PathBuf>,
    ) -> Option<Arc<DirectoryRecord>> {
        tracked.extend(dirs.iter().cloned());

        for name in names.iter().rev() {
            for dir in dirs.iter().rev() {
                let path = dir.join(name);
                if let Some(record) = self.directory_file(&path) {
                    tracked.insert(path);
                    return Some(record);
                }
            }
        }
        None
    }

    fn directory_file(&mut self, path: &Path) -> Option<Arc<DirectoryRecord>> {
        if let Some(cached) = self.directory_files.get(path) {
            return cached.clone();
        }

        let record = if path.is_file() {
            match DirectoryRecord::load(path) {
                Ok(record) if !record.hidden => Some(Arc::new(record)),
                Ok(_) => None,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping directory metadata");
                    None
                }
            }
        } else {
            None
        };
        self.directory_files.insert(path.to_path_buf(), record.clone());
        record
    }
}

/// Relative path below the AppDir with separators replaced by `-`
pub(crate) fn desktop_file_id(app_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(app_dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("-"))
}
