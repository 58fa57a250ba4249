//! Definition pre-processing.
//!
//! Turns the raw element tree of a definition file into typed [`Section`]s:
//! merge directives are spliced in, default directories expanded, same-named
//! sibling sections folded together and deleted sections dropped.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use menutree_source::{load_menu, Element, SourceError};
use tracing::{debug, warn};

use super::layout::Layout;
use super::rules::Rule;
use super::SectionError;
use crate::resolver::{canonical, resolve_relative, SourceResolver};

/// Splices merged files into a definition and absolutizes directory paths
pub(crate) struct Expander<'a> {
    resolver: &'a SourceResolver,
    /// The top-level definition, which names the default merge directories
    definition: PathBuf,
    tracked: &'a mut BTreeSet<PathBuf>,
    /// Files currently being expanded, for cycle detection
    stack: Vec<PathBuf>,
}

impl<'a> Expander<'a> {
    pub(crate) fn new(
        resolver: &'a SourceResolver,
        definition: &Path,
        tracked: &'a mut BTreeSet<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            definition: definition.to_path_buf(),
            tracked,
            stack: Vec::new(),
        }
    }

    /// Expand the top-level document rooted at `root`
    pub(crate) fn expand(mut self, root: Element) -> Element {
        let file = canonical(&self.definition);
        self.stack.push(file.clone());
        let expanded = self.expand_menu(root, &file);
        self.stack.pop();
        expanded
    }

    fn expand_menu(&mut self, menu: Element, file: &Path) -> Element {
        let mut children = Vec::with_capacity(menu.children.len());

        for child in menu.children {
            match child.name.as_str() {
                "Menu" => children.push(self.expand_menu(child, file)),
                "AppDir" | "DirectoryDir" => {
                    if child.text().is_empty() {
                        continue;
                    }
                    let dir = resolve_relative(file, child.text());
                    children.push(path_element(&child.name, &dir));
                }
                "DefaultAppDirs" => children.extend(
                    self.resolver
                        .default_app_dirs()
                        .iter()
                        .map(|d| path_element("AppDir", d)),
                ),
                "DefaultDirectoryDirs" => children.extend(
                    self.resolver
                        .default_directory_dirs()
                        .iter()
                        .map(|d| path_element("DirectoryDir", d)),
                ),
                "MergeFile" => {
                    let target = match child.attr("type") {
                        Some("parent") => self.resolver.parent_definition(file),
                        _ if child.text().is_empty() => None,
                        _ => Some(resolve_relative(file, child.text())),
                    };
                    match target {
                        Some(target) => children.extend(self.merge_file(&target)),
                        None => debug!(file = %file.display(), "merge file target not found"),
                    }
                }
                "MergeDir" => {
                    if !child.text().is_empty() {
                        let dir = resolve_relative(file, child.text());
                        children.extend(self.merge_dir(&dir));
                    }
                }
                "DefaultMergeDirs" => {
                    for dir in self.resolver.default_merge_dirs(&self.definition) {
                        children.extend(self.merge_dir(&dir));
                    }
                }
                _ => children.push(child),
            }
        }

        Element { children, ..menu }
    }

    /// Children of the merged file's root, minus its `<Name>`
    fn merge_file(&mut self, path: &Path) -> Vec<Element> {
        let path = canonical(path);
        self.tracked.insert(path.clone());

        if self.stack.contains(&path) {
            warn!(file = %path.display(), "skipping recursive merge");
            return Vec::new();
        }

        let document = match load_menu(&path) {
            Ok(document) => document,
            Err(SourceError::Io { .. }) if !path.exists() => {
                debug!(file = %path.display(), "merge file does not exist");
                return Vec::new();
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "ignoring unreadable merge file");
                return Vec::new();
            }
        };

        self.stack.push(path.clone());
        let expanded = self.expand_menu(document.root, &path);
        self.stack.pop();

        expanded
            .children
            .into_iter()
            .filter(|c| c.name != "Name")
            .collect()
    }

    /// Merge every `*.menu` file in `dir` in file-name order
    fn merge_dir(&mut self, dir: &Path) -> Vec<Element> {
        self.tracked.insert(dir.to_path_buf());

        let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(read) => read
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "menu") && p.is_file())
                .collect(),
            Err(_) => return Vec::new(),
        };
        files.sort();

        files.iter().flat_map(|f| self.merge_file(f)).collect()
    }
}

fn path_element(name: &str, path: &Path) -> Element {
    Element {
        name: name.to_string(),
        text: path.to_string_lossy().into_owned(),
        ..Default::default()
    }
}

/// Fold sibling sections with the same name into the last of them,
/// recursively
pub(crate) fn fold_duplicates(menu: &mut Element) {
    let mut folded: Vec<Element> = Vec::with_capacity(menu.children.len());

    for child in menu.children.drain(..) {
        if child.name == "Menu" {
            if let Some(name) = section_name(&child).map(str::to_string) {
                let earlier = folded
                    .iter()
                    .position(|c| c.name == "Menu" && section_name(c) == Some(name.as_str()));
                if let Some(index) = earlier {
                    let mut merged = folded.remove(index);
                    merged.children.extend(child.children);
                    folded.push(merged);
                    continue;
                }
            }
        }
        folded.push(child);
    }

    for child in folded.iter_mut().filter(|c| c.name == "Menu") {
        fold_duplicates(child);
    }
    menu.children = folded;
}

fn section_name(menu: &Element) -> Option<&str> {
    menu.children_named("Name")
        .map(Element::text)
        .filter(|n| !n.is_empty())
        .last()
}

/// A `<Move>` pair, paths relative to the section holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Move {
    pub old: String,
    pub new: String,
}

/// One merged menu section
#[derive(Debug, Clone, Default)]
pub(crate) struct Section {
    pub name: String,
    /// Launcher directories declared here, lowest precedence first
    pub app_dirs: Vec<PathBuf>,
    pub directory_dirs: Vec<PathBuf>,
    /// `<Directory>` names; the last one that resolves wins
    pub directories: Vec<String>,
    pub rules: Vec<Rule>,
    pub only_unallocated: bool,
    pub moves: Vec<Move>,
    pub layout: Option<Layout>,
    pub default_layout: Option<Layout>,
    pub children: Vec<Section>,
}

impl Section {
    /// Type a `<Menu>` element; `Ok(None)` when the section is deleted.
    ///
    /// Malformed subsections are dropped with a warning so the rest of the
    /// definition still builds.
    pub(crate) fn from_element(menu: &Element) -> Result<Option<Self>, SectionError> {
        let name = section_name(menu).ok_or(SectionError::MissingName)?;
        if name.contains('/') {
            return Err(SectionError::InvalidName(name.to_string()));
        }

        let mut section = Section {
            name: name.to_string(),
            ..Default::default()
        };
        let mut deleted = false;
        let mut pending_old: Option<String> = None;

        for child in &menu.children {
            match child.name.as_str() {
                "Name" => {}
                "AppDir" => section.app_dirs.push(PathBuf::from(child.text())),
                "DirectoryDir" => section.directory_dirs.push(PathBuf::from(child.text())),
                "Directory" => {
                    if !child.text().is_empty() {
                        section.directories.push(child.text().to_string());
                    }
                }
                "Include" => section.rules.push(Rule::include(child)?),
                "Exclude" => section.rules.push(Rule::exclude(child)?),
                "OnlyUnallocated" => section.only_unallocated = true,
                "NotOnlyUnallocated" => section.only_unallocated = false,
                "Deleted" => deleted = true,
                "NotDeleted" => deleted = false,
                "Move" => {
                    for part in &child.children {
                        match (part.name.as_str(), pending_old.take()) {
                            ("Old", None) => pending_old = Some(part.text().to_string()),
                            ("New", Some(old)) => section.moves.push(Move {
                                old,
                                new: part.text().to_string(),
                            }),
                            _ => return Err(SectionError::UnpairedMove),
                        }
                    }
                    if pending_old.is_some() {
                        return Err(SectionError::UnpairedMove);
                    }
                }
                "Layout" => section.layout = Some(Layout::from_element(child)?),
                "DefaultLayout" => section.default_layout = Some(Layout::from_element(child)?),
                "Menu" => match Section::from_element(child) {
                    Ok(Some(sub)) => section.children.push(sub),
                    Ok(None) => debug!(parent = %section.name, "dropping deleted section"),
                    Err(err) => warn!(
                        parent = %section.name,
                        error = %err,
                        "skipping malformed menu section"
                    ),
                },
                "LegacyDir" | "KDELegacyDirs" => {
                    debug!(section = %section.name, element = %child.name, "ignoring legacy directory");
                }
                other => {
                    return Err(SectionError::UnknownElement {
                        element: other.to_string(),
                        context: "menu",
                    })
                }
            }
        }

        Ok((!deleted).then_some(section))
    }
}
