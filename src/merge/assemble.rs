//! Section evaluation and tree assembly.
//!
//! Evaluation decides which launchers each section holds. Assembly turns the
//! result into directory and entry nodes, resolves `<Move>` aliases and
//! applies each section's layout bottom-up so a parent can see whether a
//! child ended up empty.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use menutree_source::LauncherRecord;
use tracing::{debug, warn};

use super::definition::{Move, Section};
use super::layout::{InlinePolicy, Layout, LayoutNode, MenunameOptions, MergeKind};
use super::pool::SourcePool;
use super::rules::{self, Verdict};
use crate::flags::{SortKey, TreeFlags};
use crate::item::{Alias, Directory, DirectoryInfo, Entry, Header, Item, LayoutSlot, Separator};

/// A section after rule evaluation
#[derive(Debug)]
pub(crate) struct Evaluated {
    info: DirectoryInfo,
    candidates: Vec<Candidate>,
    only_unallocated: bool,
    moves: Vec<Move>,
    layout: Layout,
    children: Vec<Evaluated>,
}

#[derive(Debug)]
struct Candidate {
    record: Arc<LauncherRecord>,
    excluded: bool,
}

/// Search paths and default layout handed down to subsections
#[derive(Debug, Clone, Default)]
struct Inherited {
    app_dirs: Vec<PathBuf>,
    directory_dirs: Vec<PathBuf>,
    default_layout: Option<Layout>,
}

pub(crate) struct Evaluator<'a> {
    desktops: &'a [String],
    flags: TreeFlags,
    tracked: &'a mut BTreeSet<PathBuf>,
    pool: SourcePool,
    /// Ids included by some section that is not `OnlyUnallocated`
    allocated: BTreeSet<String>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        desktops: &'a [String],
        flags: TreeFlags,
        tracked: &'a mut BTreeSet<PathBuf>,
    ) -> Self {
        Self {
            desktops,
            flags,
            tracked,
            pool: SourcePool::default(),
            allocated: BTreeSet::new(),
        }
    }

    /// Evaluate the whole section tree, then withdraw allocated launchers
    /// from `OnlyUnallocated` sections
    pub(crate) fn run(mut self, root: &Section) -> Evaluated {
        let mut menu = self.section(root, &Inherited::default());
        withdraw_allocated(&mut menu, &self.allocated);
        track_launchers(&menu, self.tracked);
        menu
    }

    fn section(&mut self, section: &Section, inherited: &Inherited) -> Evaluated {
        let scope = Inherited {
            app_dirs: concat(&inherited.app_dirs, &section.app_dirs),
            directory_dirs: concat(&inherited.directory_dirs, &section.directory_dirs),
            default_layout: section
                .default_layout
                .clone()
                .or_else(|| inherited.default_layout.clone()),
        };

        let record = self
            .pool
            .directory_record(&section.directories, &scope.directory_dirs, self.tracked);
        let info = DirectoryInfo {
            menu_id: section.name.clone(),
            name: record.as_ref().map(|r| r.name.clone()),
            comment: record.as_ref().and_then(|r| r.comment.clone()),
            icon: record.as_ref().and_then(|r| r.icon.clone()),
            desktop_file_path: record.as_ref().map(|r| r.path.clone()),
            nodisplay: record.as_ref().is_some_and(|r| r.no_display),
        };

        let mut candidates = Vec::new();
        for (id, record) in self.pool.launchers(&scope.app_dirs, self.tracked) {
            let excluded = match rules::evaluate(&section.rules, &record) {
                Verdict::Included => false,
                Verdict::Excluded => true,
                Verdict::Unmatched => continue,
            } || !record.show_in(self.desktops);
            // A launcher hidden for this desktop claims nothing
            if !excluded && !section.only_unallocated {
                self.allocated.insert(id);
            }

            if excluded && !self.flags.contains(TreeFlags::INCLUDE_EXCLUDED) {
                continue;
            }
            if record.no_display && !self.flags.contains(TreeFlags::INCLUDE_NODISPLAY) {
                continue;
            }
            candidates.push(Candidate { record, excluded });
        }

        let layout = section
            .layout
            .clone()
            .or_else(|| scope.default_layout.clone())
            .unwrap_or_default();

        let children = section
            .children
            .iter()
            .map(|child| self.section(child, &scope))
            .collect();

        Evaluated {
            info,
            candidates,
            only_unallocated: section.only_unallocated,
            moves: section.moves.clone(),
            layout,
            children,
        }
    }
}

fn concat(a: &[PathBuf], b: &[PathBuf]) -> Vec<PathBuf> {
    a.iter().chain(b).cloned().collect()
}

fn withdraw_allocated(menu: &mut Evaluated, allocated: &BTreeSet<String>) {
    if menu.only_unallocated {
        menu.candidates
            .retain(|c| !allocated.contains(&c.record.desktop_file_id));
    }
    for child in &mut menu.children {
        withdraw_allocated(child, allocated);
    }
}

fn track_launchers(menu: &Evaluated, tracked: &mut BTreeSet<PathBuf>) {
    tracked.extend(menu.candidates.iter().map(|c| c.record.path.clone()));
    for child in &menu.children {
        track_launchers(child, tracked);
    }
}

/// Build the directory tree for an evaluated root section
pub(crate) fn assemble(menu: Evaluated, flags: TreeFlags, key: SortKey) -> Directory {
    let mut root = Draft::new(menu);
    resolve_moves(&mut root);
    root.finish(flags, key)
}

/// A directory whose layout has not been applied yet
struct Draft {
    dir: Directory,
    entries: Vec<Entry>,
    moves: Vec<Move>,
    layout: Layout,
    aliases: Vec<Alias>,
    children: Vec<Draft>,
}

impl Draft {
    fn new(menu: Evaluated) -> Self {
        Self {
            dir: Directory::new(menu.info),
            entries: menu
                .candidates
                .into_iter()
                .map(|c| Entry::new(c.record, c.excluded))
                .collect(),
            moves: menu.moves,
            layout: menu.layout,
            aliases: Vec::new(),
            children: menu.children.into_iter().map(Draft::new).collect(),
        }
    }

    fn child_index(&self, menu_id: &str) -> Option<usize> {
        self.children.iter().position(|c| c.dir.menu_id() == menu_id)
    }

    /// Apply the layout and install contents, children first
    fn finish(self, flags: TreeFlags, key: SortKey) -> Directory {
        let Draft {
            dir,
            entries,
            layout,
            aliases,
            children,
            ..
        } = self;

        let mut menus: Vec<Option<Directory>> = children
            .into_iter()
            .map(|child| Some(child.finish(flags, key)))
            .collect();
        let mut files: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
        let (mut menu_aliases, mut file_aliases): (Vec<Alias>, Vec<Alias>) = aliases
            .into_iter()
            .partition(|a| matches!(a.item(), Item::Directory(_)));

        // Explicitly named items never join merge runs
        let named_menus: HashSet<&str> = layout
            .nodes
            .iter()
            .filter_map(|n| match n {
                LayoutNode::Menuname { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        let named_files: HashSet<&str> = layout
            .nodes
            .iter()
            .filter_map(|n| match n {
                LayoutNode::Filename(id) => Some(id.as_str()),
                _ => None,
            })
            .collect();

        let mut slots = Vec::new();
        let mut subdirs = Vec::new();

        for node in &layout.nodes {
            match node {
                LayoutNode::Menuname { id, options } => {
                    let Some(child) = take_menu(&mut menus, |d| d.menu_id() == id.as_str()) else {
                        continue;
                    };
                    let policy = options.resolve(&layout.defaults);
                    if let Some(block) = place(child, &policy, flags, &mut subdirs) {
                        slots.extend(block.into_iter().map(LayoutSlot::Fixed));
                    }
                }
                LayoutNode::Filename(id) => {
                    let found = files
                        .iter_mut()
                        .find(|e| e.as_ref().is_some_and(|e| e.desktop_file_id() == id))
                        .and_then(Option::take);
                    if let Some(entry) = found {
                        slots.push(LayoutSlot::Fixed(Item::Entry(entry)));
                    }
                }
                LayoutNode::Separator => {
                    slots.push(LayoutSlot::Fixed(Item::Separator(Separator::new())))
                }
                LayoutNode::Merge(kind) => {
                    let mut run: Vec<Vec<Item>> = Vec::new();
                    if matches!(kind, MergeKind::Menus | MergeKind::All) {
                        let policy = MenunameOptions::default().resolve(&layout.defaults);
                        while let Some(child) =
                            take_menu(&mut menus, |d| !named_menus.contains(d.menu_id()))
                        {
                            run.extend(place(child, &policy, flags, &mut subdirs));
                        }
                        run.extend(menu_aliases.drain(..).map(|a| vec![Item::Alias(a)]));
                    }
                    if matches!(kind, MergeKind::Files | MergeKind::All) {
                        for slot in files.iter_mut() {
                            let unnamed = slot
                                .as_ref()
                                .is_some_and(|e| !named_files.contains(e.desktop_file_id()));
                            if unnamed {
                                run.extend(slot.take().map(|e| vec![Item::Entry(e)]));
                            }
                        }
                        run.extend(file_aliases.drain(..).map(|a| vec![Item::Alias(a)]));
                    }
                    if !run.is_empty() {
                        slots.push(LayoutSlot::Sorted(run));
                    }
                }
            }
        }

        let unplaced = menus.iter().flatten().count() + files.iter().flatten().count();
        if unplaced > 0 {
            debug!(menu = %dir.menu_id(), unplaced, "layout leaves items unplaced");
        }

        if !flags.contains(TreeFlags::SHOW_ALL_SEPARATORS) {
            slots = collapse_separators(slots);
        }
        dir.install(slots, subdirs, key);
        dir
    }
}

fn take_menu(
    menus: &mut [Option<Directory>],
    mut wanted: impl FnMut(&Directory) -> bool,
) -> Option<Directory> {
    menus
        .iter_mut()
        .find(|slot| slot.as_ref().is_some_and(&mut wanted))
        .and_then(Option::take)
}

/// Whether a finished subdirectory should appear at all
fn visible(dir: &Directory, show_empty: bool, flags: TreeFlags) -> bool {
    if dir.is_nodisplay() && !flags.contains(TreeFlags::INCLUDE_NODISPLAY) {
        return false;
    }
    show_empty || flags.contains(TreeFlags::SHOW_EMPTY) || !dir.contents().is_empty()
}

/// Items representing `child` in its parent, or `None` when it is hidden.
/// A visible child is always owned by the parent, inlined or not.
fn place(
    child: Directory,
    policy: &InlinePolicy,
    flags: TreeFlags,
    subdirs: &mut Vec<Directory>,
) -> Option<Vec<Item>> {
    if !visible(&child, policy.show_empty, flags) {
        return None;
    }
    let block = inline_block(&child, policy).unwrap_or_else(|| vec![Item::Directory(child.clone())]);
    subdirs.push(child);
    Some(block)
}

fn inline_block(child: &Directory, policy: &InlinePolicy) -> Option<Vec<Item>> {
    if !policy.inline {
        return None;
    }
    let contents = child.contents();
    if policy.inline_limit != 0 && contents.len() > policy.inline_limit {
        return None;
    }

    if policy.inline_alias && contents.len() == 1 {
        let target = match &contents[0] {
            Item::Alias(alias) => Some(alias.item()),
            item @ (Item::Entry(_) | Item::Directory(_)) => Some(item.clone()),
            _ => None,
        };
        if let Some(target) = target {
            return Some(vec![Item::Alias(Alias::new(target))]);
        }
    }

    let mut block = Vec::with_capacity(contents.len() + 1);
    if policy.inline_header {
        block.push(Item::Header(Header::new(child.clone())));
    }
    block.extend(contents.iter().map(relay));
    Some(block)
}

/// Stand-in for an item of an inlined child; the original keeps its parent
fn relay(item: &Item) -> Item {
    match item {
        Item::Separator(_) => Item::Separator(Separator::new()),
        Item::Header(header) => Item::Header(Header::new(header.directory())),
        Item::Alias(alias) => Item::Alias(Alias::new(alias.item())),
        other => Item::Alias(Alias::new(other.clone())),
    }
}

/// Drop leading, trailing and repeated separators
fn collapse_separators(slots: Vec<LayoutSlot>) -> Vec<LayoutSlot> {
    let mut out: Vec<LayoutSlot> = Vec::with_capacity(slots.len());
    let mut pending: Option<LayoutSlot> = None;

    for slot in slots {
        if matches!(slot, LayoutSlot::Fixed(Item::Separator(_))) {
            if !out.is_empty() && pending.is_none() {
                pending = Some(slot);
            }
            continue;
        }
        out.extend(pending.take());
        out.push(slot);
    }
    out
}

/// A resolved `<Move>` waiting to be placed
struct Placement {
    destination: Vec<usize>,
    /// Set when the moved item is a directory
    target: Option<Vec<usize>>,
    alias: Alias,
    menu: String,
    mv: Move,
}

/// Turn every `<Move>` into an alias placed at its destination
///
/// Aliases own their targets, so a directory alias is refused when the
/// target already reaches the destination through children or aliases
/// accepted earlier.
fn resolve_moves(root: &mut Draft) {
    let mut pending = Vec::new();
    collect_moves(root, &mut Vec::new(), &mut pending);

    // (holder, target) paths of accepted directory aliases
    let mut links: Vec<(Vec<usize>, Vec<usize>)> = Vec::new();
    for placement in pending {
        if let Some(target) = placement.target {
            if reaches(&target, &placement.destination, &links) {
                warn!(
                    menu = %placement.menu,
                    old = %placement.mv.old,
                    new = %placement.mv.new,
                    "ignoring move that would place a directory inside itself"
                );
                continue;
            }
            links.push((placement.destination.clone(), target));
        }
        if let Some(draft) = draft_at(root, &placement.destination) {
            draft.aliases.push(placement.alias);
        }
    }
}

/// Whether `to` can be reached from `from` through child and alias links
fn reaches<'a>(from: &'a [usize], to: &[usize], links: &'a [(Vec<usize>, Vec<usize>)]) -> bool {
    let mut reached: Vec<&'a [usize]> = vec![from];
    let mut next = 0;
    while let Some(&current) = reached.get(next) {
        if to.starts_with(current) {
            return true;
        }
        for (holder, target) in links {
            if holder.starts_with(current) && !reached.contains(&target.as_slice()) {
                reached.push(target.as_slice());
            }
        }
        next += 1;
    }
    false
}

fn collect_moves(node: &Draft, path: &mut Vec<usize>, pending: &mut Vec<Placement>) {
    for mv in &node.moves {
        match locate_move(node, path, mv) {
            Some(found) => pending.push(found),
            None => warn!(
                menu = %node.dir.menu_id(),
                old = %mv.old,
                new = %mv.new,
                "ignoring move that cannot be resolved"
            ),
        }
    }
    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        collect_moves(child, path, pending);
        path.pop();
    }
}

/// Destination and alias for one move, relative to `node` at `base`
fn locate_move(node: &Draft, base: &[usize], mv: &Move) -> Option<Placement> {
    let old = components(&mv.old);
    let (last, holders) = old.split_last()?;
    let (holder, holder_path) = walk(node, base, holders)?;

    let (item, target) = match holder.child_index(last) {
        Some(index) => {
            let mut path = holder_path;
            path.push(index);
            (Item::Directory(holder.children[index].dir.clone()), Some(path))
        }
        None => {
            let entry = holder.entries.iter().find(|e| e.desktop_file_id() == *last)?;
            (Item::Entry(entry.clone()), None)
        }
    };

    let (_, destination) = walk(node, base, &components(&mv.new))?;
    Some(Placement {
        destination,
        target,
        alias: Alias::new(item),
        menu: node.dir.menu_id().to_string(),
        mv: mv.clone(),
    })
}

fn walk<'d>(node: &'d Draft, base: &[usize], parts: &[&str]) -> Option<(&'d Draft, Vec<usize>)> {
    let mut current = node;
    let mut path = base.to_vec();
    for part in parts {
        let index = current.child_index(part)?;
        path.push(index);
        current = &current.children[index];
    }
    Some((current, path))
}

fn draft_at<'d>(root: &'d mut Draft, path: &[usize]) -> Option<&'d mut Draft> {
    let mut current = root;
    for &index in path {
        current = current.children.get_mut(index)?;
    }
    Some(current)
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}
