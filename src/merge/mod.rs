//! The merge engine.
//!
//! Building a tree runs in phases:
//!
//! 1. load the definition and splice in `MergeFile`/`MergeDir` content
//! 2. fold duplicate sections and type them ([`definition`])
//! 3. evaluate each section's rules against its launcher pool ([`rules`])
//! 4. withdraw launchers claimed elsewhere from `OnlyUnallocated` sections
//! 5. resolve moves and apply layouts bottom-up
//!
//! Every file and directory consulted along the way is recorded so the
//! change monitor knows what to watch.

mod assemble;
mod definition;
mod layout;
mod pool;
mod rules;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use menutree_source::load_menu;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::flags::{SortKey, TreeFlags};
use crate::item::Directory;
use crate::resolver::SourceResolver;

use assemble::Evaluator;
use definition::{fold_duplicates, Expander, Section};

/// Why a menu section could not be typed
#[derive(Debug, Error)]
pub(crate) enum SectionError {
    #[error("menu section has no <Name>")]
    MissingName,

    #[error("menu name must not contain '/': {0}")]
    InvalidName(String),

    #[error("unknown <{element}> in {context}")]
    UnknownElement {
        element: String,
        context: &'static str,
    },

    #[error("<{0}> must not be empty")]
    EmptyElement(String),

    #[error("invalid value for attribute {attribute}: {value:?}")]
    InvalidAttribute {
        attribute: &'static str,
        value: String,
    },

    #[error("<Move> needs an <Old> followed by a <New>")]
    UnpairedMove,
}

/// Result of a successful build
pub(crate) struct BuildOutput {
    pub root: Directory,
    /// Files and directories whose change should trigger a rebuild
    pub tracked: BTreeSet<PathBuf>,
}

/// Builds directory trees from menu definitions
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    resolver: SourceResolver,
    /// Desktop names matched against `OnlyShowIn`/`NotShowIn`
    desktops: Vec<String>,
}

impl TreeBuilder {
    pub fn new(resolver: SourceResolver, desktops: Vec<String>) -> Self {
        Self { resolver, desktops }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(SourceResolver::from_config(config), config.desktops.clone())
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn desktops(&self) -> &[String] {
        &self.desktops
    }

    /// Build the tree for a resolved definition file.
    ///
    /// Returns `None` when the definition cannot be read or its root section
    /// is malformed; the reason is logged.
    pub(crate) fn build(
        &self,
        definition: &Path,
        flags: TreeFlags,
        sort_key: SortKey,
    ) -> Option<BuildOutput> {
        let mut tracked = BTreeSet::new();
        tracked.insert(definition.to_path_buf());

        let document = match load_menu(definition) {
            Ok(document) => document,
            Err(err) => {
                warn!(definition = %definition.display(), error = %err, "failed to load menu definition");
                return None;
            }
        };

        let mut root = Expander::new(&self.resolver, definition, &mut tracked).expand(document.root);
        fold_duplicates(&mut root);

        let section = match Section::from_element(&root) {
            Ok(Some(section)) => section,
            Ok(None) => {
                warn!(definition = %definition.display(), "root menu is deleted");
                return None;
            }
            Err(err) => {
                warn!(definition = %definition.display(), error = %err, "malformed root menu");
                return None;
            }
        };

        let evaluated = Evaluator::new(&self.desktops, flags, &mut tracked).run(&section);
        let root = assemble::assemble(evaluated, flags, sort_key);

        info!(
            definition = %definition.display(),
            flags = flags.bits(),
            tracked = tracked.len(),
            "built menu tree"
        );
        Some(BuildOutput { root, tracked })
    }
}
