//! menutree - layered desktop application menus
//!
//! This crate builds the "Applications" menu a desktop shell renders from
//! layered sources: system and user menu definitions, directory metadata and
//! application launchers. Trees are cached per (definition, flags), keep their
//! identity across reloads, and notify observers when a contributing file
//! changes.
//!
//! ```no_run
//! use menutree::{lookup, Item, TreeFlags};
//!
//! if let Some(tree) = lookup("applications.menu", TreeFlags::empty()) {
//!     for item in tree.root_directory().contents() {
//!         if let Item::Entry(entry) = item {
//!             println!("{}", entry.display_name());
//!         }
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod flags;
pub mod item;
pub mod merge;
pub mod monitor;
pub mod path;
pub mod resolver;
pub mod tree;

mod sync;

pub use cache::{lookup, TreeCache, TreeKey};
pub use config::{EffectiveConfig, EngineConfig};
pub use error::MenuError;
pub use flags::{SortKey, TreeFlags};
pub use item::{Alias, Directory, Entry, Header, Item, ItemType, Separator};
pub use merge::TreeBuilder;
pub use monitor::{ChangeEvent, ChangeKind, ChangeMonitor, ManualWatcher, NotifyWatcher, Watcher};
pub use resolver::SourceResolver;
pub use tree::Tree;
