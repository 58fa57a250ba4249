//! Readers for the on-disk sources of an application menu.
//!
//! This crate turns files into raw records and nothing more:
//! - Menu definition files (`.menu`) become a generic [`Element`] tree
//! - Launcher files (`.desktop`) become [`LauncherRecord`]s
//! - Directory metadata files (`.directory`) become [`DirectoryRecord`]s
//!
//! Interpreting those records (rules, layout, precedence) is the job of the
//! `menutree` crate.

mod desktop;
mod error;
mod keyfile;
mod menu;

pub use desktop::{DirectoryRecord, LauncherRecord, DESKTOP_ENTRY_GROUP};
pub use error::{SourceError, SourceResult};
pub use keyfile::{Group, KeyFile};
pub use menu::{load_menu, parse_menu, Element, MenuDocument};
