//! Error types surfaced by the public API.
//!
//! Missing definitions and unresolved paths are not errors: they come back
//! as `None`. Malformed records and sections are logged and skipped during a
//! build. What remains here are synchronous argument and setup failures.

use thiserror::Error;

use crate::config::ConfigError;
use crate::monitor::WatchError;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("invalid {what}: '{value}'")]
    InvalidArgument { what: &'static str, value: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("watcher error: {0}")]
    Watch(#[from] WatchError),
}

impl MenuError {
    pub(crate) fn invalid(what: &'static str, value: impl ToString) -> Self {
        Self::InvalidArgument {
            what,
            value: value.to_string(),
        }
    }
}
