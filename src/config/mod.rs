//! Engine configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in XDG defaults
//! 2. XDG environment variables
//! 3. TOML file (`$XDG_CONFIG_HOME/menutree/config.toml` or explicit path)
//! 4. Explicit overrides (CLI flags)

mod defaults;
mod effective;
mod merge;

pub use defaults::{BuiltinDefaults, DEFAULT_DEBOUNCE_MS};
pub use effective::{
    ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, EngineConfig, MonitorConfig,
    CONFIG_FILE, MAX_DEBOUNCE_MS,
};
pub use merge::{deep_merge, merge_layers};
