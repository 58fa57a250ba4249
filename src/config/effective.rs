//! Effective configuration with provenance
//!
//! Merges the built-in defaults, the XDG environment, an optional TOML file
//! and explicit overrides, and remembers which layers contributed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::defaults::{BuiltinDefaults, DEFAULT_DEBOUNCE_MS};
use super::merge::merge_layers;

/// Upper bound for the change debounce
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Location of the optional config file below the user config root
pub const CONFIG_FILE: &str = "menutree/config.toml";

/// Engine settings after all layers are merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// System config roots, most important first
    pub config_dirs: Vec<PathBuf>,

    /// User config root; outranks every entry of `config_dirs`
    pub config_home: PathBuf,

    /// System data roots, most important first
    pub data_dirs: Vec<PathBuf>,

    /// User data root; outranks every entry of `data_dirs`
    pub data_home: PathBuf,

    /// Tried first when resolving bare definition names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_prefix: Option<String>,

    /// Desktop names for `OnlyShowIn`/`NotShowIn`
    pub desktops: Vec<String>,

    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Quiet period collected into one change batch
    pub debounce_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl MonitorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            config_dirs: defaults.config_dirs,
            config_home: defaults.config_home,
            data_dirs: defaults.data_dirs,
            data_home: defaults.data_home,
            menu_prefix: None,
            desktops: Vec::new(),
            monitor: MonitorConfig {
                debounce_ms: defaults.debounce_ms,
            },
        }
    }
}

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Environment,
    File,
    Override,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Merged configuration plus the layers it came from
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config: EngineConfig,

    /// Contributing layers, lowest precedence first
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build from the process environment and the default config file
    pub fn from_env() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::build(&env, None, None)
    }

    /// Build from explicit inputs.
    ///
    /// `file` must exist when given; otherwise the default
    /// `<config home>/menutree/config.toml` is read if present.
    pub fn build(
        env: &HashMap<String, String>,
        file: Option<&Path>,
        overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: built-in defaults
        let home = env.get("HOME").map(Path::new);
        layers.push(BuiltinDefaults::for_home(home).to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
        });

        // Layer 2: XDG environment
        let environment = Self::environment_layer(env);
        if !environment.is_empty() {
            layers.push(Value::Object(environment));
            sources.push(ConfigSource {
                origin: ConfigOrigin::Environment,
                path: None,
            });
        }

        // Layer 3: config file
        let file = match file {
            Some(path) => Some(path.to_path_buf()),
            None => Some(Self::default_file(env)).filter(|p| p.is_file()),
        };
        if let Some(path) = file {
            layers.push(Self::load_toml_file(&path)?);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
            });
        }

        // Layer 4: explicit overrides
        if let Some(overrides) = overrides {
            layers.push(overrides);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Override,
                path: None,
            });
        }

        let merged = merge_layers(layers);
        let config: EngineConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(format!("Invalid configuration: {}", e)))?;
        Self::validate(&config)?;

        debug!(layers = sources.len(), "resolved engine configuration");
        Ok(Self { config, sources })
    }

    /// `$XDG_CONFIG_HOME/menutree/config.toml`, falling back to
    /// `$HOME/.config`
    pub fn default_file(env: &HashMap<String, String>) -> PathBuf {
        let config_home = match env.get("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => BuiltinDefaults::for_home(env.get("HOME").map(Path::new)).config_home,
        };
        config_home.join(CONFIG_FILE)
    }

    fn environment_layer(env: &HashMap<String, String>) -> Map<String, Value> {
        let mut layer = Map::new();
        let var = |name: &str| env.get(name).filter(|v| !v.is_empty());
        let list = |raw: &str| -> Value {
            raw.split(':')
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect()
        };

        if let Some(raw) = var("XDG_CONFIG_DIRS") {
            layer.insert("config_dirs".into(), list(raw.as_str()));
        }
        if let Some(raw) = var("XDG_DATA_DIRS") {
            layer.insert("data_dirs".into(), list(raw.as_str()));
        }
        if let Some(dir) = var("XDG_CONFIG_HOME") {
            layer.insert("config_home".into(), Value::String(dir.clone()));
        }
        if let Some(dir) = var("XDG_DATA_HOME") {
            layer.insert("data_home".into(), Value::String(dir.clone()));
        }
        if let Some(prefix) = var("XDG_MENU_PREFIX") {
            layer.insert("menu_prefix".into(), Value::String(prefix.clone()));
        }
        if let Some(raw) = var("XDG_CURRENT_DESKTOP") {
            layer.insert("desktops".into(), list(raw.as_str()));
        }
        layer
    }

    /// Load and parse a TOML file into a JSON value
    fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok(Self::toml_to_json(toml_value))
    }

    /// Convert a TOML value to a JSON value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(items) => {
                Value::Array(items.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        let empty = |dirs: &[PathBuf]| dirs.iter().any(|d| d.as_os_str().is_empty());
        if empty(&config.config_dirs) || empty(&config.data_dirs) {
            return Err(ConfigError::ValidationError(
                "search roots must not be empty paths".to_string(),
            ));
        }
        if config.monitor.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::ValidationError(format!(
                "monitor.debounce_ms must be at most {}",
                MAX_DEBOUNCE_MS
            )));
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
