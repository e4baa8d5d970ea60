//! Configuration for the `quire` CLI.
//!
//! Provides the [`QuireConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `QUIRE_CONFIG` environment variable
//! 3. XDG default: `~/.config/quire/config.toml`
//! 4. Built-in defaults

use confyg::{Confygery, env};
use quire_core::{EditorConfig, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "QUIRE_CONFIG";

/// Prefix for env var overrides.
const ENV_PREFIX: &str = "QUIRE";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    /// Project name, shown in version output.
    pub project_name: String,

    /// Editing-engine settings.
    pub editor: EditorConfig,
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            project_name: "quire".to_string(),
            editor: EditorConfig::default(),
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl QuireConfig {
    /// Load configuration from file, environment, and defaults.
    ///
    /// The result is validated before it is returned.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        env_opts.add_section("editor");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;
        config.editor.validate()?;

        tracing::debug!(project = %config.project_name, "Configuration loaded");
        Ok(config)
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        resolve_with(explicit, std::env::var(CONFIG_ENV).ok())
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("quire").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `QUIRE_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, ENV_PREFIX, &mut vars);
        Ok(vars)
    }
}

fn resolve_with(explicit: Option<&str>, from_env: Option<String>) -> Option<PathBuf> {
    explicit
        .map(PathBuf::from)
        .or_else(|| from_env.map(PathBuf::from))
        .or_else(QuireConfig::default_config_path)
}

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
