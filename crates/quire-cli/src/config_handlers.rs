//! Handler functions for config CLI commands.
//!
//! Implements `quire config {path,get,init,export}` and the TOML dotted-key
//! lookup they share.

use crate::cli::ConfigAction;
use crate::config::QuireConfig;
use quire_core::{Error, Result};
use std::path::PathBuf;

// ============================================================================
// Command dispatch
// ============================================================================

/// Handle a config subcommand.
///
/// Receives the raw `--config` path (not a loaded config) because some
/// commands (path, init) work before a config file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Get { key } => {
            let config = QuireConfig::load(config_path)?;
            println!("{}", config_value(&config, &key)?);
            Ok(())
        }
        ConfigAction::Init { file, force } => {
            let path = cmd_config_init(file.as_deref(), force)?;
            println!("Config file created at {}", path.display());
            Ok(())
        }
        ConfigAction::Export { docker_env } => {
            let config = QuireConfig::load(config_path)?;
            for line in export_lines(&config, docker_env)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

// ============================================================================
// Command handlers
// ============================================================================

fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    let path = QuireConfig::resolve_config_path(config_path).ok_or_else(|| {
        Error::config("Could not determine config directory for this platform")
    })?;
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(file does not exist; run `quire config init` to create it)");
    }
    Ok(())
}

/// Look up a dotted key in the resolved configuration.
fn config_value(config: &QuireConfig, key: &str) -> Result<String> {
    let value = toml::Value::try_from(config).map_err(|e| Error::config(e.to_string()))?;
    get_nested_value(&value, key)
        .map(format_toml_value)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))
}

/// Write a default configuration file and return where it went.
fn cmd_config_init(file: Option<&str>, force: bool) -> Result<PathBuf> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => QuireConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = QuireConfig::default().to_toml_string()?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;
    tracing::info!(path = %path.display(), "Wrote default configuration");
    Ok(path)
}

fn export_lines(config: &QuireConfig, docker_env: bool) -> Result<Vec<String>> {
    Ok(config
        .to_env_vars()?
        .into_iter()
        .map(|(key, value)| {
            if docker_env {
                format!("--env {key}={value}")
            } else {
                format!("{key}={value}")
            }
        })
        .collect())
}

// ============================================================================
// TOML dotted-key helpers
// ============================================================================

/// Navigate a dotted key path in a TOML value tree.
fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

/// Format a TOML value for display on stdout.
fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_nested() {
        let config = QuireConfig::default();
        assert_eq!(config_value(&config, "editor.debounce_ms").unwrap(), "2000");
        assert_eq!(config_value(&config, "project_name").unwrap(), "quire");
    }

    #[test]
    fn test_config_value_missing() {
        let err = config_value(&QuireConfig::default(), "editor.nope").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_config_value_table() {
        let out = config_value(&QuireConfig::default(), "editor").unwrap();
        assert!(out.contains("debounce_ms = 2000"));
    }

    #[test]
    fn test_cmd_config_init_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("quire").join("config.toml");

        let written = cmd_config_init(Some(path.to_str().unwrap()), false).unwrap();
        assert_eq!(written, path);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[editor]"));
        let loaded = QuireConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded, QuireConfig::default());
    }

    #[test]
    fn test_cmd_config_init_no_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "existing").unwrap();

        let err = cmd_config_init(Some(path.to_str().unwrap()), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        cmd_config_init(Some(path.to_str().unwrap()), true).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("project_name"));
    }

    #[test]
    fn test_export_lines() {
        let config = QuireConfig::default();
        let plain = export_lines(&config, false).unwrap();
        assert!(plain.contains(&"QUIRE_EDITOR_SAVE_TIMEOUT_MS=10000".to_string()));

        let docker = export_lines(&config, true).unwrap();
        assert!(docker.iter().all(|l| l.starts_with("--env QUIRE_")));
    }

    #[test]
    fn test_cmd_config_path_explicit() {
        assert!(cmd_config_path(Some("/explicit/config.toml")).is_ok());
    }

    #[test]
    fn test_get_nested_value() {
        let val: toml::Value = toml::from_str("[editor]\ntable_rows = 4").unwrap();
        assert_eq!(
            get_nested_value(&val, "editor.table_rows"),
            Some(&toml::Value::Integer(4))
        );
        assert!(get_nested_value(&val, "editor.table_rows.deeper").is_none());
        assert!(get_nested_value(&val, "missing").is_none());
    }

    #[test]
    fn test_format_toml_value() {
        assert_eq!(format_toml_value(&toml::Value::String("x".into())), "x");
        assert_eq!(format_toml_value(&toml::Value::Integer(42)), "42");
        assert_eq!(format_toml_value(&toml::Value::Boolean(true)), "true");
    }
}
