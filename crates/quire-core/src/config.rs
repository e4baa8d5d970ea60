//! Tunables for an editing session.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Editing-engine configuration.
///
/// Every field has a default, so an empty `[editor]` table (or none at all)
/// yields a working configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Quiet period after the last mutation before an autosave fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound on a single persistence call.
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,

    /// Shortest base64 payload accepted as an intact inline image.
    #[serde(default = "default_min_media_payload")]
    pub min_media_payload: usize,

    /// Character that opens the block-insertion menu.
    #[serde(default = "default_slash_trigger")]
    pub slash_trigger: char,

    /// Default row count for inserted tables.
    #[serde(default = "default_table_dim")]
    pub table_rows: usize,

    /// Default column count for inserted tables.
    #[serde(default = "default_table_dim")]
    pub table_columns: usize,
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_save_timeout_ms() -> u64 {
    10_000
}

fn default_min_media_payload() -> usize {
    50
}

fn default_slash_trigger() -> char {
    '/'
}

fn default_table_dim() -> usize {
    3
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            save_timeout_ms: default_save_timeout_ms(),
            min_media_payload: default_min_media_payload(),
            slash_trigger: default_slash_trigger(),
            table_rows: default_table_dim(),
            table_columns: default_table_dim(),
        }
    }
}

impl EditorConfig {
    /// Debounce interval as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Persistence timeout as a [`Duration`].
    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }

    /// Set the debounce interval.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the persistence timeout.
    pub fn with_save_timeout_ms(mut self, ms: u64) -> Self {
        self.save_timeout_ms = ms;
        self
    }

    /// Set the media integrity threshold.
    pub fn with_min_media_payload(mut self, len: usize) -> Self {
        self.min_media_payload = len;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(Error::config("debounce_ms must be greater than zero"));
        }
        if self.save_timeout_ms == 0 {
            return Err(Error::config("save_timeout_ms must be greater than zero"));
        }
        if self.table_rows == 0 || self.table_columns == 0 {
            return Err(Error::config("table dimensions must be at least 1x1"));
        }
        if self.slash_trigger.is_whitespace() {
            return Err(Error::config("slash_trigger cannot be whitespace"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(2000));
        assert_eq!(config.save_timeout(), Duration::from_secs(10));
        assert_eq!(config.min_media_payload, 50);
        assert_eq!(config.slash_trigger, '/');
        assert_eq!((config.table_rows, config.table_columns), (3, 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize() {
        let config: EditorConfig = serde_json::from_str(r#"{"debounce_ms": 500}"#).unwrap();
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.save_timeout_ms, 10_000);
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(EditorConfig::default().with_debounce_ms(0).validate().is_err());
        assert!(
            EditorConfig::default()
                .with_save_timeout_ms(0)
                .validate()
                .is_err()
        );
        let mut config = EditorConfig::default();
        config.table_columns = 0;
        assert!(config.validate().is_err());
        config = EditorConfig::default();
        config.slash_trigger = ' ';
        assert!(config.validate().is_err());
    }
}
