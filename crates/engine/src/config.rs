//! Database configuration via `pvdatabase.toml`
//!
//! A config file carries the defaults applied to records the database
//! creates: the trace level and the name of the field bound as the record's
//! time stamp.

use crate::error::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name conventionally placed next to the IOC's startup files.
pub const CONFIG_FILE_NAME: &str = "pvdatabase.toml";

/// Default name of the time stamp field
pub const DEFAULT_TIME_STAMP_FIELD: &str = "timeStamp";

/// Database configuration loaded from `pvdatabase.toml`.
///
/// # Example
///
/// ```toml
/// # 0 = quiet, 1 = teardown, 2 = subscriptions, 3 = locking/process
/// trace_level = 0
/// time_stamp_field = "timeStamp"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Trace level given to new records.
    #[serde(default)]
    pub trace_level: u8,
    /// Field bound as the time stamp updated by `process`.
    /// An empty string disables the binding.
    #[serde(default = "default_time_stamp_field")]
    pub time_stamp_field: String,
}

fn default_time_stamp_field() -> String {
    DEFAULT_TIME_STAMP_FIELD.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            trace_level: 0,
            time_stamp_field: default_time_stamp_field(),
        }
    }
}

impl DatabaseConfig {
    /// Per-record options derived from this config
    pub fn record_options(&self) -> RecordOptions {
        RecordOptions {
            trace_level: self.trace_level,
            time_stamp_field: if self.time_stamp_field.is_empty() {
                None
            } else {
                Some(self.time_stamp_field.clone())
            },
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# pvdatabase configuration
#
# Trace level for new records:
#   0 = quiet
#   1 = teardown
#   2 = listener and client registration
#   3 = locking, process and group put
trace_level = 0

# Field updated with the current time on every process.
# Set to "" to disable.
time_stamp_field = "timeStamp"
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Config`] if the text is not valid config TOML.
    pub fn from_toml_str(content: &str) -> RecordResult<Self> {
        toml::from_str(content)
            .map_err(|e| RecordError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> RecordResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecordError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            RecordError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> RecordResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RecordError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            RecordError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Options consumed when creating one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
    /// Initial trace level
    pub trace_level: u8,
    /// Field to bind as the time stamp, if any
    pub time_stamp_field: Option<String>,
}

impl Default for RecordOptions {
    fn default() -> Self {
        DatabaseConfig::default().record_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_quiet() {
        let config = DatabaseConfig::default();
        assert_eq!(config.trace_level, 0);
        assert_eq!(config.time_stamp_field, "timeStamp");
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config = DatabaseConfig::from_toml_str(DatabaseConfig::default_toml()).unwrap();
        assert_eq!(config, DatabaseConfig::default());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = DatabaseConfig::from_toml_str("trace_level = 2").unwrap();
        assert_eq!(config.trace_level, 2);
        assert_eq!(config.time_stamp_field, "timeStamp");
    }

    #[test]
    fn empty_time_stamp_field_disables_binding() {
        let config = DatabaseConfig::from_toml_str("time_stamp_field = \"\"").unwrap();
        assert_eq!(config.record_options().time_stamp_field, None);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let err = DatabaseConfig::from_toml_str("trace_level = \"loud\"").unwrap_err();
        assert!(matches!(err, RecordError::Config(_)));
    }

    #[test]
    fn write_then_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = DatabaseConfig {
            trace_level: 3,
            time_stamp_field: "ts".to_string(),
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(DatabaseConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_returns_error() {
        let dir = TempDir::new().unwrap();
        let err = DatabaseConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
