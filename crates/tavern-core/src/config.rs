//! Configuration loading and typed config structures for Tavern.
//!
//! The canonical configuration lives in `tavern-config.yaml` in the working
//! directory. Every field has a default, so a missing file, an empty file
//! or a partial file all produce a usable configuration.

use std::path::Path;

use serde::Deserialize;

/// Environment variable overriding [`LoggingConfig::level`].
pub const LOG_LEVEL_ENV: &str = "TAVERN_LOG_LEVEL";

/// Environment variable overriding [`HistoryConfig::capacity`].
pub const HISTORY_CAPACITY_ENV: &str = "TAVERN_HISTORY_CAPACITY";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TavernConfig {
    /// Undo/redo history settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TavernConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TAVERN_LOG_LEVEL` overrides `logging.level`
    /// - `TAVERN_HISTORY_CAPACITY` overrides `history.capacity`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as YAML null.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.logging.level = level;
        }
        if let Some(capacity) = lookup(HISTORY_CAPACITY_ENV).and_then(|v| v.parse().ok()) {
            self.history.capacity = capacity;
        }
    }
}

/// Undo/redo history settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of events retained. Must be at least 1.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,

    /// Number of events reported as "recent" in history statistics.
    #[serde(default = "default_recent_events")]
    pub recent_events: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            recent_events: default_recent_events(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter
    /// directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_history_capacity() -> usize {
    100
}

const fn default_recent_events() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TavernConfig::default();
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.history.recent_events, 10);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
history:
  capacity: 25
  recent_events: 5

logging:
  level: "debug"
  json: true
"#;
        let mut config: TavernConfig = serde_yml::from_str(yaml).unwrap_or_default();
        config.apply_overrides(|_| None);
        assert_eq!(config.history.capacity, 25);
        assert_eq!(config.history.recent_events, 5);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml_fills_defaults() {
        let yaml = "history:\n  capacity: 7\n";
        let config: TavernConfig = serde_yml::from_str(yaml).unwrap_or_default();
        assert_eq!(config.history.capacity, 7);
        assert_eq!(config.history.recent_events, 10);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        let config = TavernConfig::parse("   \n").ok();
        assert!(config.is_some());
        let config = config.unwrap_or_default();
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = TavernConfig::parse("history: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn overrides_replace_values() {
        let mut config = TavernConfig::default();
        config.apply_overrides(|key| match key {
            LOG_LEVEL_ENV => Some("trace".to_owned()),
            HISTORY_CAPACITY_ENV => Some("3".to_owned()),
            _ => None,
        });
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.history.capacity, 3);

        config.apply_overrides(|key| match key {
            HISTORY_CAPACITY_ENV => Some("lots".to_owned()),
            _ => None,
        });
        assert_eq!(config.history.capacity, 3);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("tavern-config.yaml");
        if path.exists() {
            let config = TavernConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
