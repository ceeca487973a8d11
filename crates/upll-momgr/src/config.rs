//! Engine configuration.
//!
//! The configuration is read once at startup from a YAML or JSON file, the
//! format being picked by the file extension. Every field has a default, so
//! an empty document is a valid configuration.

use crate::capability::StaticCapabilityTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default values for engine configuration.
pub mod defaults {
    /// Upper bound on the records returned by one sibling read.
    pub const MAX_REP_COUNT: u32 = 10_000;

    /// Service name stamped on every southbound request.
    pub const DRIVER_SERVICE_NAME: &str = "upll-driver";

    /// Service version stamped on every southbound request.
    pub const DRIVER_SERVICE_VERSION: u32 = 0;

    /// Number of controller lanes dispatched concurrently.
    pub const DISPATCH_CONCURRENCY: usize = 4;
}

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_rep_count: u32,
    pub driver_service_name: String,
    pub driver_service_version: u32,
    pub dispatch_concurrency: usize,
    pub capabilities: Option<StaticCapabilityTable>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rep_count: defaults::MAX_REP_COUNT,
            driver_service_name: defaults::DRIVER_SERVICE_NAME.to_string(),
            driver_service_version: defaults::DRIVER_SERVICE_VERSION,
            dispatch_concurrency: defaults::DISPATCH_CONCURRENCY,
            capabilities: None,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty YAML document deserializes as unit, not as a map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rep_count == 0 {
            return Err(ConfigError::Invalid {
                field: "max_rep_count",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.dispatch_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch_concurrency",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.driver_service_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "driver_service_name",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityIndex;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use upll_types::KeyType;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_rep_count, defaults::MAX_REP_COUNT);
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let yaml = "max_rep_count: 50\n\
                    dispatch_concurrency: 2\n\
                    capabilities:\n  c1:\n    VTN:\n      create:\n        attrs: [true]\n";
        write!(file, "{}", yaml).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_rep_count, 50);
        assert_eq!(config.dispatch_concurrency, 2);
        assert_eq!(config.driver_service_name, defaults::DRIVER_SERVICE_NAME);
        let caps = config.capabilities.unwrap();
        assert!(caps.get_create_capability("c1", KeyType::Vtn).is_some());
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"driver_service_name": "drv", "driver_service_version": 3}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.driver_service_name, "drv");
        assert_eq!(config.driver_service_version, 3);
    }

    #[test]
    fn test_invalid_values() {
        let err = EngineConfig::from_yaml_str("max_rep_count: 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_rep_count",
                ..
            }
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
