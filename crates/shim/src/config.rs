//! Runtime Configuration
//!
//! Settings of the `shim` binary, read from an optional `shim.toml`.
//! Command-line flags take precedence over the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shim_types::SchemaVersion;

use crate::error::{Result, ShimError};

/// Default location of the configuration file
pub const CONFIG_FILE: &str = "shim.toml";

/// Binary configuration (shim.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShimConfig {
    /// Schema version `migrate` converts to
    #[serde(default = "default_target_version")]
    pub target_version: u32,

    /// Where `migrate` writes its result
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Tracing filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_target_version() -> u32 {
    2
}

fn default_output() -> PathBuf {
    PathBuf::from("cfg/output.toml")
}

fn default_log_filter() -> String {
    "shim=info".to_string()
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            target_version: default_target_version(),
            output: default_output(),
            log_filter: default_log_filter(),
        }
    }
}

impl ShimConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ShimError::Config(e.to_string()))
    }

    /// Load the file at `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn target_version(&self) -> SchemaVersion {
        SchemaVersion(self.target_version)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = ShimConfig::from_toml("output = \"out/x.json\"").unwrap();
        assert_eq!(config.output, PathBuf::from("out/x.json"));
        assert_eq!(config.target_version(), SchemaVersion::V2);
        assert_eq!(config.log_filter, "shim=info");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ShimConfig::load(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, ShimConfig::default());
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let err = ShimConfig::from_toml("target_version = \"two\"").unwrap_err();
        assert!(matches!(err, ShimError::Config(_)));
    }
}
