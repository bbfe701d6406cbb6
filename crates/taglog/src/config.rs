//! Configuration loading for the process-wide logger
//!
//! Nothing here is read implicitly: callers pick the file or string and pass
//! the result to [`crate::init_from_config`].

use common::{Result, Severity};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logger configuration
///
/// Neither field is validated: unknown levels fall back to info and an empty
/// tag is written as an empty string, the same as [`crate::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub level: String,
    pub tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Severity::Info.to_string(),
            tag: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Resolved threshold
    pub fn severity(&self) -> Severity {
        Severity::lenient(&self.level)
    }
}
