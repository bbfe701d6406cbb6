//! Common error types for taglog components.

use std::fmt;

/// A specialized Result type for taglog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for taglog operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::config("missing file").to_string(),
            "Configuration error: missing file"
        );

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).to_string(), "IO error: gone");
    }

    #[test]
    fn test_yaml_conversion() {
        let err = serde_yaml::from_str::<Vec<u32>>("{ nope").unwrap_err();
        assert!(matches!(Error::from(err), Error::Yaml(_)));
    }
}
