//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("secret '{key}' not found in {path}")]
    SecretNotFound { key: String, path: PathBuf },

    #[error("invalid {tag} in {path}: {reason}")]
    InvalidTag {
        tag: String,
        path: PathBuf,
        reason: String,
    },

    #[error("unknown tag {tag} in {path}")]
    UnknownTag { tag: String, path: PathBuf },

    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("circular include: {}", display_chain(.chain))]
    CircularInclude { chain: Vec<PathBuf> },

    #[error("environment variable '{var}' not set")]
    EnvVarNotFound { var: String },

    #[error("{path} must be a mapping of names to entries")]
    NotAMapping { path: PathBuf },
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
