//! `secrets.yml`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Candidate file names, first match wins
const SECRETS_FILES: [&str; 2] = ["secrets.yml", "secrets.yaml"];

/// Values available to `!secret key`
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
    path: PathBuf,
}

impl Secrets {
    /// Read the secrets next to the configuration documents; none is fine
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let Some(path) = SECRETS_FILES
            .iter()
            .map(|name| config_dir.join(name))
            .find(|p| p.is_file())
        else {
            debug!(dir = %config_dir.display(), "No secrets file");
            return Ok(Self {
                values: HashMap::new(),
                path: config_dir.join(SECRETS_FILES[0]),
            });
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        let raw: Option<HashMap<String, serde_yaml::Value>> = if content.trim().is_empty() {
            None
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
                path: path.clone(),
                source,
            })?
        };

        let values: HashMap<String, String> = raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| scalar_text(&value).map(|text| (key, text)))
            .collect();

        debug!(path = %path.display(), count = values.len(), "Loaded secrets");
        Ok(Self { values, path })
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
                path: self.path.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Secrets are substituted as strings; nested values are not supported
fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}
