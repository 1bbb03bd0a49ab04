//! The three configuration documents
//!
//! `endpoints.yml`, `triggers.yml` and `actions.yml` are name-keyed mappings.
//! Entries are decoded one at a time; an entry that fails to decode is logged
//! and skipped, the rest of the document still loads.

use automato_automation::{ActionConfig, TriggerConfig};
use automato_plugins::EndpointConfig;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::Path;
use tracing::{debug, error, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;

pub const ENDPOINTS_FILE: &str = "endpoints.yml";
pub const TRIGGERS_FILE: &str = "triggers.yml";
pub const ACTIONS_FILE: &str = "actions.yml";

/// Decoded configuration, in file order
#[derive(Debug, Default)]
pub struct Documents {
    pub endpoints: IndexMap<String, EndpointConfig>,
    pub triggers: IndexMap<String, TriggerConfig>,
    pub actions: IndexMap<String, ActionConfig>,
    /// `<file>: <entry>` for every entry that failed to decode
    pub skipped: Vec<String>,
}

/// Load all documents from `config_dir`; a missing document is empty
pub fn load_documents(config_dir: impl AsRef<Path>) -> ConfigResult<Documents> {
    let config_dir = config_dir.as_ref();
    if !config_dir.is_dir() {
        return Err(ConfigError::DirectoryNotFound {
            path: config_dir.to_path_buf(),
        });
    }

    let mut loader = YamlLoader::new(config_dir)?;
    let mut documents = Documents::default();

    documents.endpoints = load_entries(&mut loader, ENDPOINTS_FILE, &mut documents.skipped)?;
    documents.triggers = load_entries(&mut loader, TRIGGERS_FILE, &mut documents.skipped)?;
    documents.actions = load_entries(&mut loader, ACTIONS_FILE, &mut documents.skipped)?;

    debug!(
        endpoints = documents.endpoints.len(),
        triggers = documents.triggers.len(),
        actions = documents.actions.len(),
        skipped = documents.skipped.len(),
        "Configuration loaded"
    );

    Ok(documents)
}

fn load_entries<T: DeserializeOwned>(
    loader: &mut YamlLoader,
    file: &str,
    skipped: &mut Vec<String>,
) -> ConfigResult<IndexMap<String, T>> {
    let path = loader.config_dir().join(file);
    if !path.exists() {
        warn!(file, "Configuration file missing, treating as empty");
        return Ok(IndexMap::new());
    }

    let mapping = match loader.load_file(file)? {
        Value::Null => return Ok(IndexMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => return Err(ConfigError::NotAMapping { path }),
    };

    let mut entries = IndexMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = match key {
            Value::String(s) => s,
            other => {
                error!(file, key = ?other, "Entry name must be a string");
                skipped.push(format!("{}: {:?}", file, other));
                continue;
            }
        };

        match serde_yaml::from_value::<T>(value) {
            Ok(entry) => {
                entries.insert(name, entry);
            }
            Err(e) => {
                error!(file, entry = %name, error = %e, "Skipping invalid entry");
                skipped.push(format!("{}: {}", file, name));
            }
        }
    }

    Ok(entries)
}
