//! Configuration loading for automato
//!
//! A configuration directory holds `endpoints.yml`, `triggers.yml` and
//! `actions.yml`, plus an optional `secrets.yml`. Files may use these tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_named dir` - Include all YAML files as a mapping
//! - `!include_dir_merge_named dir` - Merge mappings from all YAML files
//! - `!secret key` - Substitute from secrets.yml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use automato_config::load_documents;
//!
//! let docs = load_documents("/etc/automato")?;
//! for (name, endpoint) in &docs.endpoints { /* ... */ }
//! ```

mod documents;
mod error;
mod loader;
mod secrets;

pub use documents::{load_documents, Documents, ACTIONS_FILE, ENDPOINTS_FILE, TRIGGERS_FILE};
pub use error::{ConfigError, ConfigResult};
pub use loader::YamlLoader;
pub use secrets::Secrets;
