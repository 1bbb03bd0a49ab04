//! YAML loading with custom tags
//!
//! | Tag                              | Result                                        |
//! |----------------------------------|-----------------------------------------------|
//! | `!include file.yml`              | contents of the file                          |
//! | `!include_dir_named dir`         | `{file stem: contents}` for every YAML file   |
//! | `!include_dir_merge_named dir`   | union of the mappings of every YAML file      |
//! | `!secret key`                    | value from `secrets.yml`                      |
//! | `!env_var NAME [default]`        | environment variable, or the default          |
//!
//! Paths are relative to the file containing the tag.

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;

enum Tag {
    Include,
    IncludeDirNamed,
    IncludeDirMergeNamed,
    Secret,
    EnvVar,
}

impl Tag {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "!include" => Some(Tag::Include),
            "!include_dir_named" => Some(Tag::IncludeDirNamed),
            "!include_dir_merge_named" => Some(Tag::IncludeDirMergeNamed),
            "!secret" => Some(Tag::Secret),
            "!env_var" => Some(Tag::EnvVar),
            _ => None,
        }
    }
}

/// Loads YAML files below a configuration directory
#[derive(Debug)]
pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, outermost first
    stack: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            stack: Vec::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load a file; relative paths are taken from the configuration directory
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.config_dir.join(path);

        if self.stack.contains(&path) {
            let mut chain = self.stack.clone();
            chain.push(path);
            return Err(ConfigError::CircularInclude { chain });
        }

        debug!(path = %path.display(), "Loading YAML");
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        self.stack.push(path.clone());
        let result = self.load_str(&content, &path);
        self.stack.pop();
        result
    }

    /// Parse and resolve YAML text as if it were read from `origin`
    pub fn load_str(&mut self, content: &str, origin: &Path) -> ConfigResult<Value> {
        if content.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value = serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
            path: origin.to_path_buf(),
            source,
        })?;

        self.resolve(value, origin)
    }

    fn resolve(&mut self, value: Value, origin: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.resolve_tag(*tagged, origin),
            Value::Mapping(map) => map
                .into_iter()
                .map(|(k, v)| Ok((k, self.resolve(v, origin)?)))
                .collect::<ConfigResult<Mapping>>()
                .map(Value::Mapping),
            Value::Sequence(items) => items
                .into_iter()
                .map(|v| self.resolve(v, origin))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            scalar => Ok(scalar),
        }
    }

    fn resolve_tag(&mut self, tagged: TaggedValue, origin: &Path) -> ConfigResult<Value> {
        let name = tagged.tag.to_string();
        trace!(tag = %name, "Resolving tag");

        let Some(tag) = Tag::parse(&name) else {
            return Err(ConfigError::UnknownTag {
                tag: name,
                path: origin.to_path_buf(),
            });
        };

        let argument = match tagged.value {
            Value::String(s) => s,
            other => {
                return Err(ConfigError::InvalidTag {
                    tag: name,
                    path: origin.to_path_buf(),
                    reason: format!("expected a string argument, got {:?}", other),
                })
            }
        };

        match tag {
            Tag::Include => {
                let target = relative_to(origin, &argument);
                self.load_file(target)
            }
            Tag::IncludeDirNamed => {
                let mut result = Mapping::new();
                for file in yaml_files(&relative_to(origin, &argument))? {
                    let stem = file
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    result.insert(Value::String(stem), self.load_file(&file)?);
                }
                Ok(Value::Mapping(result))
            }
            Tag::IncludeDirMergeNamed => {
                let mut result = Mapping::new();
                for file in yaml_files(&relative_to(origin, &argument))? {
                    match self.load_file(&file)? {
                        Value::Mapping(map) => result.extend(map),
                        Value::Null => {}
                        _ => return Err(ConfigError::NotAMapping { path: file }),
                    }
                }
                Ok(Value::Mapping(result))
            }
            Tag::Secret => Ok(Value::String(self.secrets.get(&argument)?.to_string())),
            Tag::EnvVar => {
                let (var, default) = match argument.split_once(char::is_whitespace) {
                    Some((var, default)) => (var, Some(default.trim())),
                    None => (argument.as_str(), None),
                };

                match (std::env::var(var), default) {
                    (Ok(value), _) => Ok(Value::String(value)),
                    (Err(_), Some(default)) => Ok(Value::String(default.to_string())),
                    (Err(_), None) => Err(ConfigError::EnvVarNotFound {
                        var: var.to_string(),
                    }),
                }
            }
        }
    }
}

fn relative_to(origin: &Path, target: &str) -> PathBuf {
    origin
        .parent()
        .map(|dir| dir.join(target))
        .unwrap_or_else(|| PathBuf::from(target))
}

/// `*.yml` and `*.yaml` files of a directory, sorted by name
fn yaml_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|source| ConfigError::ReadFile {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yml" | "yaml")
                )
        })
        .collect();

    files.sort();
    Ok(files)
}
