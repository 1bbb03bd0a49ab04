//! Endpoints
//!
//! An endpoint is one logical remote target. It owns named state caches,
//! named commands and the transports both run over. Endpoints are built once
//! at startup and never change shape afterwards.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::StateCache;
use crate::error::{ReferenceError, StateError, StateResult};
use crate::source::{Command, Transport};
use crate::PATH_SEPARATOR;

/// A logical remote target
pub struct Endpoint {
    name: String,
    info: serde_json::Map<String, Value>,
    transports: IndexMap<String, Arc<dyn Transport>>,
    states: IndexMap<String, StateCache>,
    commands: IndexMap<String, Box<dyn Command>>,
}

impl Endpoint {
    /// Start building an endpoint
    pub fn builder(name: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            endpoint: Endpoint {
                name: name.into(),
                info: serde_json::Map::new(),
                transports: IndexMap::new(),
                states: IndexMap::new(),
                commands: IndexMap::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form endpoint information (e.g. `mac`)
    pub fn info(&self) -> &serde_json::Map<String, Value> {
        &self.info
    }

    /// Get a state cache by name
    pub fn state(&self, name: &str) -> Option<&StateCache> {
        self.states.get(name)
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Look up `<state>.<key>`
    pub async fn get_state(&self, path: &str) -> StateResult<Value> {
        let Some((state, key)) = path.split_once(PATH_SEPARATOR) else {
            return Err(ReferenceError::Malformed(format!("{}.{}", self.name, path)).into());
        };

        let cache = self.states.get(state).ok_or_else(|| {
            StateError::Reference(ReferenceError::State {
                endpoint: self.name.clone(),
                state: state.to_string(),
            })
        })?;

        cache.get(key).await
    }

    /// Run a command; unknown names and failures are logged, never returned
    pub async fn execute_command(&self, name: &str, args: &Value) {
        let Some(command) = self.commands.get(name) else {
            let e = ReferenceError::Command {
                endpoint: self.name.clone(),
                command: name.to_string(),
            };
            error!(endpoint = %self.name, command = name, "{}", e);
            return;
        };

        debug!(endpoint = %self.name, command = name, "Executing command");
        if let Err(e) = command.execute(args).await {
            error!(endpoint = %self.name, command = name, error = %e, "Command failed");
        }
    }

    /// Check every transport once; failures are logged
    ///
    /// Returns the number of transports that passed.
    pub async fn check_transports(&self) -> usize {
        let mut passed = 0;
        for (name, transport) in &self.transports {
            match transport.check().await {
                Ok(()) => {
                    info!(endpoint = %self.name, transport = %name, kind = transport.kind(), "Transport ready");
                    passed += 1;
                }
                Err(e) => {
                    warn!(endpoint = %self.name, transport = %name, error = %e, "Transport check failed");
                }
            }
        }
        passed
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("transports", &self.transports.keys().collect::<Vec<_>>())
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Endpoint`]
pub struct EndpointBuilder {
    endpoint: Endpoint,
}

impl EndpointBuilder {
    pub fn info(mut self, info: serde_json::Map<String, Value>) -> Self {
        self.endpoint.info = info;
        self
    }

    pub fn transport(mut self, name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.endpoint.transports.insert(name.into(), transport);
        self
    }

    /// Add a state cache under its own name
    pub fn state(mut self, cache: StateCache) -> Self {
        self.endpoint
            .states
            .insert(cache.name().to_string(), cache);
        self
    }

    pub fn command(mut self, name: impl Into<String>, command: Box<dyn Command>) -> Self {
        self.endpoint.commands.insert(name.into(), command);
        self
    }

    pub fn build(self) -> Endpoint {
        self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::testing::{state_map, RecordingCommand, ScriptedSource};
    use serde_json::json;

    fn make_endpoint(notify: &RecordingCommand) -> Endpoint {
        let clock = Arc::new(MockClock::new());
        let source = ScriptedSource::returning(state_map([("Total", "1000")]));

        Endpoint::builder("host1")
            .state(StateCache::new("mem", Box::new(source), 30, clock))
            .command("notify", Box::new(notify.clone()))
            .command("broken", Box::new(RecordingCommand::failing()))
            .build()
    }

    #[tokio::test]
    async fn test_get_state_path() {
        let endpoint = make_endpoint(&RecordingCommand::new());

        assert_eq!(endpoint.get_state("mem.Total").await.unwrap(), json!("1000"));
    }

    #[tokio::test]
    async fn test_get_state_unknown_state() {
        let endpoint = make_endpoint(&RecordingCommand::new());

        let err = endpoint.get_state("cpu.Total").await.unwrap_err();
        assert_eq!(
            err,
            StateError::Reference(ReferenceError::State {
                endpoint: "host1".to_string(),
                state: "cpu".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_get_state_without_key() {
        let endpoint = make_endpoint(&RecordingCommand::new());

        let err = endpoint.get_state("mem").await.unwrap_err();
        assert!(matches!(
            err,
            StateError::Reference(ReferenceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_command() {
        let notify = RecordingCommand::new();
        let endpoint = make_endpoint(&notify);

        endpoint.execute_command("notify", &json!({"msg": "hi"})).await;
        assert_eq!(notify.calls(), vec![json!({"msg": "hi"})]);
    }

    #[tokio::test]
    async fn test_execute_unknown_or_failing_command_is_not_fatal() {
        let notify = RecordingCommand::new();
        let endpoint = make_endpoint(&notify);

        endpoint.execute_command("missing", &json!({})).await;
        endpoint.execute_command("broken", &json!({})).await;
        endpoint.execute_command("notify", &json!({})).await;
        assert_eq!(notify.count(), 1);
    }

    #[test]
    fn test_names() {
        let endpoint = make_endpoint(&RecordingCommand::new());

        assert_eq!(endpoint.name(), "host1");
        assert_eq!(endpoint.state_names().collect::<Vec<_>>(), vec!["mem"]);
        assert!(endpoint.has_command("notify"));
        assert!(!endpoint.has_command("wake"));
    }
}
