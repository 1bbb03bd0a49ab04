//! Read-only endpoint lookup
//!
//! Triggers and actions receive an [`EndpointRegistry`] at construction. It is
//! cheap to clone and never changes after startup.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::endpoint::Endpoint;
use crate::error::{ReferenceError, StateResult};
use crate::PATH_SEPARATOR;

/// All endpoints by name
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Arc<IndexMap<String, Arc<Endpoint>>>,
}

impl EndpointRegistry {
    /// Build the registry; a later endpoint replaces an earlier one of the same name
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|e| (e.name().to_string(), Arc::new(e)))
            .collect();

        Self {
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.endpoints.values()
    }

    /// Resolve `<endpoint>.<state>.<key>`
    pub async fn resolve_state(&self, variable: &str) -> StateResult<Value> {
        let Some((endpoint, path)) = variable.split_once(PATH_SEPARATOR) else {
            return Err(ReferenceError::Malformed(variable.to_string()).into());
        };

        let endpoint = self
            .endpoints
            .get(endpoint)
            .ok_or_else(|| ReferenceError::Endpoint(endpoint.to_string()))?;

        endpoint.get_state(path).await
    }

    /// Run `<endpoint>.<command>`; unresolved addresses are logged and skipped
    pub async fn execute_command(&self, address: &str, args: &Value) {
        let Some((endpoint, command)) = address.split_once(PATH_SEPARATOR) else {
            error!(address, "{}", ReferenceError::Malformed(address.to_string()));
            return;
        };

        match self.endpoints.get(endpoint) {
            Some(endpoint) => endpoint.execute_command(command, args).await,
            None => {
                error!(address, "{}", ReferenceError::Endpoint(endpoint.to_string()));
            }
        }
    }

    /// Check the transports of every endpoint
    pub async fn check_transports(&self) {
        for endpoint in self.endpoints.values() {
            endpoint.check_transports().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StateCache;
    use crate::clock::MockClock;
    use crate::error::StateError;
    use crate::testing::{state_map, RecordingCommand, ScriptedSource};
    use serde_json::json;

    fn make_registry(notify: &RecordingCommand) -> EndpointRegistry {
        let clock = Arc::new(MockClock::new());
        let source = ScriptedSource::returning(state_map([("bob", 1)]));
        let host1 = Endpoint::builder("host1")
            .state(StateCache::new("user", Box::new(source), 30, clock))
            .command("notify", Box::new(notify.clone()))
            .build();

        EndpointRegistry::new([host1])
    }

    #[tokio::test]
    async fn test_resolve_state() {
        let registry = make_registry(&RecordingCommand::new());

        assert_eq!(registry.resolve_state("host1.user.bob").await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_resolve_unknown_endpoint() {
        let registry = make_registry(&RecordingCommand::new());

        let err = registry.resolve_state("host2.user.bob").await.unwrap_err();
        assert_eq!(
            err,
            StateError::Reference(ReferenceError::Endpoint("host2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_execute_command_address() {
        let notify = RecordingCommand::new();
        let registry = make_registry(&notify);

        registry.execute_command("host2.notify", &json!({})).await;
        registry.execute_command("nodots", &json!({})).await;
        registry
            .execute_command("host1.notify", &json!({"msg": "x"}))
            .await;

        assert_eq!(notify.calls(), vec![json!({"msg": "x"})]);
    }
}
