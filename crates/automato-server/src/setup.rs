//! Building the runtime objects from configuration documents
//!
//! Every endpoint and action is built on its own; one that fails is logged and
//! left out without affecting the others.

use automato_automation::{Action, Trigger, TriggerRegistry};
use automato_config::Documents;
use automato_core::{Clock, EndpointRegistry};
use automato_plugins::build_endpoint;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Endpoints, triggers and actions ready to run
pub struct Engine {
    pub endpoints: EndpointRegistry,
    pub triggers: TriggerRegistry,
    /// In configuration order
    pub actions: Vec<Action>,
}

impl Engine {
    pub fn build(documents: &Documents, clock: Arc<dyn Clock>) -> Self {
        let endpoints = EndpointRegistry::new(documents.endpoints.iter().filter_map(
            |(name, config)| match build_endpoint(name, config, clock.clone()) {
                Ok(endpoint) => {
                    debug!(endpoint = %name, "Endpoint built");
                    Some(endpoint)
                }
                Err(e) => {
                    error!(endpoint = %name, error = %e, "Failed to build endpoint");
                    None
                }
            },
        ));

        let mut triggers = TriggerRegistry::new();
        for (name, config) in &documents.triggers {
            triggers.insert(Trigger::new(
                name.clone(),
                *config,
                endpoints.clone(),
                clock.clone(),
            ));
        }

        let mut actions = Vec::with_capacity(documents.actions.len());
        for (name, config) in &documents.actions {
            match Action::new(
                name.clone(),
                config,
                endpoints.clone(),
                &triggers,
                clock.clone(),
            ) {
                Ok(action) => actions.push(action),
                Err(e) => error!(action = %name, error = %e, "Failed to set up action"),
            }
        }

        info!(
            endpoints = endpoints.len(),
            triggers = triggers.len(),
            actions = actions.len(),
            "Setup complete"
        );

        Self {
            endpoints,
            triggers,
            actions,
        }
    }
}
