//! Capability traits implemented by plugins
//!
//! The core only ever talks to remote targets through these traits. Concrete
//! transports, state sources and commands live in `automato-plugins`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{CollectionError, CommandError, TransportError};

/// Facts produced by one collection, keyed by name
pub type StateMap = HashMap<String, Value>;

/// Pull-based producer of facts for one state domain of one endpoint
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Collect a fresh mapping from the remote target
    async fn collect(&self) -> Result<StateMap, CollectionError>;

    /// Value reported for a key missing from a successful collection
    ///
    /// Returning `None` makes the lookup an unknown-reference error.
    fn missing_key(&self, _key: &str) -> Option<Value> {
        None
    }
}

/// Side-effecting operation on an endpoint
#[async_trait]
pub trait Command: Send + Sync {
    /// Run the command with the arguments from an action pipeline step
    async fn execute(&self, args: &Value) -> Result<(), CommandError>;
}

/// Connection to a remote target, shared by states and commands
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short capability tag, e.g. "http" or "shell"
    fn kind(&self) -> &'static str;

    /// Verify the target is reachable
    async fn check(&self) -> Result<(), TransportError>;
}
