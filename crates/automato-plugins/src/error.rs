//! Errors raised while building endpoints from configuration

use automato_core::TransportError;
use thiserror::Error;

/// Result type for plugin construction
pub type PluginResult<T> = Result<T, PluginError>;

/// Plugin construction errors
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("'{item}' needs a transport but none is configured")]
    MissingTransport { item: String },

    #[error("'{item}' refers to unknown transport '{transport}'")]
    UnknownTransport { item: String, transport: String },

    #[error("'{item}' needs a {expected} transport, but '{transport}' is {found}")]
    Capability {
        item: String,
        transport: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("failed to set up transport '{name}': {source}")]
    Transport {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid configuration for '{item}': {reason}")]
    InvalidConfig { item: String, reason: String },
}
