//! Error types for state lookup and command dispatch

use std::time::Duration;
use thiserror::Error;

/// Result type for state lookups
pub type StateResult<T> = Result<T, StateError>;

/// A name that does not resolve to anything configured
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("endpoint not found: {0}")]
    Endpoint(String),

    #[error("state '{state}' not found on endpoint '{endpoint}'")]
    State { endpoint: String, state: String },

    #[error("key '{key}' not found in state '{state}'")]
    Key { state: String, key: String },

    #[error("command '{command}' not found on endpoint '{endpoint}'")]
    Command { endpoint: String, command: String },

    #[error("trigger not found: {0}")]
    Trigger(String),

    #[error("action '{action}' is not registered with trigger '{trigger}'")]
    Action { trigger: String, action: String },

    #[error("malformed reference '{0}'")]
    Malformed(String),
}

/// Failure talking to a remote target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request returned status {0}")]
    Status(u16),

    #[error("remote command exited with {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("transport misconfigured: {0}")]
    Config(String),
}

/// Failure to collect fresh data from a state source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("collection timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected data: {0}")]
    InvalidData(String),
}

/// Error from a state lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// Failure while running a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("invalid command arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("command failed: {0}")]
    Failed(String),
}
