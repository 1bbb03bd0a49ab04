//! Transports
//!
//! A transport is created once per endpoint entry and shared by every state
//! and command that names it.

mod http;
mod shell;

pub use http::{HttpRequest, HttpResponse, HttpTransport, HttpTransportConfig};
pub use shell::{quote, ShellOutput, ShellTransport, ShellTransportConfig};

use automato_core::Transport;
use std::sync::Arc;

use crate::config::TransportConfig;
use crate::error::{PluginError, PluginResult};

/// A constructed transport, kept concrete so plugins can ask for a capability
#[derive(Debug, Clone)]
pub enum TransportHandle {
    Http(Arc<HttpTransport>),
    Shell(Arc<ShellTransport>),
}

impl TransportHandle {
    /// Construct the transport described by `config`
    pub fn build(name: &str, config: &TransportConfig) -> PluginResult<Self> {
        match config {
            TransportConfig::Http(c) => HttpTransport::new(c.clone())
                .map(|t| TransportHandle::Http(Arc::new(t)))
                .map_err(|source| PluginError::Transport {
                    name: name.to_string(),
                    source,
                }),
            TransportConfig::Shell(c) => Ok(TransportHandle::Shell(Arc::new(ShellTransport::new(
                c.clone(),
            )))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransportHandle::Http(_) => "http",
            TransportHandle::Shell(_) => "shell",
        }
    }

    pub fn as_http(&self) -> Option<Arc<HttpTransport>> {
        match self {
            TransportHandle::Http(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn as_shell(&self) -> Option<Arc<ShellTransport>> {
        match self {
            TransportHandle::Shell(t) => Some(t.clone()),
            _ => None,
        }
    }

    /// Type-erased view for the endpoint's transport checks
    pub fn as_transport(&self) -> Arc<dyn Transport> {
        match self {
            TransportHandle::Http(t) => t.clone(),
            TransportHandle::Shell(t) => t.clone(),
        }
    }
}
