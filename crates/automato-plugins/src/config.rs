//! Endpoint configuration
//!
//! One entry of `endpoints.yml`:
//!
//! ```yaml
//! host1:
//!   info: { mac: "aa:bb:cc:dd:ee:ff" }
//!   transports:
//!     ssh: { type: shell, host: host1.lan, user: monitor }
//!   states:
//!     mem: { type: linux_memory, transport: ssh, ttl: 60 }
//!   commands:
//!     notify: { type: notify, transport: ssh }
//!     wake: { type: wake_on_lan }
//! ```

use automato_core::DEFAULT_TTL_SECS;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::command::WakeOnLanConfig;
use crate::state::HttpJsonStateConfig;
use crate::transport::{HttpTransportConfig, ShellTransportConfig};

/// Configuration of one endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    /// Free-form information available to plugins
    #[serde(default)]
    pub info: serde_json::Map<String, Value>,

    #[serde(default)]
    pub transports: IndexMap<String, TransportConfig>,

    #[serde(default)]
    pub states: IndexMap<String, StateConfig>,

    #[serde(default)]
    pub commands: IndexMap<String, CommandConfig>,
}

/// Transport variants
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    Http(HttpTransportConfig),
    Shell(ShellTransportConfig),
}

/// A state source and its cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(flatten)]
    pub kind: StateKind,

    /// Name of the transport in the same endpoint
    #[serde(default)]
    pub transport: Option<String>,

    /// Seconds a collection stays fresh
    #[serde(default = "default_ttl")]
    pub ttl: u64,

    /// Upper bound in seconds for one collection
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

/// State source variants
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateKind {
    /// `/proc/meminfo` over a shell transport
    LinuxMemory,
    /// `/proc/loadavg` over a shell transport
    LinuxLoad,
    /// Session count per user from `who`
    UserSessions,
    /// JSON document fetched over HTTP
    HttpJson(HttpJsonStateConfig),
}

impl StateKind {
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::LinuxMemory => "linux_memory",
            StateKind::LinuxLoad => "linux_load",
            StateKind::UserSessions => "user_sessions",
            StateKind::HttpJson(_) => "http_json",
        }
    }
}

/// A command and the transport it runs over
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    #[serde(flatten)]
    pub kind: CommandKind,

    #[serde(default)]
    pub transport: Option<String>,
}

/// Command variants
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Desktop notification via `notify-send`
    Notify,
    /// HTTP request described by the step arguments
    Http,
    /// Wake-on-LAN magic packet
    WakeOnLan(WakeOnLanConfig),
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Notify => "notify",
            CommandKind::Http => "http",
            CommandKind::WakeOnLan(_) => "wake_on_lan",
        }
    }
}
