//! Endpoint construction from configuration

use automato_core::{Clock, Command, Endpoint, StateCache, StateSource};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::command::{HttpCommand, NotifyCommand, WakeOnLanCommand};
use crate::config::{CommandConfig, CommandKind, EndpointConfig, StateConfig, StateKind};
use crate::error::{PluginError, PluginResult};
use crate::state::{HttpJsonState, LinuxLoadState, LinuxMemoryState, UserSessionState};
use crate::transport::{HttpTransport, ShellTransport, TransportHandle};

/// Build an endpoint
///
/// A transport that cannot be created fails the whole endpoint. A state or
/// command whose transport is missing or of the wrong kind is logged and
/// left out.
pub fn build_endpoint(
    name: &str,
    config: &EndpointConfig,
    clock: Arc<dyn Clock>,
) -> PluginResult<Endpoint> {
    let mut transports = IndexMap::new();
    for (transport_name, transport_config) in &config.transports {
        let handle = TransportHandle::build(transport_name, transport_config)?;
        transports.insert(transport_name.clone(), handle);
    }

    let mut builder = Endpoint::builder(name).info(config.info.clone());
    for (transport_name, handle) in &transports {
        builder = builder.transport(transport_name.clone(), handle.as_transport());
    }

    let ctx = Transports {
        endpoint: name,
        handles: &transports,
    };

    for (state_name, state_config) in &config.states {
        match build_state(&ctx, state_name, state_config) {
            Ok(source) => {
                let mut cache =
                    StateCache::new(state_name.clone(), source, state_config.ttl, clock.clone());
                if let Some(timeout) = state_config.timeout {
                    cache = cache.with_timeout(Duration::from_secs(timeout));
                }
                builder = builder.state(cache);
            }
            Err(e) => error!(endpoint = name, state = %state_name, error = %e, "Skipping state"),
        }
    }

    for (command_name, command_config) in &config.commands {
        match build_command(&ctx, command_name, command_config, config) {
            Ok(command) => builder = builder.command(command_name.clone(), command),
            Err(e) => {
                error!(endpoint = name, command = %command_name, error = %e, "Skipping command")
            }
        }
    }

    let endpoint = builder.build();
    debug!(endpoint = ?endpoint, "Endpoint built");
    Ok(endpoint)
}

/// Transport lookup scoped to one endpoint
struct Transports<'a> {
    endpoint: &'a str,
    handles: &'a IndexMap<String, TransportHandle>,
}

impl Transports<'_> {
    fn lookup(&self, item: &str, transport: Option<&str>) -> PluginResult<&TransportHandle> {
        let item = format!("{}.{}", self.endpoint, item);
        let transport =
            transport.ok_or_else(|| PluginError::MissingTransport { item: item.clone() })?;

        self.handles
            .get(transport)
            .ok_or_else(|| PluginError::UnknownTransport {
                item,
                transport: transport.to_string(),
            })
    }

    fn capability_error(
        &self,
        item: &str,
        transport: Option<&str>,
        expected: &'static str,
        found: &TransportHandle,
    ) -> PluginError {
        PluginError::Capability {
            item: format!("{}.{}", self.endpoint, item),
            transport: transport.unwrap_or_default().to_string(),
            expected,
            found: found.kind(),
        }
    }

    fn shell(&self, item: &str, transport: Option<&str>) -> PluginResult<Arc<ShellTransport>> {
        let handle = self.lookup(item, transport)?;
        handle
            .as_shell()
            .ok_or_else(|| self.capability_error(item, transport, "shell", handle))
    }

    fn http(&self, item: &str, transport: Option<&str>) -> PluginResult<Arc<HttpTransport>> {
        let handle = self.lookup(item, transport)?;
        handle
            .as_http()
            .ok_or_else(|| self.capability_error(item, transport, "http", handle))
    }
}

fn build_state(
    ctx: &Transports<'_>,
    name: &str,
    config: &StateConfig,
) -> PluginResult<Box<dyn StateSource>> {
    let transport = config.transport.as_deref();
    let source: Box<dyn StateSource> = match config.kind {
        StateKind::LinuxMemory => Box::new(LinuxMemoryState::new(ctx.shell(name, transport)?)),
        StateKind::LinuxLoad => Box::new(LinuxLoadState::new(ctx.shell(name, transport)?)),
        StateKind::UserSessions => Box::new(UserSessionState::new(ctx.shell(name, transport)?)),
        StateKind::HttpJson(ref c) => {
            Box::new(HttpJsonState::new(ctx.http(name, transport)?, c.clone()))
        }
    };

    debug!(endpoint = ctx.endpoint, state = name, kind = config.kind.name(), "State configured");
    Ok(source)
}

fn build_command(
    ctx: &Transports<'_>,
    name: &str,
    config: &CommandConfig,
    endpoint: &EndpointConfig,
) -> PluginResult<Box<dyn Command>> {
    let transport = config.transport.as_deref();
    let command: Box<dyn Command> = match config.kind {
        CommandKind::Notify => Box::new(NotifyCommand::new(ctx.shell(name, transport)?)),
        CommandKind::Http => Box::new(HttpCommand::new(ctx.http(name, transport)?)),
        CommandKind::WakeOnLan(ref c) => {
            let mac = c
                .mac
                .clone()
                .or_else(|| {
                    endpoint
                        .info
                        .get("mac")
                        .and_then(|v| v.as_str())
                        .map(String::from)
                })
                .ok_or_else(|| PluginError::InvalidConfig {
                    item: format!("{}.{}", ctx.endpoint, name),
                    reason: "no MAC address in command or endpoint info".to_string(),
                })?;
            Box::new(WakeOnLanCommand::new(mac, c.broadcast.clone()))
        }
    };

    debug!(endpoint = ctx.endpoint, command = name, kind = config.kind.name(), "Command configured");
    Ok(command)
}
