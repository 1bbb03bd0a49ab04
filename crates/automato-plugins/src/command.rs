//! Commands

use async_trait::async_trait;
use automato_core::{Command, CommandError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::transport::{quote, HttpRequest, HttpTransport, ShellTransport};

fn parse_args<T: for<'de> Deserialize<'de>>(args: &Value) -> Result<T, CommandError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| CommandError::InvalidArgs(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct NotifyArgs {
    msg: String,
}

/// `type: notify`
#[derive(Debug)]
pub struct NotifyCommand {
    transport: Arc<ShellTransport>,
}

impl NotifyCommand {
    pub fn new(transport: Arc<ShellTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Command for NotifyCommand {
    async fn execute(&self, args: &Value) -> Result<(), CommandError> {
        let args: NotifyArgs = parse_args(args)?;
        self.transport
            .exec_checked(&format!("notify-send {}", quote(&args.msg)))
            .await?;
        Ok(())
    }
}

/// `type: http`; the step arguments describe the request
#[derive(Debug)]
pub struct HttpCommand {
    transport: Arc<HttpTransport>,
}

impl HttpCommand {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Command for HttpCommand {
    async fn execute(&self, args: &Value) -> Result<(), CommandError> {
        let request: HttpRequest = parse_args(args)?;
        let response = self.transport.request(&request).await?;

        if !response.is_success() {
            return Err(CommandError::Failed(format!(
                "{} {} returned status {}",
                request.method, request.path, response.status
            )));
        }

        debug!(path = %request.path, status = response.status, "HTTP command done");
        Ok(())
    }
}

fn default_broadcast() -> String {
    "255.255.255.255:7".to_string()
}

/// `type: wake_on_lan`
#[derive(Debug, Clone, Deserialize)]
pub struct WakeOnLanConfig {
    /// Overrides the endpoint's `info.mac`
    #[serde(default)]
    pub mac: Option<String>,

    #[serde(default = "default_broadcast")]
    pub broadcast: String,
}

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated)
pub fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return None;
    }

    let mut bytes = [0u8; 6];
    for (byte, part) in bytes.iter_mut().zip(parts) {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    Some(bytes)
}

/// Six `0xFF` bytes followed by the MAC sixteen times
pub fn magic_packet(mac: [u8; 6]) -> Vec<u8> {
    let mut packet = vec![0xFF; 6];
    for _ in 0..16 {
        packet.extend_from_slice(&mac);
    }
    packet
}

#[derive(Debug)]
pub struct WakeOnLanCommand {
    mac: String,
    broadcast: String,
}

impl WakeOnLanCommand {
    pub fn new(mac: impl Into<String>, broadcast: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            broadcast: broadcast.into(),
        }
    }
}

#[async_trait]
impl Command for WakeOnLanCommand {
    async fn execute(&self, _args: &Value) -> Result<(), CommandError> {
        let mac = parse_mac(&self.mac)
            .ok_or_else(|| CommandError::Failed(format!("malformed MAC address '{}'", self.mac)))?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| CommandError::Failed(e.to_string()))?;
        socket
            .send_to(&magic_packet(mac), self.broadcast.as_str())
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))?;

        debug!(mac = %self.mac, broadcast = %self.broadcast, "Sent magic packet");
        Ok(())
    }
}
