//! Linux host facts read over a shell transport

use async_trait::async_trait;
use automato_core::{CollectionError, StateMap, StateSource};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::transport::ShellTransport;

/// `/proc/meminfo` as raw strings, e.g. `MemTotal: "16318480"`
pub fn parse_meminfo(raw: &str) -> StateMap {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let key = parts.next()?.trim_end_matches(':');
            let value = parts.next()?;
            Some((key.to_string(), Value::String(value.to_string())))
        })
        .collect()
}

/// `/proc/loadavg` as keys `1`, `5` and `15`
pub fn parse_loadavg(raw: &str) -> Result<StateMap, CollectionError> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(CollectionError::InvalidData(format!(
            "unexpected loadavg: '{}'",
            raw.trim()
        )));
    }

    Ok(["1", "5", "15"]
        .into_iter()
        .zip(fields)
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect())
}

/// Sessions per user from the output of `who`
pub fn parse_who(raw: &str) -> StateMap {
    let mut sessions = StateMap::new();
    for user in raw.lines().filter_map(|l| l.split_whitespace().next()) {
        let count = sessions
            .get(user)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        sessions.insert(user.to_string(), Value::from(count + 1));
    }
    sessions
}

/// `type: linux_memory`
#[derive(Debug)]
pub struct LinuxMemoryState {
    transport: Arc<ShellTransport>,
}

impl LinuxMemoryState {
    pub fn new(transport: Arc<ShellTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StateSource for LinuxMemoryState {
    async fn collect(&self) -> Result<StateMap, CollectionError> {
        let raw = self.transport.read_file("/proc/meminfo").await?;
        let data = parse_meminfo(&raw);
        debug!(keys = data.len(), "Collected memory info");
        Ok(data)
    }
}

/// `type: linux_load`
#[derive(Debug)]
pub struct LinuxLoadState {
    transport: Arc<ShellTransport>,
}

impl LinuxLoadState {
    pub fn new(transport: Arc<ShellTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StateSource for LinuxLoadState {
    async fn collect(&self) -> Result<StateMap, CollectionError> {
        let raw = self.transport.read_file("/proc/loadavg").await?;
        parse_loadavg(&raw)
    }
}

/// `type: user_sessions`; users without a session read as 0
#[derive(Debug)]
pub struct UserSessionState {
    transport: Arc<ShellTransport>,
}

impl UserSessionState {
    pub fn new(transport: Arc<ShellTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StateSource for UserSessionState {
    async fn collect(&self) -> Result<StateMap, CollectionError> {
        let raw = self.transport.exec_checked("who").await?;
        let data = parse_who(&raw);
        debug!(users = data.len(), "Collected user sessions");
        Ok(data)
    }

    fn missing_key(&self, _key: &str) -> Option<Value> {
        Some(Value::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_meminfo() {
        let raw = "MemTotal:       16318480 kB\nMemFree:         1020304 kB\nHugePages_Total:       0\n";

        let data = parse_meminfo(raw);
        assert_eq!(data["MemTotal"], json!("16318480"));
        assert_eq!(data["MemFree"], json!("1020304"));
        assert_eq!(data["HugePages_Total"], json!("0"));
    }

    #[test]
    fn test_parse_loadavg() {
        let data = parse_loadavg("0.52 0.58 0.59 1/467 12345\n").unwrap();
        assert_eq!(data["1"], json!("0.52"));
        assert_eq!(data["5"], json!("0.58"));
        assert_eq!(data["15"], json!("0.59"));
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_parse_loadavg_truncated() {
        assert!(matches!(
            parse_loadavg("0.52"),
            Err(CollectionError::InvalidData(_))
        ));
    }

    #[test]
    fn test_parse_who() {
        let raw = "\
bob      tty7         2024-01-01 10:00 (:0)
bob      pts/0        2024-01-01 10:05 (:0)
alice    pts/1        2024-01-01 11:00 (10.0.0.2)
";
        let data = parse_who(raw);
        assert_eq!(data["bob"], json!(2));
        assert_eq!(data["alice"], json!(1));
        assert!(parse_who("").is_empty());
    }

    #[test]
    fn test_unknown_user_reads_zero() {
        let config: crate::transport::ShellTransportConfig = serde_yaml::from_str("{}").unwrap();
        let source = UserSessionState::new(Arc::new(ShellTransport::new(config)));

        assert_eq!(source.missing_key("nobody"), Some(json!(0)));
    }

    #[tokio::test]
    async fn test_read_file_over_local_shell() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1.00 2.00 3.00 1/1 1").unwrap();

        let config: crate::transport::ShellTransportConfig = serde_yaml::from_str("{}").unwrap();
        let transport = ShellTransport::new(config);
        let raw = transport
            .read_file(file.path().to_str().unwrap())
            .await
            .unwrap();

        let data = parse_loadavg(&raw).unwrap();
        assert_eq!(data["15"], json!("3.00"));
    }
}
