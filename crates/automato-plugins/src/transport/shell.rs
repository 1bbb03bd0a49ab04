//! Shell transport
//!
//! Runs scripts with `sh -c`, or through the system `ssh` client when a host
//! is configured. The ssh client runs in batch mode, so authentication has to
//! work without prompting (agent or identity file).

use async_trait::async_trait;
use automato_core::{Transport, TransportError};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status ssh uses for its own failures
const SSH_ERROR_EXIT: i32 = 255;

/// `type: shell`
#[derive(Debug, Clone, Deserialize)]
pub struct ShellTransportConfig {
    /// Remote host; local execution when absent
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub identity_file: Option<String>,

    /// Seconds a single script may run
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

fn default_timeout() -> u64 {
    5
}

/// Output of one script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

/// Local or ssh command runner
#[derive(Debug)]
pub struct ShellTransport {
    config: ShellTransportConfig,
    timeout: Duration,
}

impl ShellTransport {
    pub fn new(config: ShellTransportConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout);
        Self { config, timeout }
    }

    pub fn is_remote(&self) -> bool {
        self.config.host.is_some()
    }

    /// Program and arguments used to run `script`
    fn command_line(&self, script: &str) -> (String, Vec<String>) {
        match self.config.host {
            Some(ref host) => {
                let mut args = vec![
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                    "-p".to_string(),
                    self.config.port.to_string(),
                ];
                if let Some(ref identity) = self.config.identity_file {
                    args.push("-i".to_string());
                    args.push(identity.clone());
                }
                args.push(format!("{}@{}", self.config.user, host));
                args.push(script.to_string());
                ("ssh".to_string(), args)
            }
            None => ("sh".to_string(), vec!["-c".to_string(), script.to_string()]),
        }
    }

    /// Run a script and return its output whatever the exit status
    pub async fn exec(&self, script: &str) -> Result<ShellOutput, TransportError> {
        let (program, args) = self.command_line(script);
        debug!(program = %program, script, "Running shell script");

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Connection(format!("failed to run {}: {}", program, e)))?;

        let output = ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            code: output.status.code().unwrap_or(-1),
        };

        if self.is_remote() && output.code == SSH_ERROR_EXIT {
            warn!(host = ?self.config.host, stderr = %output.stderr, "ssh failed");
            return Err(TransportError::Connection(output.stderr));
        }

        Ok(output)
    }

    /// Run a script; a non-zero exit status is an error
    pub async fn exec_checked(&self, script: &str) -> Result<String, TransportError> {
        let output = self.exec(script).await?;
        if output.code != 0 {
            return Err(TransportError::Exit {
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, TransportError> {
        self.exec_checked(&format!("cat {}", quote(path))).await
    }
}

#[async_trait]
impl Transport for ShellTransport {
    fn kind(&self) -> &'static str {
        "shell"
    }

    async fn check(&self) -> Result<(), TransportError> {
        self.exec_checked("true").await.map(|_| ())
    }
}

/// Quote a string for POSIX shells
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
