//! `wg(8)` command backend

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::TunnelControl;
use crate::error::PeerError;

/// Default bound on a single `wg` invocation
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives the kernel peer table through the `wg` command line tool
#[derive(Debug, Clone)]
pub struct WgCli {
    interface: String,
    program: String,
    timeout: Duration,
}

impl WgCli {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            program: "wg".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Use a different executable in place of `wg`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Public key of the running interface (`wg show <iface> public-key`)
    pub async fn interface_public_key(&self) -> Result<String, PeerError> {
        let output = self
            .run(&["show", self.interface.as_str(), "public-key"])
            .await?;
        let key = output.trim().to_string();
        if key.is_empty() {
            return Err(PeerError::CommandFailed {
                command: self.describe(&["show", self.interface.as_str(), "public-key"]),
                output: "empty output".to_string(),
            });
        }
        Ok(key)
    }

    /// Run the tool and return stdout, or the combined output on failure
    async fn run(&self, args: &[&str]) -> Result<String, PeerError> {
        let command = self.describe(args);
        tracing::debug!("Running: {}", command);

        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| PeerError::Timeout {
                command: command.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| PeerError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let mut combined = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !combined.is_empty() {
                combined.push_str(" - ");
            }
            combined.push_str(stdout.trim());
        }
        if combined.is_empty() {
            combined = format!("exited with {}", output.status);
        }

        Err(PeerError::CommandFailed {
            command,
            output: combined,
        })
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut command = self.program.clone();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }
}

/// True when `wg` reports the peer is already gone
fn is_absent_peer(output: &str) -> bool {
    let output = output.to_ascii_lowercase();
    output.contains("no such peer") || output.contains("not found")
}

#[async_trait]
impl TunnelControl for WgCli {
    async fn add_peer(&self, public_key: &str, allowed: Ipv4Addr) -> Result<(), PeerError> {
        let allowed_ips = format!("{}/32", allowed);
        self.run(&[
            "set",
            self.interface.as_str(),
            "peer",
            public_key,
            "allowed-ips",
            allowed_ips.as_str(),
        ])
        .await
        .map_err(|e| PeerError::AddFailed {
            public_key: public_key.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!("Added peer {} ({}) on {}", public_key, allowed_ips, self.interface);
        Ok(())
    }

    async fn remove_peer(&self, public_key: &str) -> Result<(), PeerError> {
        match self
            .run(&["set", self.interface.as_str(), "peer", public_key, "remove"])
            .await
        {
            Ok(_) => {
                tracing::info!("Removed peer {} from {}", public_key, self.interface);
                Ok(())
            }
            Err(PeerError::CommandFailed { output, .. }) if is_absent_peer(&output) => {
                tracing::debug!("Peer {} already absent on {}", public_key, self.interface);
                Ok(())
            }
            Err(e) => Err(PeerError::RemoveFailed {
                public_key: public_key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
