//! Connection termination and per-connection outcomes

use crate::error::KillError;
use crate::mode::{ActionMode, OperatingMode};
use crate::types::LiveConnection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Mechanism that forcibly closes one established connection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionKiller: Send + Sync {
    async fn kill(&self, connection: &LiveConnection) -> Result<(), KillError>;

    /// Human readable name used in logs
    fn describe(&self) -> String;
}

/// Kills sockets with `ss -K`
#[derive(Debug, Clone)]
pub struct SsKiller {
    tool_path: PathBuf,
    timeout: Duration,
}

impl SsKiller {
    pub fn new(tool_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tool_path: tool_path.into(),
            timeout,
        }
    }

    /// Arguments selecting exactly one connection by its remote endpoint and local port
    pub fn arguments(connection: &LiveConnection) -> Vec<String> {
        vec![
            "-K".to_string(),
            "dst".to_string(),
            SocketAddr::new(connection.remote_address, connection.remote_port).to_string(),
            "sport".to_string(),
            "=".to_string(),
            format!(":{}", connection.local_port),
        ]
    }

    fn tool_name(&self) -> String {
        self.tool_path.display().to_string()
    }
}

#[async_trait]
impl ConnectionKiller for SsKiller {
    async fn kill(&self, connection: &LiveConnection) -> Result<(), KillError> {
        let args = Self::arguments(connection);
        debug!(tool = %self.tool_name(), ?args, "Invoking kill tool");

        let child = Command::new(&self.tool_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| KillError::Spawn {
                tool: self.tool_name(),
                source,
            })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(KillError::Spawn {
                    tool: self.tool_name(),
                    source,
                })
            }
            Err(_) => {
                return Err(KillError::Timeout {
                    tool: self.tool_name(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(KillError::ExitStatus {
                tool: self.tool_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn describe(&self) -> String {
        format!("{} -K", self.tool_name())
    }
}

/// What happened to one matched connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Terminated,
    /// Observe mode: reported, left untouched
    WouldTerminate,
    ExternalToolFailed,
    /// Terminate requested against simulated data
    Skipped,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Terminated => "terminated",
            OutcomeKind::WouldTerminate => "would_terminate",
            OutcomeKind::ExternalToolFailed => "external_tool_failed",
            OutcomeKind::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOutcome {
    pub connection: LiveConnection,
    pub kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConnectionOutcome {
    fn new(connection: &LiveConnection, kind: OutcomeKind, detail: Option<String>) -> Self {
        Self {
            connection: connection.clone(),
            kind,
            detail,
        }
    }
}

/// Applies the operating mode to matched connections
#[derive(Clone)]
pub struct ConnectionTerminator {
    killer: Arc<dyn ConnectionKiller>,
    mode: OperatingMode,
}

impl ConnectionTerminator {
    pub fn new(killer: Arc<dyn ConnectionKiller>, mode: OperatingMode) -> Self {
        Self { killer, mode }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Resolve one connection. The killer is only consulted for live data in terminate mode.
    pub async fn terminate(&self, connection: &LiveConnection) -> ConnectionOutcome {
        if !self.mode.may_terminate() {
            return if self.mode.action == ActionMode::Terminate {
                info!(%connection, "Skipping termination of simulated connection");
                ConnectionOutcome::new(
                    connection,
                    OutcomeKind::Skipped,
                    Some("simulated data is never terminated".to_string()),
                )
            } else {
                info!(%connection, "Would terminate connection");
                ConnectionOutcome::new(connection, OutcomeKind::WouldTerminate, None)
            };
        }

        match self.killer.kill(connection).await {
            Ok(()) => {
                info!(%connection, killer = %self.killer.describe(), "Terminated connection");
                ConnectionOutcome::new(connection, OutcomeKind::Terminated, None)
            }
            Err(e) => {
                warn!(%connection, error = %e, "Failed to terminate connection");
                ConnectionOutcome::new(
                    connection,
                    OutcomeKind::ExternalToolFailed,
                    Some(e.to_string()),
                )
            }
        }
    }

    /// Resolve every matched connection of one candidate, in order
    pub async fn terminate_all(&self, connections: &[LiveConnection]) -> Vec<ConnectionOutcome> {
        let mut outcomes = Vec::with_capacity(connections.len());
        for connection in connections {
            outcomes.push(self.terminate(connection).await);
        }
        outcomes
    }
}

impl fmt::Debug for ConnectionTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTerminator")
            .field("killer", &self.killer.describe())
            .field("mode", &self.mode)
            .finish()
    }
}
