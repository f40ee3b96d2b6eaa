//! Core error types for the reaper

use std::path::PathBuf;
use thiserror::Error;
use wsreaper_http::HttpError;

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum ReapError {
    /// The status source was unreachable or answered with a failure
    #[error("Failed to fetch server status: {0}")]
    Fetch(#[from] HttpError),

    /// The report could not be interpreted at all
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type alias for whole-run operations
pub type Result<T> = std::result::Result<T, ReapError>;

/// Status report parsing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed status report: {0}")]
    MalformedReport(String),
}

/// Failures while reading a process's sockets
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Process {0} does not exist")]
    ProcessGone(u32),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-candidate matching failures
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("a process with pid {0} does not exist")]
    ProcessNotFound(u32),

    #[error("Socket inspection failed: {0}")]
    Inspection(#[from] InspectError),
}

/// Failures of the external kill mechanism
#[derive(Debug, Error)]
pub enum KillError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ExitStatus {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not finish within {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}
