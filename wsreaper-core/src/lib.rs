//! Core engine of the websocket reaper
//!
//! A sweep reads the server-status report, picks worker threads that have
//! been stuck past the staleness threshold, finds the live TCP connections
//! behind them and, in terminate mode, closes those connections.

pub mod error;
pub mod inspector;
pub mod matcher;
pub mod mode;
pub mod parser;
pub mod pipeline;
pub mod rehearsal;
pub mod selector;
pub mod terminator;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{InspectError, KillError, MatchError, ParseError, ReapError, Result};
pub use inspector::{ProcfsInspector, SocketInspector};
pub use matcher::ConnectionMatcher;
pub use mode::{ActionMode, DataSource, OperatingMode};
pub use parser::{parse_status_report, ParsedReport};
pub use pipeline::{
    status_source_from_config, CandidateResult, Reaper, ReaperSettings, Resolution, RunReport,
    RunSummary,
};
pub use selector::{select, SelectionPolicy};
pub use terminator::{
    ConnectionKiller, ConnectionOutcome, ConnectionTerminator, OutcomeKind, SsKiller,
};
pub use types::{
    Candidate, ListenerSection, LiveConnection, TcpState, WorkerState, WorkerThreadRecord,
};
