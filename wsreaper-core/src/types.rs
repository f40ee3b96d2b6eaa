//! Core type definitions for the reaper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Worker mode as rendered in the `M` column of the server-status page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// `_` waiting for connection
    Waiting,
    /// `S` starting up
    Starting,
    /// `R` reading request
    Reading,
    /// `W` sending reply
    SendingReply,
    /// `K` keepalive (read)
    KeepAlive,
    /// `D` DNS lookup
    DnsLookup,
    /// `C` closing connection
    Closing,
    /// `L` logging
    Logging,
    /// `G` gracefully finishing
    GracefullyFinishing,
    /// `I` idle cleanup of worker
    IdleCleanup,
    /// `.` open slot with no current process
    OpenSlot,
}

impl WorkerState {
    /// Map a scoreboard letter to a state
    pub fn from_letter(letter: char) -> Option<Self> {
        let state = match letter {
            '_' => WorkerState::Waiting,
            'S' => WorkerState::Starting,
            'R' => WorkerState::Reading,
            'W' => WorkerState::SendingReply,
            'K' => WorkerState::KeepAlive,
            'D' => WorkerState::DnsLookup,
            'C' => WorkerState::Closing,
            'L' => WorkerState::Logging,
            'G' => WorkerState::GracefullyFinishing,
            'I' => WorkerState::IdleCleanup,
            '.' => WorkerState::OpenSlot,
            _ => return None,
        };
        Some(state)
    }

    pub fn letter(&self) -> char {
        match self {
            WorkerState::Waiting => '_',
            WorkerState::Starting => 'S',
            WorkerState::Reading => 'R',
            WorkerState::SendingReply => 'W',
            WorkerState::KeepAlive => 'K',
            WorkerState::DnsLookup => 'D',
            WorkerState::Closing => 'C',
            WorkerState::Logging => 'L',
            WorkerState::GracefullyFinishing => 'G',
            WorkerState::IdleCleanup => 'I',
            WorkerState::OpenSlot => '.',
        }
    }

    /// The worker belongs to a process that is finishing in-flight work
    pub fn is_draining(&self) -> bool {
        matches!(self, WorkerState::GracefullyFinishing)
    }

    /// The worker is actively writing a response to its client
    pub fn is_responding(&self) -> bool {
        matches!(self, WorkerState::SendingReply)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One worker/thread row of the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerThreadRecord {
    pub process_id: u32,
    /// Server slot label, e.g. `3-0`
    pub slot: String,
    pub worker_state: WorkerState,
    /// Acceptance flag of the owning process, not of the thread
    pub server_accepting_new_connections: bool,
    /// Canonical client address; `None` when the slot serves nobody
    pub remote_client_address: Option<IpAddr>,
    pub seconds_in_state: u64,
}

/// One per-process row of the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSection {
    pub slot: u32,
    pub process_id: u32,
    /// Raw `Stopping` cell, e.g. `yes (old gen)`
    pub stopping: Option<String>,
    pub accepting_connections: bool,
}

/// A record picked for reconciliation against live sockets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub process_id: u32,
    pub remote_client_address: IpAddr,
    pub seconds_in_state: u64,
    pub slot: String,
}

impl Candidate {
    /// Build a candidate from a record; records without a client never qualify
    pub fn from_record(record: &WorkerThreadRecord) -> Option<Self> {
        record.remote_client_address.map(|address| Candidate {
            process_id: record.process_id,
            remote_client_address: address,
            seconds_in_state: record.seconds_in_state,
            slot: record.slot.clone(),
        })
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pid {} client {} ({}s, slot {})",
            self.process_id, self.remote_client_address, self.seconds_in_state, self.slot
        )
    }
}

/// Kernel TCP state, numbered as in `/proc/net/tcp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
    Unknown,
}

impl TcpState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => TcpState::Established,
            0x02 => TcpState::SynSent,
            0x03 => TcpState::SynRecv,
            0x04 => TcpState::FinWait1,
            0x05 => TcpState::FinWait2,
            0x06 => TcpState::TimeWait,
            0x07 => TcpState::Close,
            0x08 => TcpState::CloseWait,
            0x09 => TcpState::LastAck,
            0x0A => TcpState::Listen,
            0x0B => TcpState::Closing,
            0x0C => TcpState::NewSynRecv,
            _ => TcpState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
            TcpState::NewSynRecv => "NEW_SYN_RECV",
            TcpState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A TCP connection observed on the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LiveConnection {
    pub local_address: IpAddr,
    pub local_port: u16,
    pub remote_address: IpAddr,
    pub remote_port: u16,
    pub status: TcpState,
    pub owner_process_id: u32,
}

impl fmt::Display for LiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}] pid {}",
            std::net::SocketAddr::new(self.local_address, self.local_port),
            std::net::SocketAddr::new(self.remote_address, self.remote_port),
            self.status,
            self.owner_process_id
        )
    }
}

/// Collapse IPv4-mapped IPv6 addresses to plain IPv4
pub fn canonical_ip(address: IpAddr) -> IpAddr {
    address.to_canonical()
}
