//! Live socket enumeration through procfs
//!
//! A process's TCP sockets are found by collecting the `socket:[inode]`
//! links under `<proc>/<pid>/fd` and joining them against the kernel tables
//! in `<proc>/<pid>/net/tcp` and `<proc>/<pid>/net/tcp6`.

use crate::error::InspectError;
use crate::types::{LiveConnection, TcpState};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Read-only view of processes and their TCP sockets
#[cfg_attr(test, mockall::automock)]
pub trait SocketInspector: Send + Sync {
    /// Whether a process with this id currently exists
    fn process_exists(&self, pid: u32) -> bool;

    /// Every TCP connection owned by the process, any state
    fn tcp_connections(&self, pid: u32) -> Result<Vec<LiveConnection>, InspectError>;
}

/// [`SocketInspector`] backed by a procfs mount
#[derive(Debug, Clone)]
pub struct ProcfsInspector {
    proc_root: PathBuf,
}

impl Default for ProcfsInspector {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsInspector {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    fn process_dir(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    fn socket_inodes(&self, pid: u32) -> Result<HashSet<u64>, InspectError> {
        let fd_dir = self.process_dir(pid).join("fd");
        let entries = fs::read_dir(&fd_dir).map_err(|source| match source.kind() {
            ErrorKind::NotFound if !self.process_exists(pid) => InspectError::ProcessGone(pid),
            _ => InspectError::Io {
                path: fd_dir.clone(),
                source,
            },
        })?;

        let inodes = entries
            .flatten()
            .filter_map(|entry| fs::read_link(entry.path()).ok())
            .filter_map(|target| target.to_str().and_then(parse_socket_inode))
            .collect();
        Ok(inodes)
    }
}

impl SocketInspector for ProcfsInspector {
    fn process_exists(&self, pid: u32) -> bool {
        pid != 0 && self.process_dir(pid).is_dir()
    }

    fn tcp_connections(&self, pid: u32) -> Result<Vec<LiveConnection>, InspectError> {
        if !self.process_exists(pid) {
            return Err(InspectError::ProcessGone(pid));
        }

        let inodes = self.socket_inodes(pid)?;
        trace!(pid, sockets = inodes.len(), "Collected socket inodes");
        if inodes.is_empty() {
            return Ok(Vec::new());
        }

        let net_dir = self.process_dir(pid).join("net");
        let mut connections = Vec::new();
        for (file, ipv6) in [("tcp", false), ("tcp6", true)] {
            let path = net_dir.join(file);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                // tcp6 is absent when IPv6 is disabled
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(source) => return Err(InspectError::Io { path, source }),
            };

            connections.extend(
                parse_net_table(&content, ipv6)
                    .into_iter()
                    .filter(|entry| inodes.contains(&entry.inode))
                    .map(|entry| entry.into_connection(pid)),
            );
        }

        debug!(pid, connections = connections.len(), "Enumerated TCP connections");
        Ok(connections)
    }
}

/// One row of a `/proc/net/tcp{,6}` table
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetEntry {
    local: (IpAddr, u16),
    remote: (IpAddr, u16),
    state: TcpState,
    inode: u64,
}

impl NetEntry {
    fn into_connection(self, pid: u32) -> LiveConnection {
        LiveConnection {
            local_address: self.local.0,
            local_port: self.local.1,
            remote_address: self.remote.0,
            remote_port: self.remote.1,
            status: self.state,
            owner_process_id: pid,
        }
    }
}

fn parse_net_table(content: &str, ipv6: bool) -> Vec<NetEntry> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 {
                return None;
            }
            Some(NetEntry {
                local: parse_addr_port(parts[1], ipv6)?,
                remote: parse_addr_port(parts[2], ipv6)?,
                state: TcpState::from_code(u8::from_str_radix(parts[3], 16).ok()?),
                inode: parts[9].parse().ok()?,
            })
        })
        .collect()
}

fn parse_socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

fn parse_addr_port(s: &str, ipv6: bool) -> Option<(IpAddr, u16)> {
    let (addr_hex, port_hex) = s.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let ip = if ipv6 {
        IpAddr::V6(parse_ipv6(addr_hex)?)
    } else {
        IpAddr::V4(parse_ipv4(addr_hex)?)
    };
    Some((ip, port))
}

// The kernel prints each 32-bit word in host (little-endian) order.
fn parse_ipv4(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let raw = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(raw.to_le_bytes()))
}

fn parse_ipv6(hex: &str) -> Option<Ipv6Addr> {
    if hex.len() != 32 {
        return None;
    }
    let mut bytes = [0u8; 16];
    for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
        let raw = u32::from_str_radix(&hex[i * 8..(i + 1) * 8], 16).ok()?;
        chunk.copy_from_slice(&raw.to_le_bytes());
    }
    Some(Ipv6Addr::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    const HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when \
                          retrnsmt   uid  timeout inode";

    fn hex_v4(addr: &str) -> String {
        let ip: Ipv4Addr = addr.parse().unwrap();
        format!("{:08X}", u32::from_le_bytes(ip.octets()))
    }

    fn hex_v6(addr: &str) -> String {
        let ip: Ipv6Addr = addr.parse().unwrap();
        ip.octets()
            .chunks_exact(4)
            .map(|c| format!("{:08X}", u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect()
    }

    fn row(local: String, lport: u16, remote: String, rport: u16, state: u8, inode: u64) -> String {
        format!(
            "   0: {}:{:04X} {}:{:04X} {:02X} 00000000:00000000 00:00000000 00000000    33        \
             0 {} 1 0000000000000000 20 4 30 10 -1",
            local, lport, remote, rport, state, inode
        )
    }

    fn fake_process(
        root: &Path,
        pid: u32,
        inodes: &[u64],
        tcp: &[String],
        tcp6: Option<&[String]>,
    ) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(dir.join("fd")).unwrap();
        fs::create_dir_all(dir.join("net")).unwrap();

        symlink("/dev/null", dir.join("fd").join("0")).unwrap();
        for (n, inode) in inodes.iter().enumerate() {
            let link = dir.join("fd").join((n + 3).to_string());
            symlink(format!("socket:[{}]", inode), link).unwrap();
        }

        let mut table = vec![HEADER.to_string()];
        table.extend(tcp.iter().cloned());
        fs::write(dir.join("net").join("tcp"), table.join("\n")).unwrap();

        if let Some(rows) = tcp6 {
            let mut table = vec![HEADER.to_string()];
            table.extend(rows.iter().cloned());
            fs::write(dir.join("net").join("tcp6"), table.join("\n")).unwrap();
        }
    }

    #[test]
    fn test_parse_addresses() {
        assert_eq!(
            parse_addr_port("0100007F:01BB", false),
            Some((IpAddr::V4(Ipv4Addr::LOCALHOST), 443))
        );
        assert_eq!(
            parse_addr_port(&format!("{}:0050", hex_v6("2001:db8::1")), true),
            Some(("2001:db8::1".parse().unwrap(), 80))
        );
        assert!(parse_addr_port("zz:01BB", false).is_none());
        assert!(parse_addr_port("0100007F", false).is_none());
    }

    #[test]
    fn test_parse_socket_inode() {
        assert_eq!(parse_socket_inode("socket:[123456]"), Some(123456));
        assert_eq!(parse_socket_inode("pipe:[42]"), None);
        assert_eq!(parse_socket_inode("/dev/null"), None);
    }

    #[test]
    fn test_parse_net_table_skips_garbage() {
        let content = [
            HEADER.to_string(),
            row(hex_v4("10.0.0.1"), 443, hex_v4("203.0.113.5"), 51000, 0x01, 77),
            "   1: short line".to_string(),
        ]
        .join("\n");

        let entries = parse_net_table(&content, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].inode, 77);
        assert_eq!(entries[0].state, TcpState::Established);
        assert_eq!(entries[0].remote, ("203.0.113.5".parse().unwrap(), 51000));
    }

    #[test]
    fn test_connections_joined_by_inode() {
        let root = TempDir::new().unwrap();
        fake_process(
            root.path(),
            2101,
            &[1001, 1003],
            &[
                row(hex_v4("10.0.0.1"), 443, hex_v4("203.0.113.5"), 51000, 0x01, 1001),
                // owned by another process
                row(hex_v4("10.0.0.1"), 443, hex_v4("203.0.113.6"), 51001, 0x01, 1002),
                row(hex_v4("0.0.0.0"), 443, hex_v4("0.0.0.0"), 0, 0x0A, 1003),
            ],
            Some(&[row(
                hex_v6("::ffff:10.0.0.1"),
                443,
                hex_v6("::ffff:192.0.2.44"),
                40000,
                0x01,
                1003,
            )]),
        );

        let inspector = ProcfsInspector::new(root.path());
        let connections = inspector.tcp_connections(2101).unwrap();

        assert_eq!(connections.len(), 3);
        assert!(connections.iter().all(|c| c.owner_process_id == 2101));
        assert_eq!(connections[0].remote_address, "203.0.113.5".parse::<IpAddr>().unwrap());
        assert_eq!(connections[1].status, TcpState::Listen);
        assert_eq!(
            connections[2].remote_address,
            "::ffff:192.0.2.44".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_missing_tcp6_is_tolerated() {
        let root = TempDir::new().unwrap();
        fake_process(
            root.path(),
            300,
            &[5],
            &[row(hex_v4("10.0.0.1"), 443, hex_v4("198.51.100.7"), 1234, 0x01, 5)],
            None,
        );

        let connections = ProcfsInspector::new(root.path()).tcp_connections(300).unwrap();
        assert_eq!(connections.len(), 1);
    }

    #[test]
    fn test_missing_process() {
        let root = TempDir::new().unwrap();
        let inspector = ProcfsInspector::new(root.path());

        assert!(!inspector.process_exists(999));
        assert!(matches!(
            inspector.tcp_connections(999),
            Err(InspectError::ProcessGone(999))
        ));
    }

    #[test]
    fn test_unreadable_fd_dir_is_io_error() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("42")).unwrap();

        let inspector = ProcfsInspector::new(root.path());
        assert!(inspector.process_exists(42));
        assert!(matches!(
            inspector.tcp_connections(42),
            Err(InspectError::Io { .. })
        ));
    }
}
