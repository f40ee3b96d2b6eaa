//! Reconciliation of candidates with live sockets

use crate::error::{InspectError, MatchError};
use crate::inspector::SocketInspector;
use crate::types::{canonical_ip, Candidate, LiveConnection, TcpState};
use std::sync::Arc;
use tracing::debug;

/// Finds the live connections a candidate refers to
#[derive(Clone)]
pub struct ConnectionMatcher {
    inspector: Arc<dyn SocketInspector>,
    service_port: u16,
}

impl ConnectionMatcher {
    pub fn new(inspector: Arc<dyn SocketInspector>, service_port: u16) -> Self {
        Self {
            inspector,
            service_port,
        }
    }

    pub fn service_port(&self) -> u16 {
        self.service_port
    }

    /// Whether a connection belongs to the candidate's client on the service port
    pub fn is_match(&self, candidate: &Candidate, connection: &LiveConnection) -> bool {
        connection.status == TcpState::Established
            && connection.local_port == self.service_port
            && canonical_ip(connection.remote_address)
                == canonical_ip(candidate.remote_client_address)
    }

    /// Every established connection of the candidate's process to its client.
    ///
    /// An empty result is a normal outcome; several matches are all returned.
    pub fn match_candidate(
        &self,
        candidate: &Candidate,
    ) -> Result<Vec<LiveConnection>, MatchError> {
        let pid = candidate.process_id;
        if !self.inspector.process_exists(pid) {
            return Err(MatchError::ProcessNotFound(pid));
        }

        let connections = match self.inspector.tcp_connections(pid) {
            Ok(connections) => connections,
            // exited between the existence check and the socket scan
            Err(InspectError::ProcessGone(gone)) => return Err(MatchError::ProcessNotFound(gone)),
            Err(e) => return Err(e.into()),
        };
        let matched: Vec<LiveConnection> = connections
            .into_iter()
            .filter(|connection| self.is_match(candidate, connection))
            .collect();

        debug!(
            pid,
            client = %candidate.remote_client_address,
            matched = matched.len(),
            "Matched candidate against live sockets"
        );
        Ok(matched)
    }
}

impl std::fmt::Debug for ConnectionMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMatcher")
            .field("service_port", &self.service_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::MockSocketInspector;
    use mockall::predicate::eq;
    use std::net::IpAddr;

    fn candidate(pid: u32, client: &str) -> Candidate {
        Candidate {
            process_id: pid,
            remote_client_address: client.parse().unwrap(),
            seconds_in_state: 400,
            slot: "0-0".to_string(),
        }
    }

    fn connection(
        pid: u32,
        local_port: u16,
        remote: &str,
        remote_port: u16,
        status: TcpState,
    ) -> LiveConnection {
        LiveConnection {
            local_address: "10.0.0.1".parse().unwrap(),
            local_port,
            remote_address: remote.parse().unwrap(),
            remote_port,
            status,
            owner_process_id: pid,
        }
    }

    #[test]
    fn test_matches_all_established_on_service_port() {
        let mut inspector = MockSocketInspector::new();
        inspector.expect_process_exists().with(eq(10)).return_const(true);
        inspector.expect_tcp_connections().with(eq(10)).returning(|pid| {
            Ok(vec![
                connection(pid, 443, "203.0.113.5", 50001, TcpState::Established),
                connection(pid, 443, "203.0.113.5", 50002, TcpState::Established),
                connection(pid, 443, "203.0.113.5", 50003, TcpState::CloseWait),
                connection(pid, 8443, "203.0.113.5", 50004, TcpState::Established),
                connection(pid, 443, "203.0.113.9", 50005, TcpState::Established),
            ])
        });

        let matcher = ConnectionMatcher::new(Arc::new(inspector), 443);
        let matched = matcher.match_candidate(&candidate(10, "203.0.113.5")).unwrap();

        let ports: Vec<u16> = matched.iter().map(|c| c.remote_port).collect();
        assert_eq!(ports, vec![50001, 50002]);
    }

    #[test]
    fn test_mapped_addresses_compare_equal() {
        let mut inspector = MockSocketInspector::new();
        inspector.expect_process_exists().return_const(true);
        inspector.expect_tcp_connections().returning(|pid| {
            Ok(vec![connection(pid, 443, "::ffff:192.0.2.44", 40000, TcpState::Established)])
        });

        let matcher = ConnectionMatcher::new(Arc::new(inspector), 443);
        let matched = matcher.match_candidate(&candidate(11, "192.0.2.44")).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(
            matched[0].remote_address,
            "::ffff:192.0.2.44".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        let mut inspector = MockSocketInspector::new();
        inspector.expect_process_exists().return_const(true);
        inspector.expect_tcp_connections().returning(|_| Ok(Vec::new()));

        let matcher = ConnectionMatcher::new(Arc::new(inspector), 443);
        assert!(matcher.match_candidate(&candidate(12, "203.0.113.5")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_process() {
        let mut inspector = MockSocketInspector::new();
        inspector.expect_process_exists().return_const(false);
        inspector.expect_tcp_connections().never();

        let matcher = ConnectionMatcher::new(Arc::new(inspector), 443);
        assert!(matches!(
            matcher.match_candidate(&candidate(13, "203.0.113.5")),
            Err(MatchError::ProcessNotFound(13))
        ));
    }

    #[test]
    fn test_inspection_failure_propagates() {
        let mut inspector = MockSocketInspector::new();
        inspector.expect_process_exists().return_const(true);
        inspector.expect_tcp_connections().returning(|pid| {
            Err(InspectError::Io {
                path: format!("/proc/{}/fd", pid).into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });

        let matcher = ConnectionMatcher::new(Arc::new(inspector), 443);
        assert!(matches!(
            matcher.match_candidate(&candidate(14, "203.0.113.5")),
            Err(MatchError::Inspection(InspectError::Io { .. }))
        ));
    }

    #[test]
    fn test_process_exiting_mid_scan_is_not_found() {
        let mut inspector = MockSocketInspector::new();
        inspector.expect_process_exists().return_const(true);
        inspector
            .expect_tcp_connections()
            .returning(|pid| Err(InspectError::ProcessGone(pid)));

        let matcher = ConnectionMatcher::new(Arc::new(inspector), 443);
        assert!(matches!(
            matcher.match_candidate(&candidate(15, "203.0.113.5")),
            Err(MatchError::ProcessNotFound(15))
        ));
    }
}
