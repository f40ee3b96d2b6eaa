//! Eligibility selection of worker records

use crate::mode::{DataSource, OperatingMode};
use crate::types::{Candidate, WorkerThreadRecord};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Immutable selection parameters for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub mode: OperatingMode,
    /// Inclusive lower bound on `seconds_in_state`
    pub threshold: Duration,
    /// When set, only these processes may yield candidates
    pub restrict_to: Option<HashSet<u32>>,
}

impl SelectionPolicy {
    pub fn new(mode: OperatingMode, threshold: Duration) -> Self {
        Self {
            mode,
            threshold,
            restrict_to: None,
        }
    }

    pub fn with_restriction(mut self, pids: impl IntoIterator<Item = u32>) -> Self {
        self.restrict_to = Some(pids.into_iter().collect());
        self
    }

    /// The single selection predicate, parameterised by data source.
    ///
    /// Live data targets draining workers of processes that stopped accepting.
    /// Simulated data mirrors that against busy workers of healthy processes.
    pub fn is_eligible(&self, record: &WorkerThreadRecord) -> bool {
        if record.remote_client_address.is_none() {
            return false;
        }
        if record.seconds_in_state < self.threshold.as_secs() {
            return false;
        }
        if let Some(ref pids) = self.restrict_to {
            if !pids.contains(&record.process_id) {
                return false;
            }
        }

        match self.mode.data {
            DataSource::Live => {
                !record.server_accepting_new_connections && record.worker_state.is_draining()
            }
            DataSource::Simulated => {
                record.server_accepting_new_connections && record.worker_state.is_responding()
            }
        }
    }
}

/// Select candidates in report order; duplicates are kept
pub fn select(records: &[WorkerThreadRecord], policy: &SelectionPolicy) -> Vec<Candidate> {
    let candidates: Vec<Candidate> = records
        .iter()
        .filter(|record| policy.is_eligible(record))
        .filter_map(Candidate::from_record)
        .collect();

    for candidate in &candidates {
        debug!(
            pid = candidate.process_id,
            client = %candidate.remote_client_address,
            slot = %candidate.slot,
            seconds = candidate.seconds_in_state,
            "Selected candidate"
        );
    }

    candidates
}
