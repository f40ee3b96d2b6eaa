//! One reaper sweep: fetch, parse, select, match, terminate

use crate::error::{MatchError, ReapError, Result};
use crate::inspector::{ProcfsInspector, SocketInspector};
use crate::matcher::ConnectionMatcher;
use crate::mode::OperatingMode;
use crate::parser::parse_status_report;
use crate::selector::{select, SelectionPolicy};
use crate::terminator::{
    ConnectionKiller, ConnectionOutcome, ConnectionTerminator, OutcomeKind, SsKiller,
};
use crate::types::Candidate;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use wsreaper_config::WsReaperConfig;
use wsreaper_http::{FileStatusSource, HttpError, HttpStatusSource, StatusSource};

/// Immutable parameters of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperSettings {
    pub mode: OperatingMode,
    pub staleness_threshold: Duration,
    pub service_port: u16,
    /// Candidates in flight at once; 1 processes them sequentially
    pub concurrency: usize,
    /// Rehearsal sample of process ids, simulated runs only
    pub rehearsal_sample: Option<Vec<u32>>,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self::from(&WsReaperConfig::default())
    }
}

impl From<&WsReaperConfig> for ReaperSettings {
    fn from(config: &WsReaperConfig) -> Self {
        Self {
            mode: OperatingMode::from_config(
                config.reaper.mode,
                config.status.uses_captured_report(),
            ),
            staleness_threshold: config.reaper.staleness_threshold,
            service_port: config.reaper.service_port,
            concurrency: config.reaper.concurrency,
            rehearsal_sample: None,
        }
    }
}

impl ReaperSettings {
    pub fn with_rehearsal_sample(mut self, pids: Vec<u32>) -> Self {
        self.rehearsal_sample = Some(pids);
        self
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        let policy = SelectionPolicy::new(self.mode, self.staleness_threshold);
        match (&self.rehearsal_sample, self.mode.is_simulated()) {
            (Some(pids), true) => policy.with_restriction(pids.iter().copied()),
            _ => policy,
        }
    }
}

/// Terminal state of one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    ProcessNotFound,
    NoMatchingConnection,
    InspectionFailed { detail: String },
    Matched { outcomes: Vec<ConnectionOutcome> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate: Candidate,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// Aggregated counts over all candidate results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub process_not_found: usize,
    pub no_matching_connection: usize,
    pub inspection_failed: usize,
    pub matched_candidates: usize,
    pub terminated: usize,
    pub would_terminate: usize,
    pub external_tool_failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_results(results: &[CandidateResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match &result.resolution {
                Resolution::ProcessNotFound => summary.process_not_found += 1,
                Resolution::NoMatchingConnection => summary.no_matching_connection += 1,
                Resolution::InspectionFailed { .. } => summary.inspection_failed += 1,
                Resolution::Matched { outcomes } => {
                    summary.matched_candidates += 1;
                    for outcome in outcomes {
                        match outcome.kind {
                            OutcomeKind::Terminated => summary.terminated += 1,
                            OutcomeKind::WouldTerminate => summary.would_terminate += 1,
                            OutcomeKind::ExternalToolFailed => summary.external_tool_failed += 1,
                            OutcomeKind::Skipped => summary.skipped += 1,
                        }
                    }
                }
            }
        }
        summary
    }
}

/// Everything one sweep observed and did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: OperatingMode,
    pub source: String,
    pub records_parsed: usize,
    pub rows_skipped: usize,
    pub candidates: usize,
    pub results: Vec<CandidateResult>,
    pub summary: RunSummary,
}

/// The reaper engine
pub struct Reaper {
    settings: ReaperSettings,
    source: Arc<dyn StatusSource>,
    matcher: ConnectionMatcher,
    terminator: ConnectionTerminator,
}

impl Reaper {
    pub fn new(
        settings: ReaperSettings,
        source: Arc<dyn StatusSource>,
        inspector: Arc<dyn SocketInspector>,
        killer: Arc<dyn ConnectionKiller>,
    ) -> Self {
        let matcher = ConnectionMatcher::new(inspector, settings.service_port);
        let terminator = ConnectionTerminator::new(killer, settings.mode);
        Self {
            settings,
            source,
            matcher,
            terminator,
        }
    }

    /// Wire the production components described by `config`
    pub fn from_config(config: &WsReaperConfig, settings: ReaperSettings) -> Result<Self> {
        let source = status_source_from_config(config)?;
        let inspector = Arc::new(ProcfsInspector::new(config.reaper.proc_root.clone()));
        let killer = Arc::new(SsKiller::new(
            config.reaper.kill.tool_path.clone(),
            config.reaper.kill.timeout,
        ));
        Ok(Self::new(settings, source, inspector, killer))
    }

    pub fn settings(&self) -> &ReaperSettings {
        &self.settings
    }

    /// Run one sweep. Only fetch and parse failures abort it.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reaper_run", %run_id, mode = %self.settings.mode);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunReport> {
        let started_at = Utc::now();

        let body = self.source.fetch_report().await?;
        let parsed = parse_status_report(&body)?;

        let policy = self.settings.selection_policy();
        let candidates = select(&parsed.records, &policy);
        info!(
            records = parsed.records.len(),
            candidates = candidates.len(),
            threshold = policy.threshold.as_secs(),
            "Selected candidates"
        );

        let candidate_count = candidates.len();
        let results: Vec<CandidateResult> = if candidates.is_empty() {
            info!("No eligible candidates");
            Vec::new()
        } else {
            stream::iter(candidates)
                .map(|candidate| self.process_candidate(candidate))
                .buffered(self.settings.concurrency.max(1))
                .collect::<Vec<_>>()
                .await
        };

        let summary = RunSummary::from_results(&results);
        info!(?summary, "Sweep finished");

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            mode: self.settings.mode,
            source: self.source.describe(),
            records_parsed: parsed.records.len(),
            rows_skipped: parsed.skipped_rows,
            candidates: candidate_count,
            results,
            summary,
        })
    }

    async fn process_candidate(&self, candidate: Candidate) -> CandidateResult {
        let pid = candidate.process_id;
        let client = candidate.remote_client_address;
        let slot = candidate.slot.clone();

        // procfs reads block, keep them off the runtime workers
        let matcher = self.matcher.clone();
        let lookup = candidate.clone();
        let task = tokio::task::spawn_blocking(move || matcher.match_candidate(&lookup));
        let matched = match task.await {
            Ok(matched) => matched,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(pid, %client, %slot, error = %e, "Socket inspection task was cancelled");
                return CandidateResult {
                    candidate,
                    resolution: Resolution::InspectionFailed {
                        detail: e.to_string(),
                    },
                };
            }
        };

        let resolution = match matched {
            Err(MatchError::ProcessNotFound(_)) => {
                warn!(pid, %client, %slot, "Process no longer exists");
                Resolution::ProcessNotFound
            }
            Err(MatchError::Inspection(e)) => {
                warn!(pid, %client, %slot, error = %e, "Socket inspection failed");
                Resolution::InspectionFailed {
                    detail: e.to_string(),
                }
            }
            Ok(connections) if connections.is_empty() => {
                info!(pid, %client, %slot, "No matching connection");
                Resolution::NoMatchingConnection
            }
            Ok(connections) => {
                debug!(
                    pid,
                    %client,
                    %slot,
                    connections = connections.len(),
                    "Resolving matched connections"
                );
                Resolution::Matched {
                    outcomes: self.terminator.terminate_all(&connections).await,
                }
            }
        };

        CandidateResult {
            candidate,
            resolution,
        }
    }
}

/// Pick the status source: a captured report wins over the live URL
pub fn status_source_from_config(config: &WsReaperConfig) -> Result<Arc<dyn StatusSource>> {
    if let Some(ref path) = config.status.report_file {
        return Ok(Arc::new(FileStatusSource::new(path.clone())));
    }

    match config.status.url {
        Some(ref url) => Ok(Arc::new(HttpStatusSource::with_config(
            url.clone(),
            config.http.clone().into(),
        )?)),
        None => Err(ReapError::from(HttpError::ConfigError(
            "no status URL or report file configured".to_string(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LiveConnection, TcpState};
    use std::path::PathBuf;

    fn outcome(kind: OutcomeKind) -> ConnectionOutcome {
        ConnectionOutcome {
            connection: LiveConnection {
                local_address: "10.0.0.1".parse().unwrap(),
                local_port: 443,
                remote_address: "203.0.113.5".parse().unwrap(),
                remote_port: 50000,
                status: TcpState::Established,
                owner_process_id: 1,
            },
            kind,
            detail: None,
        }
    }

    fn result(resolution: Resolution) -> CandidateResult {
        CandidateResult {
            candidate: Candidate {
                process_id: 1,
                remote_client_address: "203.0.113.5".parse().unwrap(),
                seconds_in_state: 400,
                slot: "0-0".to_string(),
            },
            resolution,
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result(Resolution::ProcessNotFound),
            result(Resolution::NoMatchingConnection),
            result(Resolution::Matched {
                outcomes: vec![
                    outcome(OutcomeKind::Terminated),
                    outcome(OutcomeKind::ExternalToolFailed),
                ],
            }),
            result(Resolution::InspectionFailed {
                detail: "denied".to_string(),
            }),
        ];

        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.process_not_found, 1);
        assert_eq!(summary.no_matching_connection, 1);
        assert_eq!(summary.inspection_failed, 1);
        assert_eq!(summary.matched_candidates, 1);
        assert_eq!(summary.terminated, 1);
        assert_eq!(summary.external_tool_failed, 1);
        assert_eq!(summary.would_terminate, 0);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = WsReaperConfig::default();
        config.reaper.service_port = 8443;
        config.status.report_file = Some(PathBuf::from("/tmp/status.html"));

        let settings = ReaperSettings::from(&config);
        assert_eq!(settings.service_port, 8443);
        assert_eq!(settings.staleness_threshold, Duration::from_secs(300));
        assert!(settings.mode.is_simulated());
    }

    #[test]
    fn test_rehearsal_sample_only_restricts_simulation() {
        let live = ReaperSettings {
            mode: OperatingMode::OBSERVE,
            ..ReaperSettings::default()
        }
        .with_rehearsal_sample(vec![1, 2]);
        assert!(live.selection_policy().restrict_to.is_none());

        let simulated = ReaperSettings {
            mode: OperatingMode::SIMULATE,
            ..ReaperSettings::default()
        }
        .with_rehearsal_sample(vec![1, 2]);
        assert_eq!(simulated.selection_policy().restrict_to.unwrap().len(), 2);
    }

    #[test]
    fn test_status_source_selection() {
        let mut config = WsReaperConfig::default();
        assert!(status_source_from_config(&config).is_err());

        config.status.url = Some("http://localhost/server-status".to_string());
        assert_eq!(
            status_source_from_config(&config).unwrap().describe(),
            "http://localhost/server-status"
        );

        config.status.report_file = Some(PathBuf::from("/tmp/status.html"));
        assert_eq!(
            status_source_from_config(&config).unwrap().describe(),
            "file:///tmp/status.html"
        );
    }

    #[test]
    fn test_result_serializes_flat() {
        let json = serde_json::to_value(result(Resolution::NoMatchingConnection)).unwrap();
        assert_eq!(json["resolution"], "no_matching_connection");
        assert_eq!(json["candidate"]["process_id"], 1);
    }
}
