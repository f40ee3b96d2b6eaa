//! Selection and termination policy

use crate::error::ConfigResult;
use crate::validation::{
    validate_port_range, validate_positive, validate_required_string, Validatable,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How a run treats the connections it finds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ReaperMode {
    /// Log what would be terminated
    #[default]
    Observe,
    /// Terminate stale connections of draining workers
    Terminate,
    /// Rehearse against normal workers; never terminates anything
    Simulate,
}

impl ReaperMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaperMode::Observe => "observe",
            ReaperMode::Terminate => "terminate",
            ReaperMode::Simulate => "simulate",
        }
    }
}

impl fmt::Display for ReaperMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReaperMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "observe" | "dry-run" => Ok(ReaperMode::Observe),
            "terminate" | "kill" => Ok(ReaperMode::Terminate),
            "simulate" | "testing" => Ok(ReaperMode::Simulate),
            _ => Err(format!("Invalid reaper mode: {}", s)),
        }
    }
}

/// Reaping policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Operating mode
    #[serde(default)]
    pub mode: ReaperMode,

    /// Minimum time a worker must have spent in its state
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_staleness_threshold"
    )]
    pub staleness_threshold: Duration,

    /// Local port of the protected service
    #[serde(default = "default_service_port")]
    pub service_port: u16,

    /// Number of candidates processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Root of the proc filesystem
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// External kill tool settings
    #[serde(default)]
    pub kill: KillConfig,

    /// Rehearsal sampling used in simulate mode
    #[serde(default)]
    pub rehearsal: RehearsalConfig,
}

/// External connection kill tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KillConfig {
    /// Path of the `ss` binary
    #[serde(default = "default_tool_path")]
    pub tool_path: PathBuf,

    /// Upper bound on a single kill invocation
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_kill_timeout"
    )]
    pub timeout: Duration,
}

/// Rehearsal sampling of running worker processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RehearsalConfig {
    /// Process names considered server workers
    #[serde(default = "default_process_names")]
    pub process_names: Vec<String>,

    /// Keep only candidates owned by the newest N workers; `null` rehearses against all
    #[serde(default = "default_sample_size")]
    pub sample_size: Option<usize>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            mode: ReaperMode::default(),
            staleness_threshold: default_staleness_threshold(),
            service_port: default_service_port(),
            concurrency: default_concurrency(),
            proc_root: default_proc_root(),
            kill: KillConfig::default(),
            rehearsal: RehearsalConfig::default(),
        }
    }
}

impl Default for KillConfig {
    fn default() -> Self {
        Self {
            tool_path: default_tool_path(),
            timeout: default_kill_timeout(),
        }
    }
}

impl Default for RehearsalConfig {
    fn default() -> Self {
        Self {
            process_names: default_process_names(),
            sample_size: default_sample_size(),
        }
    }
}

impl Validatable for ReaperConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_port_range(self.service_port, "service_port", self.domain_name())?;
        validate_positive(self.concurrency, "concurrency", self.domain_name())?;
        validate_required_string(
            &self.proc_root.to_string_lossy(),
            "proc_root",
            self.domain_name(),
        )?;

        self.kill.validate()?;
        self.rehearsal.validate()?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "reaper"
    }
}

impl Validatable for KillConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(
            &self.tool_path.to_string_lossy(),
            "tool_path",
            self.domain_name(),
        )?;
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "reaper.kill"
    }
}

impl Validatable for RehearsalConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.process_names.is_empty() {
            return Err(self.validation_error("at least one process name is required"));
        }
        for name in &self.process_names {
            validate_required_string(name, "process_names", self.domain_name())?;
        }
        if let Some(size) = self.sample_size {
            validate_positive(size, "sample_size", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "reaper.rehearsal"
    }
}

// Default value functions
fn default_staleness_threshold() -> Duration {
    Duration::from_secs(300)
}

fn default_service_port() -> u16 {
    443
}

fn default_concurrency() -> usize {
    1
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_tool_path() -> PathBuf {
    PathBuf::from("/usr/bin/ss")
}

fn default_kill_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_process_names() -> Vec<String> {
    vec!["apache2".to_string(), "httpd".to_string()]
}

fn default_sample_size() -> Option<usize> {
    Some(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaper_mode_from_str() {
        assert_eq!(ReaperMode::from_str("observe").unwrap(), ReaperMode::Observe);
        assert_eq!(ReaperMode::from_str("KILL").unwrap(), ReaperMode::Terminate);
        assert_eq!(ReaperMode::from_str("testing").unwrap(), ReaperMode::Simulate);
        assert!(ReaperMode::from_str("explode").is_err());
    }

    #[test]
    fn test_reaper_config_defaults() {
        let config = ReaperConfig::default();
        assert_eq!(config.mode, ReaperMode::Observe);
        assert_eq!(config.staleness_threshold, Duration::from_secs(300));
        assert_eq!(config.service_port, 443);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.kill.tool_path, PathBuf::from("/usr/bin/ss"));
        assert_eq!(config.rehearsal.process_names, vec!["apache2", "httpd"]);
        assert_eq!(config.rehearsal.sample_size, Some(2));
    }

    #[test]
    fn test_reaper_config_validation() {
        let mut config = ReaperConfig::default();
        assert!(config.validate().is_ok());

        config.service_port = 0;
        assert!(config.validate().is_err());

        config = ReaperConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        config = ReaperConfig::default();
        config.kill.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config = ReaperConfig::default();
        config.rehearsal.sample_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_null_sample_size_disables_sampling() {
        let config: RehearsalConfig = serde_yaml::from_str("sample_size: null").unwrap();
        assert!(config.sample_size.is_none());

        let config: RehearsalConfig = serde_yaml::from_str("process_names: [httpd]").unwrap();
        assert_eq!(config.sample_size, Some(2));
    }

    #[test]
    fn test_zero_threshold_is_allowed() {
        let config = ReaperConfig {
            staleness_threshold: Duration::from_secs(0),
            ..ReaperConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
