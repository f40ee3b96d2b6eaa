//! Operating mode of a run

use serde::{Deserialize, Serialize};
use std::fmt;
use wsreaper_config::ReaperMode;

/// What the run does with matched connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    Observe,
    Terminate,
}

/// Where the records under consideration come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// The live status page and real sockets
    Live,
    /// A captured report or a rehearsal sample; never destructive
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingMode {
    pub action: ActionMode,
    pub data: DataSource,
}

impl OperatingMode {
    pub const OBSERVE: Self = Self {
        action: ActionMode::Observe,
        data: DataSource::Live,
    };

    pub const TERMINATE: Self = Self {
        action: ActionMode::Terminate,
        data: DataSource::Live,
    };

    pub const SIMULATE: Self = Self {
        action: ActionMode::Observe,
        data: DataSource::Simulated,
    };

    pub fn new(action: ActionMode, data: DataSource) -> Self {
        Self { action, data }
    }

    /// Derive the mode from configuration.
    ///
    /// A captured report is simulated data whatever the configured mode.
    pub fn from_config(mode: ReaperMode, captured_report: bool) -> Self {
        let base = Self::from(mode);
        if captured_report {
            Self::new(base.action, DataSource::Simulated)
        } else {
            base
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.data == DataSource::Simulated
    }

    /// Only live data in terminate mode may destroy connections
    pub fn may_terminate(&self) -> bool {
        self.action == ActionMode::Terminate && self.data == DataSource::Live
    }
}

impl From<ReaperMode> for OperatingMode {
    fn from(mode: ReaperMode) -> Self {
        match mode {
            ReaperMode::Observe => OperatingMode::OBSERVE,
            ReaperMode::Terminate => OperatingMode::TERMINATE,
            ReaperMode::Simulate => OperatingMode::SIMULATE,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            ActionMode::Observe => "observe",
            ActionMode::Terminate => "terminate",
        };
        let data = match self.data {
            DataSource::Live => "live",
            DataSource::Simulated => "simulated",
        };
        write!(f, "{}/{}", action, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_live_terminate_is_destructive() {
        assert!(OperatingMode::TERMINATE.may_terminate());
        assert!(!OperatingMode::OBSERVE.may_terminate());
        assert!(!OperatingMode::SIMULATE.may_terminate());
        assert!(!OperatingMode::new(ActionMode::Terminate, DataSource::Simulated).may_terminate());
    }

    #[test]
    fn test_captured_report_forces_simulation() {
        let mode = OperatingMode::from_config(ReaperMode::Terminate, true);
        assert_eq!(mode.action, ActionMode::Terminate);
        assert!(mode.is_simulated());
        assert!(!mode.may_terminate());

        assert_eq!(
            OperatingMode::from_config(ReaperMode::Terminate, false),
            OperatingMode::TERMINATE
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(OperatingMode::SIMULATE.to_string(), "observe/simulated");
    }
}
