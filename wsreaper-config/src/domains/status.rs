//! Status report source configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the server-status report is read from
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatusConfig {
    /// URL of the server-status page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Captured report used instead of the live page.
    ///
    /// A captured report is always treated as simulated data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
}

impl StatusConfig {
    /// Whether the report comes from a captured file rather than the live server
    pub fn uses_captured_report(&self) -> bool {
        self.report_file.is_some()
    }
}

impl Validatable for StatusConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ref url) = self.url {
            validate_url(url, "url", self.domain_name())?;
        }

        if let Some(ref path) = self.report_file {
            validate_required_string(&path.to_string_lossy(), "report_file", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "status"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_config_validation() {
        let mut config = StatusConfig::default();
        assert!(config.validate().is_ok());

        config.url = Some("http://localhost/server-status".to_string());
        assert!(config.validate().is_ok());

        config.url = Some("localhost/server-status".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_captured_report() {
        let config = StatusConfig {
            url: None,
            report_file: Some(PathBuf::from("/tmp/server-status.html")),
        };
        assert!(config.uses_captured_report());
        assert!(config.validate().is_ok());
    }
}
