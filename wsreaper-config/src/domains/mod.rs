//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod reaper;
pub mod status;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main reaper configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WsReaperConfig {
    /// Where the status report comes from
    #[serde(default)]
    pub status: status::StatusConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Selection and termination policy
    #[serde(default)]
    pub reaper: reaper::ReaperConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl WsReaperConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.status.validate()?;
        self.http.validate()?;
        self.reaper.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Ensure a status report can actually be obtained.
    ///
    /// Kept apart from [`validate_all`](Self::validate_all) because the URL is
    /// usually supplied on the command line after the file has been loaded.
    pub fn require_status_source(&self) -> ConfigResult<()> {
        if self.status.url.is_none() && self.status.report_file.is_none() {
            return Err(ConfigError::ValidationError(
                "a status URL (--url) or a captured report file is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let mut config = WsReaperConfig::default();
        config.status.url = Some("http://localhost/server-status".to_string());
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WsReaperConfig::default();
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_status_source_required() {
        let mut config = WsReaperConfig::default();
        assert!(config.require_status_source().is_err());

        config.status.url = Some("http://localhost/server-status".to_string());
        assert!(config.require_status_source().is_ok());
    }

    #[test]
    fn test_generate_sample_round_trips() {
        let sample = WsReaperConfig::generate_sample();
        let parsed: WsReaperConfig = serde_yaml::from_str(&sample).unwrap();
        assert!(parsed.validate_all().is_ok());
        assert_eq!(
            parsed.status.url.as_deref(),
            Some("http://localhost/server-status")
        );
    }
}
