//! Configuration loading and environment variable handling

use crate::domains::WsReaperConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "WSREAPER".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<WsReaperConfig> {
        let path = path.as_ref();
        debug!("Reading configuration file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config: WsReaperConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<WsReaperConfig> {
        let mut config = WsReaperConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<WsReaperConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut WsReaperConfig) -> ConfigResult<()> {
        self.apply_status_overrides(&mut config.status)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_reaper_overrides(&mut config.reaper)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply status source overrides
    fn apply_status_overrides(
        &self,
        config: &mut crate::domains::status::StatusConfig,
    ) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("STATUS_URL") {
            config.url = Some(url);
        }

        if let Ok(path) = self.get_env_var("REPORT_FILE") {
            config.report_file = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_TIMEOUT: {}", e)))?;
            config.timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Ok(verify_ssl) = self.get_env_var("HTTP_VERIFY_SSL") {
            config.verify_ssl = verify_ssl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_VERIFY_SSL: {}", e)))?;
        }

        Ok(())
    }

    /// Apply reaping policy overrides
    fn apply_reaper_overrides(
        &self,
        config: &mut crate::domains::reaper::ReaperConfig,
    ) -> ConfigResult<()> {
        if let Ok(mode) = self.get_env_var("MODE") {
            config.mode = crate::domains::reaper::ReaperMode::from_str(&mode)
                .map_err(|_| ConfigError::EnvError(format!("Invalid MODE: {}", mode)))?;
        }

        if let Ok(threshold) = self.get_env_var("STALENESS_THRESHOLD") {
            let seconds: u64 = threshold.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid STALENESS_THRESHOLD: {}", e))
            })?;
            config.staleness_threshold = std::time::Duration::from_secs(seconds);
        }

        if let Ok(port) = self.get_env_var("SERVICE_PORT") {
            config.service_port = port
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid SERVICE_PORT: {}", e)))?;
        }

        if let Ok(concurrency) = self.get_env_var("CONCURRENCY") {
            config.concurrency = concurrency
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CONCURRENCY: {}", e)))?;
        }

        if let Ok(tool) = self.get_env_var("KILL_TOOL") {
            config.kill.tool_path = PathBuf::from(tool);
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
