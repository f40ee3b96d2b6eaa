//! Domain-driven configuration management for the websocket reaper
//!
//! Configuration is split by functional domain (status source, HTTP client,
//! reaping policy, logging), with validation, defaults, and environment
//! variable support.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    http::HttpConfig,
    logging::LoggingConfig,
    reaper::{KillConfig, ReaperConfig, ReaperMode, RehearsalConfig},
    status::StatusConfig,
    WsReaperConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
