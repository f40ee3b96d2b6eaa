//! Logging setup for the websocket reaper
//!
//! Every crate in the workspace emits `tracing` events; this crate turns a
//! [`LoggingConfig`](wsreaper_config::LoggingConfig) into an installed
//! subscriber with console, file and syslog targets.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing, LoggingGuard};
