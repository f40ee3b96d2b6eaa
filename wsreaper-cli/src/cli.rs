//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use wsreaper_config::domains::logging::LogLevel;
use wsreaper_config::{ReaperMode, WsReaperConfig};

#[derive(Parser, Debug)]
#[command(
    name = "websocket-reaper",
    author,
    version,
    about = "Close websocket connections that keep retired Apache workers alive",
    long_about = None
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(flatten)]
    pub sweep: SweepArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options of the default sweep
#[derive(Args, Debug, Default, Clone)]
pub struct SweepArgs {
    /// Terminate matched connections instead of only reporting them
    #[arg(short = 'k', long, conflicts_with_all = ["testing", "mode"])]
    pub kill: bool,

    /// Rehearse against healthy busy workers; never destructive, implies --verbose
    #[arg(short = 't', long, conflicts_with = "mode")]
    pub testing: bool,

    /// Operating mode, as an alternative to --kill and --testing
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<ReaperMode>,

    /// Log every decision at debug level
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// URL of the server-status page
    #[arg(short = 'u', long, value_name = "URL")]
    pub url: Option<String>,

    /// Read a captured server-status page instead of fetching one
    #[arg(long, value_name = "PATH")]
    pub report_file: Option<PathBuf>,

    /// Seconds a worker must have spent in its state to be reaped
    #[arg(long, value_name = "SECONDS")]
    pub threshold: Option<u64>,

    /// Local port the websocket service listens on
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Candidates processed at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Limit a rehearsal to the newest N server processes; 0 rehearses against all
    #[arg(long, value_name = "N")]
    pub sample_size: Option<usize>,

    /// Skip TLS certificate verification
    #[arg(long, conflicts_with = "verify_ssl")]
    pub insecure: bool,

    /// Verify the TLS certificate of the status page
    #[arg(long)]
    pub verify_ssl: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl SweepArgs {
    /// Mode requested on the command line, if any
    pub fn requested_mode(&self) -> Option<ReaperMode> {
        if self.kill {
            Some(ReaperMode::Terminate)
        } else if self.testing {
            Some(ReaperMode::Simulate)
        } else {
            self.mode
        }
    }

    pub fn forces_debug(&self) -> bool {
        self.verbose || self.testing
    }

    /// Layer command line values over the loaded configuration
    pub fn apply(&self, config: &mut WsReaperConfig) {
        if let Some(mode) = self.requested_mode() {
            config.reaper.mode = mode;
        }
        if let Some(ref url) = self.url {
            config.status.url = Some(url.clone());
        }
        if let Some(ref path) = self.report_file {
            config.status.report_file = Some(path.clone());
        }
        if let Some(seconds) = self.threshold {
            config.reaper.staleness_threshold = Duration::from_secs(seconds);
        }
        if let Some(port) = self.port {
            config.reaper.service_port = port;
        }
        if let Some(concurrency) = self.concurrency {
            config.reaper.concurrency = concurrency;
        }
        if let Some(size) = self.sample_size {
            config.reaper.rehearsal.sample_size = (size > 0).then_some(size);
        }
        if self.insecure {
            config.http.verify_ssl = false;
        } else if self.verify_ssl {
            config.http.verify_ssl = true;
        }
    }
}

/// Resolve the effective log level override from the command line
pub fn level_override(
    log_level: Option<&str>,
    forces_debug: bool,
) -> Result<Option<LogLevel>, String> {
    if forces_debug {
        return Ok(Some(LogLevel::Debug));
    }
    log_level.map(|level| level.parse::<LogLevel>()).transpose()
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path; prints to stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}
