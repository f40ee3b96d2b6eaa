//! Command handlers

use crate::cli::SweepArgs;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wsreaper_config::{ConfigLoader, ReaperMode, WsReaperConfig};
use wsreaper_core::rehearsal::sample_worker_pids;
use wsreaper_core::{Reaper, ReaperSettings, RunReport};

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// The requested file was absent; environment and defaults apply
    MissingFile(PathBuf),
    Environment,
}

impl ConfigOrigin {
    /// Call once a subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded configuration from: {:?}", path),
            ConfigOrigin::MissingFile(path) => {
                warn!("Configuration file not found: {:?}. Using defaults.", path)
            }
            ConfigOrigin::Environment => {
                debug!("No configuration file specified. Loaded from environment or defaults.")
            }
        }
    }
}

/// Load configuration from file or use defaults
pub fn load_config(config_path: Option<&PathBuf>) -> Result<(WsReaperConfig, ConfigOrigin)> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => {
            let config = loader
                .from_file(path)
                .context(format!("Failed to load configuration from {:?}", path))?;
            Ok((config, ConfigOrigin::File(path.clone())))
        }
        Some(path) => {
            let config = loader
                .from_env()
                .context("Failed to load configuration from environment")?;
            Ok((config, ConfigOrigin::MissingFile(path.clone())))
        }
        None => {
            let config = loader
                .from_env()
                .context("Failed to load configuration from environment")?;
            Ok((config, ConfigOrigin::Environment))
        }
    }
}

/// Merge command line values into the loaded configuration and check the result
pub fn resolve_config(mut config: WsReaperConfig, args: &SweepArgs) -> Result<WsReaperConfig> {
    args.apply(&mut config);
    config
        .validate_all()
        .context("Invalid configuration after applying command line options")?;
    config.require_status_source()?;
    Ok(config)
}

/// Run one sweep and report it
pub async fn sweep_command(config: &WsReaperConfig, json: bool) -> Result<RunReport> {
    let mut settings = ReaperSettings::from(config);
    if let Some(sample) = rehearsal_sample(config) {
        info!(?sample, "Rehearsing against sampled server processes");
        settings = settings.with_rehearsal_sample(sample);
    }

    info!(
        mode = %settings.mode,
        threshold = settings.staleness_threshold.as_secs(),
        port = settings.service_port,
        "Starting sweep"
    );

    let reaper = Reaper::from_config(config, settings).context("Failed to set up the reaper")?;
    let report = reaper.run().await.context("Sweep aborted")?;

    info!(
        run_id = %report.run_id,
        candidates = report.candidates,
        terminated = report.summary.terminated,
        would_terminate = report.summary.would_terminate,
        failed = report.summary.external_tool_failed,
        "Sweep complete"
    );

    if json {
        let output =
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", output);
    }

    Ok(report)
}

/// Newest local server processes for a simulate run against this host.
///
/// A captured report may come from another machine, so it is never sampled.
fn rehearsal_sample(config: &WsReaperConfig) -> Option<Vec<u32>> {
    if config.reaper.mode != ReaperMode::Simulate || config.status.uses_captured_report() {
        return None;
    }
    let rehearsal = &config.reaper.rehearsal;
    let size = rehearsal.sample_size?;
    Some(sample_worker_pids(&rehearsal.process_names, Some(size)))
}

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    ConfigLoader::new()
        .from_file(config_file)
        .context(format!("Configuration validation failed for {:?}", config_file))?;
    println!("Configuration file is valid");
    Ok(())
}

/// Handle configuration generation
pub fn handle_config_generate(output: Option<&Path>, force: bool) -> Result<()> {
    let content = WsReaperConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", content);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, content).context(format!("Failed to write {:?}", output))?;
    info!("Sample configuration written to {:?}", output);
    Ok(())
}

/// Render the effective configuration
pub fn render_config(config: &WsReaperConfig, format: &str) -> Result<String> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::to_string(config).context("Failed to serialize to YAML"),
        "json" => serde_json::to_string_pretty(config).context("Failed to serialize to JSON"),
        _ => Err(anyhow::anyhow!(
            "Unknown output format: {}. Valid formats: yaml, json",
            format
        )),
    }
}
