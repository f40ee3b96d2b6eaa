//! websocket-reaper entry point

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;

mod cli;
mod commands;

use cli::{level_override, Cli, Commands, ConfigCommands};
use wsreaper_logging::{init_logging_from_config, init_simple_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = level_override(cli.log_level.as_deref(), cli.sweep.forces_debug())
        .map_err(|e| anyhow!(e))?;

    if let Some(Commands::Config { config_cmd }) = &cli.command {
        init_simple_tracing(level.map(|l| l.as_str()).unwrap_or("warn"))?;
        return match config_cmd {
            ConfigCommands::Validate { config_file } => {
                commands::handle_config_validate(config_file)
            }
            ConfigCommands::Generate { output, force } => {
                commands::handle_config_generate(output.as_deref(), *force)
            }
            ConfigCommands::Show { format } => {
                let (mut config, origin) = commands::load_config(cli.config.as_ref())?;
                origin.log();
                cli.sweep.apply(&mut config);
                println!("{}", commands::render_config(&config, format)?);
                Ok(())
            }
        };
    }

    let (config, origin) = commands::load_config(cli.config.as_ref())?;
    let config = commands::resolve_config(config, &cli.sweep)?;

    let _guard = init_logging_from_config(&config.logging, level)
        .context("Failed to initialize logging")?;
    origin.log();
    info!("websocket-reaper {} starting", env!("CARGO_PKG_VERSION"));

    commands::sweep_command(&config, cli.sweep.json).await?;
    Ok(())
}
