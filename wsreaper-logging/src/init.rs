use anyhow::{bail, Context, Result};
use std::ffi::CString;
use std::path::Path;
use syslog_tracing::{Facility, Options, Syslog};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use wsreaper_config::domains::logging::{LogFormat, LogLevel, LogTarget};
use wsreaper_config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Chatty dependencies are capped regardless of the configured level
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "rustls=warn",
];

/// Keeps background log writers alive; flushes on drop.
#[must_use = "dropping the guard stops file logging"]
#[derive(Default)]
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Build the global filter for a level
pub fn build_env_filter(level: LogLevel) -> EnvFilter {
    let mut directives = vec![level.as_str().to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));

    EnvFilter::try_new(directives.join(","))
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize logging from configuration.
///
/// `level_override` wins over the configured level (used by `--verbose`).
pub fn init_logging_from_config(
    config: &LoggingConfig,
    level_override: Option<LogLevel>,
) -> Result<LoggingGuard> {
    let level = level_override.unwrap_or(config.level);
    let mut guard = LoggingGuard::default();
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(config.targets.len());

    for target in &config.targets {
        match target {
            LogTarget::Console { level: target_level } => {
                let layer = fmt_layer(
                    config.format,
                    std::io::stderr,
                    true,
                    config.include_location,
                );
                layers.push(with_target_level(layer, *target_level));
            }
            LogTarget::File {
                path,
                level: target_level,
            } => {
                let (writer, file_guard) = file_writer(Path::new(path))?;
                let layer = fmt_layer(config.format, writer, false, config.include_location);
                layers.push(with_target_level(layer, *target_level));
                guard._file_guards.push(file_guard);
            }
            LogTarget::Syslog {
                level: target_level,
                facility,
                ident,
            } => {
                let writer = syslog_writer(facility, ident)?;
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .without_time()
                    .with_level(false)
                    .boxed();
                layers.push(with_target_level(layer, *target_level));
            }
        }
    }

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(guard)
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool, include_location: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_file(include_location)
        .with_line_number(include_location);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

fn with_target_level(layer: BoxedLayer, level: Option<LogLevel>) -> BoxedLayer {
    match level {
        Some(level) => layer.with_filter(level_filter(level)).boxed(),
        None => layer,
    }
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Open the process-wide syslog connection; only one may exist at a time
fn syslog_writer(facility: &str, ident: &str) -> Result<Syslog> {
    let facility = syslog_facility(facility)?;
    let identity = CString::new(ident)
        .with_context(|| format!("Syslog ident contains a NUL byte: {:?}", ident))?;

    Syslog::new(identity, Options::LOG_PID, facility)
        .context("Syslog logging is already initialized in this process")
}

fn syslog_facility(name: &str) -> Result<Facility> {
    let facility = match name.to_ascii_lowercase().as_str() {
        "user" => Facility::User,
        "mail" => Facility::Mail,
        "daemon" => Facility::Daemon,
        "auth" => Facility::Auth,
        "lpr" => Facility::Lpr,
        "news" => Facility::News,
        "uucp" => Facility::Uucp,
        "cron" => Facility::Cron,
        "authpriv" => Facility::AuthPriv,
        "ftp" => Facility::Ftp,
        "local0" => Facility::Local0,
        "local1" => Facility::Local1,
        "local2" => Facility::Local2,
        "local3" => Facility::Local3,
        "local4" => Facility::Local4,
        "local5" => Facility::Local5,
        "local6" => Facility::Local6,
        "local7" => Facility::Local7,
        other => bail!("Unknown syslog facility: {}", other),
    };
    Ok(facility)
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(level_filter(LogLevel::Error), LevelFilter::ERROR);
        assert_eq!(level_filter(LogLevel::Debug), LevelFilter::DEBUG);
    }

    #[test]
    fn test_env_filter_quiets_dependencies() {
        let filter = build_env_filter(LogLevel::Debug).to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
    }

    #[test]
    fn test_syslog_facility_names() {
        assert!(matches!(syslog_facility("daemon"), Ok(Facility::Daemon)));
        assert!(matches!(syslog_facility("LOCAL3"), Ok(Facility::Local3)));
        assert!(syslog_facility("kern").is_err());
    }

    #[test]
    fn test_syslog_ident_with_nul_is_rejected() {
        assert!(syslog_writer("user", "web\0socket").is_err());
    }

    #[test]
    fn test_file_path_without_name_is_rejected() {
        assert!(file_writer(Path::new("/")).is_err());
    }
}
