use anyhow::{Context, Result};
use consultpay_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "consultpay.log";

/// Keeps the non-blocking file writer alive; drop it last.
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level,
/// and each `-v` raises the configured level by one step.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<TelemetryGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level_for(&config.level, verbosity))
            .with_context(|| format!("invalid logging.level '{}'", config.level))?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if config.json {
        layers.push(stderr.json().boxed());
    } else {
        layers.push(stderr.boxed());
    }

    let mut guard = None;
    if let Some(dir) = config.directory() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(TelemetryGuard { _file: guard })
}

fn level_for(configured: &str, verbosity: u8) -> String {
    if verbosity == 0 {
        return configured.to_string();
    }
    const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    let base = LEVELS
        .iter()
        .position(|level| level.eq_ignore_ascii_case(configured.trim()))
        .unwrap_or(2);
    let raised = (base + verbosity as usize).min(LEVELS.len() - 1);
    LEVELS[raised].to_string()
}
