use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use tracing::{debug, error, info, trace, warn};

/// Log rotation cadence for the file appender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Hourly,
    Daily,
    Never,
}

impl From<Rotation> for rolling::Rotation {
    fn from(r: Rotation) -> Self {
        match r {
            Rotation::Hourly => rolling::Rotation::HOURLY,
            Rotation::Daily => rolling::Rotation::DAILY,
            Rotation::Never => rolling::Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level filter (trace, debug, info, warn, error); `RUST_LOG`
    /// overrides it when set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for rolled log files; no file output when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Prefix of rolled file names.
    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_rotation")]
    pub rotation: Rotation,

    /// Emit JSON records instead of the human format.
    #[serde(default)]
    pub json_format: bool,

    /// Mirror records to stdout.
    #[serde(default = "default_console")]
    pub console_output: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_prefix() -> String {
    "tidefs".into()
}

fn default_rotation() -> Rotation {
    Rotation::Hourly
}

fn default_console() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
            file_prefix: default_prefix(),
            rotation: default_rotation(),
            json_format: false,
            console_output: true,
        }
    }
}

/// Install the global subscriber. Call once at startup; the returned
/// guard must stay alive so the non-blocking file writer flushes.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, std::io::Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer: Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>> =
        if config.console_output {
            if config.json_format {
                Some(Box::new(fmt::layer().json()))
            } else {
                Some(Box::new(fmt::layer()))
            }
        } else {
            None
        };

    let (file_layer, guard): (
        Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>>,
        Option<WorkerGuard>,
    ) = if let Some(log_dir) = &config.log_dir {
        let appender = rolling::RollingFileAppender::builder()
            .rotation(config.rotation.into())
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .build(log_dir)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json_format {
            Box::new(fmt::layer().json().with_writer(non_blocking))
        } else {
            Box::new(fmt::layer().with_writer(non_blocking))
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    registry.with(console_layer).with(file_layer).init();

    Ok(guard)
}
