//! TOML configuration file loading
//!
//! Precedence is command line, then configuration file, then defaults. The
//! `[queue]` table maps directly onto `EngineOptions`:
//!
//! ```toml
//! log-level = "info"
//! log-format = "ext"
//! publish-interval-ms = 500
//!
//! [queue]
//! max-queue-size = 10000
//! cpu-threshold = 85
//! cpu-check-interval-ms = 3000
//! ```

use super::args::Args;
use crate::core::error_handling::ContextualError;
use crate::core::logging::LogFormat;
use crate::queue::EngineOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Interval between simulated registrations when nothing else is configured
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{message}")]
    Invalid { message: String },

    #[error("Cannot read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConfigError::Invalid { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message } => Some(message),
            ConfigError::Io { .. } => None,
        }
    }
}

/// Contents of the configuration file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub publish_interval_ms: Option<u64>,
    pub run_for_secs: Option<u64>,
    pub queue: EngineOptions,
}

impl FileConfig {
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| {
            ConfigError::invalid(format!(
                "Error parsing configuration file {}: {}",
                origin.display(),
                e
            ))
        })
    }
}

/// `<config dir>/SmartQueue/smartqueue.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("SmartQueue").join("smartqueue.toml"))
}

/// Load the configuration file
///
/// An explicitly named file must exist. Without one the default location
/// is tried, and a missing default file yields the defaults.
pub async fn load_config(config_file: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match config_file {
        Some(path) if !path.exists() => {
            return Err(ConfigError::invalid(format!(
                "The specified configuration file does not exist: {}",
                path.display()
            )))
        }
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    log::debug!("Loading configuration from {}", path.display());
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
    FileConfig::parse(&contents, &path)
}

/// Fully resolved settings for one run of the demo
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub color: bool,
    pub publish_interval: Duration,
    pub run_for: Option<Duration>,
    pub queue: EngineOptions,
}

impl AppSettings {
    /// Merge command line over file values; `is_terminal` decides colour
    /// when neither source sets it
    pub fn resolve(args: &Args, file: FileConfig, is_terminal: bool) -> Result<Self, ConfigError> {
        let mut queue = file.queue;
        if let Some(threshold) = args.cpu_threshold {
            queue.cpu_threshold = threshold;
        }
        if let Some(size) = args.max_queue_size {
            queue.max_queue_size = size;
        }
        if args.drop_on_full {
            queue.drop_on_full_queue = true;
        }
        if args.no_auto_drain {
            queue.auto_drain_on_shutdown = false;
        }
        queue.validate().map_err(|e| {
            ConfigError::invalid(e.user_message().map_or_else(|| e.to_string(), str::to_string))
        })?;

        let publish_interval_ms = args
            .publish_interval_ms
            .or(file.publish_interval_ms)
            .unwrap_or(DEFAULT_PUBLISH_INTERVAL_MS);
        if publish_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "publish-interval must be greater than 0",
            ));
        }

        let log_format = match args.log_format {
            Some(format) => format,
            None => LogFormat::from_name(file.log_format.as_deref()),
        };

        // 'none' and '-' switch file logging off
        let log_file = args
            .log_file
            .clone()
            .or(file.log_file)
            .filter(|path| !(path.as_os_str().eq_ignore_ascii_case("none") || path.as_os_str() == "-"));

        Ok(Self {
            log_level: args
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
            log_format,
            log_file,
            color: args.color_choice().or(file.color).unwrap_or(is_terminal),
            publish_interval: Duration::from_millis(publish_interval_ms),
            run_for: args
                .run_for_secs
                .or(file.run_for_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            queue,
        })
    }
}
