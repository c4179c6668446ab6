//! Command line arguments for the demo binary
//!
//! Every value here is optional: anything left unset falls back to the
//! configuration file, then to the built-in defaults.

use crate::core::logging::LogFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "smartqueue")]
#[command(about = "In-process fan-out queue demo: user registrations feeding onboarding")]
#[command(version, long_version = crate::core::version::long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Force coloured log output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured log output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Milliseconds between simulated user registrations
    #[arg(short = 'i', long = "publish-interval", value_name = "MS")]
    pub publish_interval_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(short = 'd', long = "run-for", value_name = "SECONDS")]
    pub run_for_secs: Option<u64>,

    /// CPU percentage at which new registrations are discarded
    #[arg(short = 't', long = "cpu-threshold", value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub cpu_threshold: Option<u8>,

    /// Capacity of each consumer group's channel
    #[arg(short = 'q', long = "max-queue-size", value_name = "COUNT")]
    pub max_queue_size: Option<usize>,

    /// Drop items for a full consumer group instead of waiting
    #[arg(long = "drop-on-full")]
    pub drop_on_full: bool,

    /// Discard buffered items on shutdown instead of processing them
    #[arg(long = "no-auto-drain")]
    pub no_auto_drain: bool,
}

impl Args {
    /// `Some(true)` for `--color`, `Some(false)` for `--no-color`, `None` when unset
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
