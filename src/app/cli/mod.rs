//! Command line arguments and configuration file handling

pub mod args;
pub mod config;

pub use args::Args;
pub use config::{load_config, AppSettings, ConfigError, FileConfig};

#[cfg(test)]
mod tests;
