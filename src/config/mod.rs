//! Configuration Module

pub mod storage;
mod types;

pub use storage::{config_dir, config_file, ConfigError, ConfigStorage};
pub use types::{SdkConfig, CONFIG_VERSION};
