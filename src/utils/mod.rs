//! Configuration and logging utilities

pub mod config;
pub mod logging;

pub use config::{Configuration, ConfigError};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
