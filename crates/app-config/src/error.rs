// In crates/app-config/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load configuration")]
    LoadError(#[from] config::ConfigError),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Setting '{name}' is not a representable number: {value}")]
    InvalidNumber { name: &'static str, value: f64 },

    #[error("Invalid risk settings: {0}")]
    RiskLimits(#[from] risk::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
