use thiserror::Error;

/// Top-level error type shared by graphmap crates.
#[derive(Error, Debug)]
pub enum GraphmapError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}
