use thiserror::Error;

/// Errors raised while loading or validating the master configuration.
///
/// Every variant is fatal at startup; none of these can occur once the
/// scheduler is running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("event window is invalid: {0}")]
    InvalidWindow(String),

    #[error("scheduled breaks are invalid: {0}")]
    InvalidBreaks(String),

    #[error("timing is invalid: {0}")]
    InvalidTiming(String),
}
