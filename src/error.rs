use thiserror::Error;

/// Errors raised inside a domain validator
///
/// These never leave the validator boundary: the validator converts them into
/// a failed result carrying the message in `details.error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal validator error: {0}")]
    Internal(String),
}

/// Errors that can occur while obtaining domain snapshots
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors that can occur when delivering alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors surfaced by the orchestrator's public API
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown validation type: {0}")]
    UnknownValidationType(String),
}
