//! Error taxonomy for the monitoring core.
//!
//! Every subsystem's run loop matches on these explicitly and logs +
//! continues; nothing propagates past a thread boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("sensor configuration invalid: {0}")]
    InvalidSensorConfig(String),
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("malformed option value for ({name}, {section}): {reason}")]
    MalformedOption {
        name: String,
        section: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("channel {0} out of range")]
    ChannelOutOfRange(i32),
    #[error("board variant does not support this operation")]
    UnsupportedOnBoard,
    #[error("reader frame malformed: {0}")]
    MalformedFrame(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport timed out")]
    Timeout,
    #[error("transport not configured")]
    NotConfigured,
    #[error("smtp error: {0}")]
    Smtp(String),
    #[error("serial/modem error: {0}")]
    Modem(String),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Hardware(#[from] HardwareError),
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
