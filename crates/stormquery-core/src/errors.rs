use thiserror::Error;

/// Failure talking to the remote feature service. Every variant is recovered
/// by the component that issued the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("http status {0}")]
    Status(u16),
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid field name: {0:?}")]
    InvalidField(String),
    #[error("invalid layer url for {0}: {1:?}")]
    InvalidUrl(&'static str, String),
    #[error("{0} must declare an archived exclusion")]
    MissingExclusion(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("no filters provided")]
    NoFilters,
}

pub type Result<T> = std::result::Result<T, RemoteError>;
