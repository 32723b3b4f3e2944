//! Error taxonomy for the inventory engine.
//!
//! Only [`ServiceError`] crosses the `InventoryService` boundary. Everything
//! else is absorbed where it occurs and turned into a degraded record, an
//! empty table or a fall-through to the next name tier.
use thiserror::Error;

/// Failure of the external device-query channel (adb).
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("device channel unavailable: {0}")]
    Unavailable(String),

    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("query failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("query i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the external asset-inspection tool (aapt).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("inspection tool not found in any of: {0}")]
    NotFound(String),

    #[error("inspection tool failed: {0}")]
    Failed(String),

    #[error("no application label in tool output")]
    NoLabel,

    #[error("inspection i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to download the remote device name table.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// Failure reading or writing the persisted inventory snapshot.
#[derive(Debug, Error)]
pub enum CacheIoError {
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid device database url '{0}': {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("{field} must be between 1 and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        max: i64,
    },
}

/// Errors surfaced to callers of the inventory service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no devices connected")]
    NoDevice,

    #[error("device {serial} is not ready (state: {state})")]
    DeviceUnavailable { serial: String, state: String },

    #[error("invalid package identifier '{0}'")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Channel(#[from] QueryError),
}
