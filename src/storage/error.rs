//! Error types for key-value operations

use std::fmt;
use std::num::ParseFloatError;

use serde::Deserialize;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error body returned by etcd for a failed keys request
///
/// Kept verbatim so callers see exactly what the service reported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EtcdError {
    #[serde(rename = "errorCode")]
    pub code: u32,

    pub message: String,

    #[serde(default)]
    pub cause: String,

    #[serde(default)]
    pub index: u64,
}

impl EtcdError {
    /// etcd v2 error code for "Key not found"
    pub const KEY_NOT_FOUND: u32 = 100;

    /// Synthesize an error for a non-2xx response without an etcd error body
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            code: 0,
            message: format!("unexpected HTTP status {status}"),
            cause: body.trim().to_string(),
            index: 0,
        }
    }

    /// Synthesize an error for a success response whose body is not a keys response
    pub fn invalid_body(reason: impl fmt::Display) -> Self {
        Self {
            code: 0,
            message: "invalid response body".to_string(),
            cause: reason.to_string(),
            index: 0,
        }
    }
}

impl fmt::Display for EtcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({}) [{}]", self.code, self.message, self.cause, self.index)
    }
}

/// Errors that can occur during key-value operations
#[derive(Debug)]
pub enum StorageError {
    /// No value is stored under the key
    NotFound { key: String },

    /// The stored value could not be parsed as a floating-point number
    MalformedValue {
        key: String,
        value: String,
        source: ParseFloatError,
    },

    /// The request never produced a response (connect, timeout, body read)
    Transport(reqwest::Error),

    /// The remote service answered with an error
    Remote(EtcdError),

    /// The call's context was cancelled
    Cancelled,

    /// The call's deadline passed before it completed
    DeadlineExceeded,

    /// Invalid configuration
    InvalidConfig(String),

    /// The process-wide handle was already set
    AlreadyInstalled,
}

impl StorageError {
    /// Whether this error means "no value stored under the key"
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { key } => write!(f, "value not found: {}", key),
            StorageError::MalformedValue { key, value, source } => {
                write!(f, "malformed value {:?} at {}: {}", value, key, source)
            }
            StorageError::Transport(err) => write!(f, "transport error: {}", err),
            StorageError::Remote(err) => write!(f, "remote error: {}", err),
            StorageError::Cancelled => write!(f, "operation cancelled"),
            StorageError::DeadlineExceeded => write!(f, "deadline exceeded"),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::AlreadyInstalled => {
                write!(f, "process-wide storage backend is already installed")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::MalformedValue { source, .. } => Some(source),
            StorageError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Transport(err)
    }
}
