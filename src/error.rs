//! Error types for repdesk
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid config, unknown task or rep)
//! - 4: Operation failed (I/O, serialization, lock contention)
//!
//! The reconciliation engine itself never returns these for data-shape
//! problems; they come from the file adapter, the config layer and the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the repdesk CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for repdesk operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Data directory not found: {0}")]
    StoreNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown task window: {0}")]
    InvalidWindow(String),

    #[error("Representative not found: {0}")]
    RepNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StoreNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidWindow(_)
            | Error::RepNotFound(_)
            | Error::TaskNotFound(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for the JSON error envelope, when there are any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::StoreNotFound(path) | Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path.to_string_lossy() }))
            }
            Error::TaskNotFound(uid) => Some(serde_json::json!({ "uid": uid })),
            Error::RepNotFound(rep) => Some(serde_json::json!({ "rep": rep })),
            _ => None,
        }
    }
}

/// Result type alias for repdesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
