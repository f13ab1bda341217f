//! Error types for ocwatch
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad config, bad args, missing credentials, unknown entity)
//! - 3: Blocked (another run holds the run lock)
//! - 4: Operation failed (upstream fetch, HTTP, IO, persistence)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the ocwatch CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for ocwatch operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("User not found in activity store: {0}")]
    UserNotFound(String),

    // Blocked (exit code 3)
    #[error("Another run holds the lock at {0}")]
    LockFailed(PathBuf),

    // Operation failures (exit code 4)
    #[error("Upstream {endpoint} request failed: {message}")]
    Upstream {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Store {store} write failed: {message}")]
    StoreWrite { store: String, message: String },

    #[error("Run finished with failed writes: {}", .0.join(", "))]
    PartialPersist(Vec<String>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::MissingCredential(_)
            | Error::UserNotFound(_) => exit_codes::USER_ERROR,

            Error::LockFailed(_) => exit_codes::BLOCKED,

            Error::Upstream { .. }
            | Error::StoreWrite { .. }
            | Error::PartialPersist(_)
            | Error::Http(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::Base64(_)
            | Error::Pattern(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Code forwarded to the diagnostics sink alongside the message.
    ///
    /// Upstream API errors carry the game API's numeric code; HTTP errors
    /// carry the response status when there is one.
    pub fn diagnostic_code(&self) -> Option<i64> {
        match self {
            Error::Upstream { code, .. } => *code,
            Error::Http(err) => err.status().map(|status| i64::from(status.as_u16())),
            _ => None,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Upstream { endpoint, code, .. } => Some(serde_json::json!({
                "endpoint": endpoint,
                "code": code,
            })),
            Error::StoreWrite { store, .. } => Some(serde_json::json!({ "store": store })),
            Error::PartialPersist(stores) => Some(serde_json::json!({ "stores": stores })),
            Error::LockFailed(path) => Some(serde_json::json!({ "lock": path })),
            _ => None,
        }
    }
}

/// Result type alias for ocwatch operations
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
