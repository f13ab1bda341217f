//! Diagnostics sink
//!
//! Failures that should reach a human are appended to a plain-text error
//! log, one timestamped line each:
//!
//! ```text
//! 2025-01-01T00:00:00.000Z | Code: 2 | Error: Upstream members request failed: Incorrect key
//! ```
//!
//! The sink never fails its caller; if the log itself cannot be written the
//! problem is reported through tracing only.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, warn};

use crate::error::Error;

#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    path: Option<PathBuf>,
}

impl ErrorLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a message with an optional code.
    pub fn record(&self, message: &str, code: Option<i64>) {
        let line = format_line(Utc::now(), message, code);
        error!(code = ?code, "{message}");

        let Some(path) = &self.path else {
            return;
        };

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = written {
            warn!(path = %path.display(), error = %err, "failed to write error log");
        }
    }

    /// Record an error, forwarding its diagnostic code.
    pub fn record_error(&self, err: &Error) {
        self.record(&err.to_string(), err.diagnostic_code());
    }
}

/// Render one log line, including the trailing newline.
pub fn format_line(timestamp: DateTime<Utc>, message: &str, code: Option<i64>) -> String {
    let code = code.map_or_else(|| "null".to_string(), |code| code.to_string());
    format!(
        "{} | Code: {code} | Error: {message}\n",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}
