//! Error types for the serialbattery config tool.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=not_found, 4=validation, 5=state, 6=remote, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Every error is terminal to the current operation only. Callers report it
//! and keep running; in-memory state is left as it was before the attempt.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for config tool operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Not Found (exit 3)
    UnknownField,
    MissingLocalFile,
    NothingLoaded,

    // Validation (exit 4)
    ParseError,
    InvalidArgument,

    // State conflict (exit 5)
    UnsavedChanges,
    Cancelled,

    // Remote (exit 6)
    AuthError,
    NetworkError,
    TransferError,

    // Config (exit 7)
    NotConfigured,
    CorruptProfile,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::MissingLocalFile => "MISSING_LOCAL_FILE",
            Self::NothingLoaded => "NOTHING_LOADED",
            Self::ParseError => "PARSE_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnsavedChanges => "UNSAVED_CHANGES",
            Self::Cancelled => "CANCELLED",
            Self::AuthError => "AUTH_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TransferError => "TRANSFER_ERROR",
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::CorruptProfile => "CORRUPT_PROFILE",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code (3-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownField | Self::MissingLocalFile | Self::NothingLoaded => 3,
            Self::ParseError | Self::InvalidArgument => 4,
            Self::UnsavedChanges | Self::Cancelled => 5,
            Self::AuthError | Self::NetworkError | Self::TransferError => 6,
            Self::NotConfigured | Self::CorruptProfile => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether simply re-running the same action may succeed.
    ///
    /// True for transient remote failures. Nothing is retried automatically;
    /// this only tells the caller that a manual re-attempt is sensible.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::TransferError | Self::IoError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while editing or synchronizing a driver config.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown field: {name}")]
    UnknownField { name: String },

    #[error("No config file loaded")]
    NothingLoaded,

    #[error("Remote connection is not configured")]
    NotConfigured,

    #[error("Local config file is missing or invalid: {}", path.display())]
    MissingLocalFile { path: PathBuf },

    #[error("Local config has unsaved changes")]
    UnsavedChanges,

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Authentication failed for {user}@{host}: {message}")]
    Auth {
        host: String,
        user: String,
        message: String,
    },

    #[error("Network error contacting {host}: {message}")]
    Network { host: String, message: String },

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Corrupt connection profile at {} (line {line}): {message}", path.display())]
    CorruptProfile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::UnknownField { .. } => ErrorCode::UnknownField,
            Self::NothingLoaded => ErrorCode::NothingLoaded,
            Self::NotConfigured => ErrorCode::NotConfigured,
            Self::MissingLocalFile { .. } => ErrorCode::MissingLocalFile,
            Self::UnsavedChanges => ErrorCode::UnsavedChanges,
            Self::Cancelled(_) => ErrorCode::Cancelled,
            Self::Auth { .. } => ErrorCode::AuthError,
            Self::Network { .. } => ErrorCode::NetworkError,
            Self::Transfer(_) => ErrorCode::TransferError,
            Self::CorruptProfile { .. } => ErrorCode::CorruptProfile,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotConfigured => Some(
                "Set up the connection first:\n  \
                 sbc profile set --host <host> --user <user> --password <secret> --remote-path <path>"
                    .to_string(),
            ),

            Self::UnknownField { name } => Some(format!(
                "'{name}' is not a field of this file. Use `sbc show <file>` to list fields."
            )),

            Self::NothingLoaded => Some("Load a file first (`load <path>` or `pull`).".to_string()),

            Self::UnsavedChanges => {
                Some("Save the local edits before pushing, or reload to discard them.".to_string())
            }

            Self::MissingLocalFile { .. } => Some(
                "Pull the remote config or pass the path of an existing local file.".to_string(),
            ),

            Self::Cancelled(_) => Some("Pass --yes to confirm non-interactively.".to_string()),

            Self::Auth { .. } => {
                Some("Check the username and password with `sbc profile show`.".to_string())
            }

            Self::Network { .. } => {
                Some("Check the hostname and that the device is reachable.".to_string())
            }

            Self::CorruptProfile { path, .. } => Some(format!(
                "Fix or delete {}, then run `sbc profile set` again.",
                path.display()
            )),

            Self::Parse { .. }
            | Self::Io(_)
            | Self::Transfer(_)
            | Self::Json(_)
            | Self::InvalidArgument(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
