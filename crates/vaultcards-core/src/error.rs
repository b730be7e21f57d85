//! Error types and exit codes for vaultcards
//!
//! Exit codes:
//! - 0: Success (including runs where some chunks failed)
//! - 1: Generic failure (backend unreachable, export failed, ...)
//! - 2: Usage error (bad flags/args, invalid configuration values)
//! - 3: Data error (missing vault, vault is not a directory)

mod macros;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Provider;

/// Exit codes for the vaultcards binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data error - missing or invalid vault (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Why a generation call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Nothing is listening at the configured address
    ConnectionRefused(String),
    /// The server did not answer within the configured timeout
    Timeout,
    /// The server answered with a non-2xx status
    Status { code: u16, body: String },
    /// The server answered 2xx but the envelope could not be decoded
    MalformedEnvelope(String),
    /// Any other transport-level failure
    Transport(String),
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::ConnectionRefused(reason) => {
                write!(f, "connection refused: {}", reason)
            }
            BackendErrorKind::Timeout => write!(f, "request timed out"),
            BackendErrorKind::Status { code, body } if body.is_empty() => {
                write!(f, "server returned status {}", code)
            }
            BackendErrorKind::Status { code, body } => {
                write!(f, "server returned status {}: {}", code, body)
            }
            BackendErrorKind::MalformedEnvelope(reason) => {
                write!(f, "malformed response envelope: {}", reason)
            }
            BackendErrorKind::Transport(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

/// A failed call to a generation backend, tagged with the provider variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} backend: {kind}")]
pub struct BackendError {
    pub provider: Provider,
    pub kind: BackendErrorKind,
}

impl BackendError {
    pub fn new(provider: Provider, kind: BackendErrorKind) -> Self {
        Self { provider, kind }
    }

    /// Transient failures are retried with backoff; everything else is fatal
    /// for the chunk that triggered it.
    pub fn is_transient(&self) -> bool {
        match &self.kind {
            BackendErrorKind::ConnectionRefused(_)
            | BackendErrorKind::Timeout
            | BackendErrorKind::Transport(_) => true,
            BackendErrorKind::Status { code, .. } => *code >= 500,
            BackendErrorKind::MalformedEnvelope(_) => false,
        }
    }

    /// 4xx responses mean the request itself is wrong (model name, endpoint)
    pub fn is_configuration_error(&self) -> bool {
        matches!(&self.kind, BackendErrorKind::Status { code, .. } if (400..500).contains(code))
    }
}

/// Errors that can occur during vaultcards operations
#[derive(Error, Debug)]
pub enum VaultcardsError {
    // Usage errors (exit code 2)
    #[error("{0}")]
    UsageError(String),

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    #[error("unsupported {context}: {value} (supported: {supported})")]
    Unsupported {
        context: String,
        value: String,
        supported: String,
    },

    // Data errors (exit code 3)
    #[error("vault path not found: {path:?}")]
    VaultNotFound { path: PathBuf },

    #[error("vault path is not a directory: {path:?}")]
    NotADirectory { path: PathBuf },

    // Generic failures (exit code 1)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to export flashcards to {path:?}: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("chunking lost coverage of note {note}: {reason}")]
    ChunkingInvariant { note: String, reason: String },

    #[error("failed to {operation} {target}: {reason}")]
    FailedOperationWithTarget {
        operation: String,
        target: String,
        reason: String,
    },

    #[error("run interrupted")]
    Interrupted,

    #[error("{0}")]
    Other(String),
}

impl VaultcardsError {
    /// Create an error for a failed IO operation with context
    pub fn io_operation(
        operation: &str,
        path: impl fmt::Display,
        error: impl fmt::Display,
    ) -> Self {
        VaultcardsError::FailedOperationWithTarget {
            operation: operation.to_string(),
            target: path.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create an error for an invalid value or configuration
    pub fn invalid_value(context: &str, value: impl fmt::Display) -> Self {
        VaultcardsError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an unsupported value
    pub fn unsupported(
        context: &str,
        value: impl fmt::Display,
        supported: impl fmt::Display,
    ) -> Self {
        VaultcardsError::Unsupported {
            context: context.to_string(),
            value: value.to_string(),
            supported: supported.to_string(),
        }
    }

    /// Create an export error for the given destination
    pub fn export(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        VaultcardsError::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            VaultcardsError::UsageError(_)
            | VaultcardsError::InvalidValue { .. }
            | VaultcardsError::Unsupported { .. } => ExitCode::Usage,

            VaultcardsError::VaultNotFound { .. } | VaultcardsError::NotADirectory { .. } => {
                ExitCode::Data
            }

            VaultcardsError::Io(_)
            | VaultcardsError::Json(_)
            | VaultcardsError::Toml(_)
            | VaultcardsError::Yaml(_)
            | VaultcardsError::Backend(_)
            | VaultcardsError::Export { .. }
            | VaultcardsError::ChunkingInvariant { .. }
            | VaultcardsError::FailedOperationWithTarget { .. }
            | VaultcardsError::Interrupted
            | VaultcardsError::Other(_) => ExitCode::Failure,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            VaultcardsError::UsageError(_) => "usage_error",
            VaultcardsError::InvalidValue { .. } => "invalid_value",
            VaultcardsError::Unsupported { .. } => "unsupported",
            VaultcardsError::VaultNotFound { .. } => "vault_not_found",
            VaultcardsError::NotADirectory { .. } => "not_a_directory",
            VaultcardsError::Io(_) => "io_error",
            VaultcardsError::Json(_) => "json_error",
            VaultcardsError::Toml(_) => "toml_error",
            VaultcardsError::Yaml(_) => "yaml_error",
            VaultcardsError::Backend(_) => "backend_error",
            VaultcardsError::Export { .. } => "export_error",
            VaultcardsError::ChunkingInvariant { .. } => "chunking_invariant",
            VaultcardsError::FailedOperationWithTarget { .. } => "failed_operation_with_target",
            VaultcardsError::Interrupted => "interrupted",
            VaultcardsError::Other(_) => "other",
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error_obj = serde_json::json!({
            "code": self.exit_code() as i32,
            "type": self.error_type(),
            "message": self.to_string(),
        });

        if let VaultcardsError::Backend(backend) = self {
            error_obj["provider"] = serde_json::json!(backend.provider.as_str());
            error_obj["transient"] = serde_json::json!(backend.is_transient());
        }

        serde_json::json!({ "error": error_obj })
    }
}

/// Result type alias for vaultcards operations
pub type Result<T> = std::result::Result<T, VaultcardsError>;
