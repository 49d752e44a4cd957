//! Structured error handling for the TTS gateway
//!
//! One error enum covers every failure a synthesis can end with. The protocol
//! client surfaces transport, timeout and backend failures through the same
//! type; callers that need finer handling inspect [`TtsError::kind`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with TtsError
pub type Result<T> = std::result::Result<T, TtsError>;

/// Main error type for the gateway
#[derive(Error, Debug, Clone)]
pub enum TtsError {
    /// Missing or oversized input, caller's fault
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Missing, invalid or expired credential
    #[error("Credential error: {message}")]
    Credential { message: String },

    /// Connection refused, reset or closed unexpectedly
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Deadline exceeded without a terminal event
    #[error("Synthesis timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Explicit failure event from the remote task
    #[error("Backend task failed: {message}")]
    BackendTask {
        code: Option<String>,
        message: String,
    },

    /// Upload failure from the delivery sink
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Internal/bug errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification of a [`TtsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Credential,
    Transport,
    Timeout,
    BackendTask,
    Storage,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Credential => "credential",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BackendTask => "backend_task",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl TtsError {
    /// Create validation error bound to a request field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create credential error
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create timeout error
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create backend task error
    pub fn backend(code: Option<String>, message: impl Into<String>) -> Self {
        Self::BackendTask {
            code,
            message: message.into(),
        }
    }

    /// Create storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classification tag
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Credential { .. } => ErrorKind::Credential,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::BackendTask { .. } => ErrorKind::BackendTask,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Config { .. } => ErrorKind::Config,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a caller may reasonably retry the whole invocation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// HTTP status the front door reports for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            _ => 500,
        }
    }
}

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add a simple message context
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| TtsError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

impl From<std::io::Error> for TtsError {
    fn from(err: std::io::Error) -> Self {
        TtsError::Storage {
            message: err.to_string(),
        }
    }
}
