//! Error types for argo client operations

use crate::object::ObjectKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Error body returned by the Argo Server (grpc-gateway shape).
///
/// `code` is the gRPC status code; only `message` is shown to users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ArgoError {
    #[error("failed to read offline manifest {}: {source}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse offline manifest {}: {message}", .path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// Offline session cannot proceed; the top-level caller must terminate.
    #[error("invalid offline configuration: {0}")]
    FatalConfig(Box<ArgoError>),

    #[error("cannot connect to Argo Server at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("Argo Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("operation cancelled by caller")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: ObjectKind, name: String },

    #[error("{operation} is not supported in offline mode")]
    OfflineUnsupported { operation: String },

    #[error("lint failed for {name}: {message}")]
    Lint { name: String, message: String },

    #[error("expected a {expected}, got a {found}")]
    WrongKind {
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArgoError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn offline_unsupported(operation: impl Into<String>) -> Self {
        Self::OfflineUnsupported {
            operation: operation.into(),
        }
    }

    pub fn lint(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lint {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Promote an error into the fatal configuration kind.
    pub fn fatal(self) -> Self {
        match self {
            fatal @ Self::FatalConfig(_) => fatal,
            other => Self::FatalConfig(Box::new(other)),
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalConfig(_))
    }

    /// Caller-initiated abort, either explicit or by deadline
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Worth retrying without changing configuration
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Short machine-readable code, used for `--json` error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ManifestRead { .. } => "manifest_read",
            Self::ManifestParse { .. } => "manifest_parse",
            Self::FatalConfig(_) => "fatal_config",
            Self::Connection { .. } => "connection_error",
            Self::Api { .. } => "api_error",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound { .. } => "not_found",
            Self::OfflineUnsupported { .. } => "offline_unsupported",
            Self::Lint { .. } => "lint_error",
            Self::WrongKind { .. } => "wrong_kind",
            Self::ConfigParse(_) => "config_parse",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}
