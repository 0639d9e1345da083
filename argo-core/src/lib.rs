//! Argo Core - shared types for the argo API client layer
//!
//! Holds the orchestration object model, the offline catalog and its loader,
//! client configuration, the per-call context and the error type shared by
//! the client runtime and the CLI.

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod object;

pub use catalog::{load_offline_catalog, OfflineCatalog};
pub use config::{ClientConfig, Mode, ServerConfig, DEFAULT_NAMESPACE};
pub use context::{cancel_pair, AuthToken, CallContext, CancelSignal, Canceller};
pub use error::{ArgoError, ErrorEnvelope};
pub use object::{Manifest, ObjectKind, ObjectMeta, TemplateRef};

/// Result type alias for argo operations
pub type Result<T> = std::result::Result<T, ArgoError>;
