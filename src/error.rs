//! Error types for TLS fixture provisioning.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{ConnectionRole, ImplementationType};

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Environment variable {key} is not valid unicode")]
    NotUnicode { key: String },
}

/// Errors raised at the container runtime boundary.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Docker is not reachable.
    #[error("Docker not available: {reason}")]
    Unavailable {
        /// Reason why Docker is unavailable.
        reason: String,
    },

    /// The container does not exist (anymore).
    #[error("No such container: {id}")]
    NotFound {
        /// Container id or name that was looked up.
        id: String,
    },

    /// Any other error returned by the runtime API.
    #[error("Docker API error: {0}")]
    Api(String),
}

/// Reasons a profile document failed to load. Never fatal for the store.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid version pattern '{pattern}' in {path}: {reason}")]
    Pattern {
        path: PathBuf,
        pattern: String,
        reason: String,
    },

    #[error("Profile {path} declares role {declared} but lives in the {expected} directory")]
    RoleMismatch {
        path: PathBuf,
        declared: ConnectionRole,
        expected: ConnectionRole,
    },
}

/// Why a server endpoint was declared not ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// The deadline passed without a successful connection.
    Timeout(Duration),
    /// The wait was interrupted by the caller.
    Interrupted,
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyReason::Timeout(timeout) => write!(f, "timeout after {:?}", timeout),
            NotReadyReason::Interrupted => write!(f, "interrupted while waiting for server"),
        }
    }
}

/// Errors that abort a provisioning request.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No version-specific profile matched and no default is registered.
    #[error("Could not find a profile for {role}: {kind}:{version}")]
    ProfileNotFound {
        role: ConnectionRole,
        kind: ImplementationType,
        version: String,
    },

    /// No image properties are registered for the pair.
    #[error("Could not find properties for {role}: {kind}")]
    PropertiesNotFound {
        role: ConnectionRole,
        kind: ImplementationType,
    },

    /// A required input was missing when building the launch spec.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The runtime rejected a container lifecycle call.
    #[error("Failed to {operation} container '{container}': {reason}")]
    Lifecycle {
        container: String,
        operation: &'static str,
        reason: String,
    },

    /// The host port bound to the internal port could not be determined.
    #[error("Could not resolve port of container '{container}': {reason}")]
    PortResolution { container: String, reason: String },

    /// The server never accepted a connection.
    #[error("Container '{container}' did not start: {reason}")]
    DidNotStart {
        container: String,
        reason: NotReadyReason,
        /// Output captured from the container for diagnosis.
        logs: String,
    },

    /// Listing images for version discovery failed.
    #[error("Could not retrieve available {role} versions for {kind}: {reason}")]
    Discovery {
        role: ConnectionRole,
        kind: ImplementationType,
        reason: String,
    },

    /// Reading the resource tree failed as a whole.
    #[error("Failed to load {path}: {reason}")]
    Resources { path: PathBuf, reason: String },
}

impl ProvisionError {
    /// Whether this failure happened before any container was created.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            ProvisionError::ProfileNotFound { .. } | ProvisionError::PropertiesNotFound { .. }
        )
    }

    /// Whether the runtime reported this failure.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            ProvisionError::Lifecycle { .. } | ProvisionError::PortResolution { .. }
        )
    }

    pub(crate) fn lifecycle(container: &str, operation: &'static str, err: RuntimeError) -> Self {
        ProvisionError::Lifecycle {
            container: container.to_string(),
            operation,
            reason: err.to_string(),
        }
    }
}
