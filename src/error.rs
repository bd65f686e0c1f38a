//! Error types for the EKS component SDK.
//!
//! Configuration problems are reported as [`ValidationError`](crate::validation::ValidationError)
//! lists by the validator. The types here cover everything else: failures
//! returned by the remote resource provider, composition files that cannot be
//! loaded, and missing environment inputs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by a remote resource provider.
///
/// These are propagated verbatim to the caller and never retried locally.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The provider rejected the request's properties.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider does not implement the operation.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The provider failed for a reason it did not classify.
    #[error("Provider error: {0}")]
    Internal(String),

    /// The provider answered but left out an output the composer depends on.
    #[error("Resource '{resource}' did not report output '{output}'")]
    MissingOutput {
        /// Logical name of the resource.
        resource: String,
        /// Snake-case name of the missing output.
        output: String,
    },

    /// A provider handshake line could not be parsed.
    #[error("Invalid provider handshake: {0}")]
    Handshake(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The `aws-auth` mappings could not be rendered as YAML.
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg)
            | Self::Unimplemented(msg)
            | Self::Internal(msg)
            | Self::Handshake(msg) => msg.clone(),
            Self::MissingOutput { .. }
            | Self::Serialization(_)
            | Self::Yaml(_)
            | Self::Transport(_) => self.to_string(),
        }
    }
}

impl From<tonic::Status> for ProviderError {
    fn from(status: tonic::Status) -> Self {
        let msg = status.message().to_string();
        match status.code() {
            tonic::Code::NotFound => Self::NotFound(msg),
            tonic::Code::AlreadyExists => Self::AlreadyExists(msg),
            tonic::Code::PermissionDenied | tonic::Code::Unauthenticated => {
                Self::PermissionDenied(msg)
            },
            tonic::Code::ResourceExhausted => Self::ResourceExhausted(msg),
            tonic::Code::Unavailable => Self::Unavailable(msg),
            tonic::Code::DeadlineExceeded => Self::DeadlineExceeded(msg),
            tonic::Code::FailedPrecondition | tonic::Code::Aborted => {
                Self::FailedPrecondition(msg)
            },
            tonic::Code::InvalidArgument | tonic::Code::OutOfRange => Self::InvalidRequest(msg),
            tonic::Code::Unimplemented => Self::Unimplemented(msg),
            _ => Self::Internal(msg),
        }
    }
}

/// Errors raised while loading a composition definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the definition file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid composition document.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Path of the definition file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised when a required environment input is absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    /// The variable is not set.
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    /// The variable is set but blank.
    #[error("Environment variable {0} is set but empty")]
    Empty(&'static str),
}
