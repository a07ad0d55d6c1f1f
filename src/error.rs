//! Error types for the Basalt Kubernetes operator.

use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Spec validation failed; nothing was written.
    #[error("validation failed for {component}: {message}")]
    Validation {
        /// Component the spec belongs to.
        component: String,
        /// What was wrong with the spec.
        message: String,
    },

    /// The component's external configuration could not be resolved.
    #[error("config resolution failed for {component} (ConfigMap {name}): {message}")]
    ConfigResolution {
        /// Component the config belongs to.
        component: String,
        /// ConfigMap name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A write against the object store failed mid-pass.
    #[error("failed to apply {kind}/{name}: {source}")]
    Apply {
        /// Kind of the object being applied.
        kind: String,
        /// Name of the object being applied.
        name: String,
        /// Underlying API error.
        #[source]
        source: kube::Error,
    },

    /// A version string did not parse as MAJOR.MINOR.PATCH.
    #[error("invalid version string {0:?}")]
    VersionFormat(String),

    /// No reference release line matches the checked version.
    #[error("no known release line matches version {0:?}")]
    UnknownReleaseLine(String),

    /// The cluster object itself is structurally unusable.
    #[error("invalid cluster: {0}")]
    InvalidCluster(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}
