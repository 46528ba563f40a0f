//! Error types for control-plane operations.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur talking to the cluster control plane.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to spawn control-plane client: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("apply of {resource} failed: {stderr}")]
    Apply { resource: String, stderr: String },

    #[error("delete of {resource} failed: {stderr}")]
    Delete { resource: String, stderr: String },

    #[error("reading replica count of {workload}: {reason}")]
    ReplicaCount { workload: String, reason: String },

    #[error("manifest is missing field {0}")]
    MalformedManifest(&'static str),

    #[error("{0} does not exist")]
    MissingDependency(String),
}
