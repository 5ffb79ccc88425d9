//! Error types for the trust engine.
//!
//! Metric failures (`MetricError`) are absorbed inside the aggregator and never
//! reach callers. Registry-boundary and lineage-integrity failures surface
//! through `TrustError`.

use crate::scoring::{MetricKind, ScoreReport};
use thiserror::Error;

/// Top-level error surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("artifact not found: {id}")]
    ArtifactNotFound { id: String },

    #[error("lineage error: {0}")]
    Lineage(#[from] LineageError),

    /// The report was computed but the registry did not persist it.
    #[error("score for '{id}' was computed but not saved: {message}")]
    RegistryWriteFailure {
        id: String,
        message: String,
        report: Box<ScoreReport>,
    },

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("repository host error: {0}")]
    RepoHost(#[from] RepoHostError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<RegistryError> for TrustError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { id } => TrustError::ArtifactNotFound { id },
            other => TrustError::Registry(other),
        }
    }
}

/// Errors from the lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    #[error("edge {parent} -> {child} rejected: it would create a cycle")]
    CycleRejected { parent: String, child: String },
}

/// Errors from the artifact registry boundary.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("artifact '{id}' not found in registry")]
    NotFound { id: String },

    #[error("registry write failed: {0}")]
    WriteFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised while evaluating a single metric. Always recovered locally.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metric '{metric}' timed out after {timeout_ms}ms")]
    Timeout { metric: MetricKind, timeout_ms: u64 },

    #[error("metric '{metric}' is missing input: {input}")]
    MissingInput {
        metric: MetricKind,
        input: &'static str,
    },

    #[error("metric '{metric}' failed: {message}")]
    Evaluation { metric: MetricKind, message: String },

    #[error("repository lookup failed: {0}")]
    RepoHost(#[from] RepoHostError),
}

/// Errors from the repository host client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoHostError {
    #[error("not a recognised repository URL: {0}")]
    InvalidUrl(String),

    #[error("repository {repo} not found")]
    NotFound { repo: String },

    #[error("repository host returned HTTP {status} for {repo}")]
    Status { repo: String, status: u16 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("repository host lookups are disabled")]
    Unavailable,
}

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("configuration parse error: {message}")]
    Parse { message: String },

    #[error("weight table '{version}' is invalid: {reason}")]
    InvalidWeights { version: String, reason: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A type alias for results using the top-level `TrustError`.
pub type Result<T> = std::result::Result<T, TrustError>;
