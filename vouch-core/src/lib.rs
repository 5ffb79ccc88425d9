//! # Vouch Core
//!
//! Trust-scoring and lineage engine for an artifact registry holding models,
//! datasets and code packages.
//!
//! - **Scoring:** eleven independent metric evaluators fanned out concurrently
//!   under a global evaluation budget, combined by a versioned weight table
//!   into a single net score.
//! - **Lineage:** an append-only, acyclic parent→child graph with deterministic
//!   ancestor/descendant traversal.
//! - **Boundaries:** narrow async traits for the artifact registry and the
//!   repository host, with in-memory, JSON-file and GitHub implementations.

pub mod config;
pub mod engine;
pub mod error;
pub mod lineage;
pub mod persistence;
pub mod registry;
pub mod repo_host;
pub mod scoring;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{TrustConfig, load_config};
pub use engine::{CostBreakdown, DependencyCost, SyncSummary, TrustEngine};
pub use error::{
    ConfigError, LineageError, MetricError, RegistryError, RepoHostError, Result, TrustError,
};
pub use lineage::{EdgeInsert, LineageGraph, LineageLink, LineageNode, LineageView, SharedLineage};
pub use registry::{ArtifactRegistry, InMemoryRegistry, JsonFileRegistry, ParentLink};
pub use repo_host::{GitHubClient, OfflineRepoHost, RepoHost, RepoRef};
pub use scoring::aggregator::ScoreAggregator;
pub use scoring::evaluator::{Measurement, MetricEvaluator};
pub use scoring::weights::WeightTable;
pub use scoring::{
    Acceptance, DeviceCapacities, DeviceClass, DeviceScores, MetricKind, ScoreReport, SizeFocus,
    SubScore,
};
pub use types::{ArtifactLink, ArtifactSnapshot, ArtifactType, RelationKind};
