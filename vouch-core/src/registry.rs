//! Artifact registry boundary and two reference implementations.
//!
//! The engine only ever talks to `dyn ArtifactRegistry`; storage clients are
//! owned by the implementation handed to it.

use crate::error::RegistryError;
use crate::persistence::{atomic_write_json, load_json};
use crate::scoring::ScoreReport;
use crate::types::{ArtifactSnapshot, RelationKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A declared dependency of an artifact; `linked_id` is the parent side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub relation: RelationKind,
    pub linked_id: String,
}

#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    async fn fetch_snapshot(&self, id: &str) -> Result<ArtifactSnapshot, RegistryError>;

    /// Persist a new report. Earlier reports for the artifact are kept.
    async fn store_score_report(
        &self,
        id: &str,
        report: &ScoreReport,
    ) -> Result<(), RegistryError>;

    /// Latest stored report, if the artifact was ever scored.
    async fn fetch_score_report(&self, id: &str) -> Result<Option<ScoreReport>, RegistryError>;

    async fn artifact_ids(&self) -> Result<Vec<String>, RegistryError>;

    /// Remove every artifact and report.
    async fn reset(&self) -> Result<(), RegistryError>;

    /// Links declared on the artifact record.
    async fn fetch_parent_links(&self, id: &str) -> Result<Vec<ParentLink>, RegistryError> {
        let snapshot = self.fetch_snapshot(id).await?;
        Ok(snapshot
            .declared_links()
            .into_iter()
            .map(|(relation, linked_id)| ParentLink {
                relation,
                linked_id,
            })
            .collect())
    }
}

/// Registry contents, shared by both implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryState {
    pub artifacts: BTreeMap<String, ArtifactSnapshot>,
    /// Report history per artifact, oldest first.
    pub reports: BTreeMap<String, Vec<ScoreReport>>,
}

impl RegistryState {
    fn snapshot(&self, id: &str) -> Result<ArtifactSnapshot, RegistryError> {
        self.artifacts
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    fn push_report(&mut self, id: &str, report: &ScoreReport) -> Result<(), RegistryError> {
        if !self.artifacts.contains_key(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }
        self.reports
            .entry(id.to_string())
            .or_default()
            .push(report.clone());
        Ok(())
    }

    fn latest_report(&self, id: &str) -> Option<ScoreReport> {
        self.reports.get(id).and_then(|h| h.last()).cloned()
    }

    fn upsert(&mut self, snapshot: ArtifactSnapshot) {
        self.artifacts.insert(snapshot.id.clone(), snapshot);
    }
}

/// Registry held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an artifact record.
    pub async fn insert(&self, snapshot: ArtifactSnapshot) {
        self.state.write().await.upsert(snapshot);
    }

    /// Every stored report for `id`, oldest first.
    pub async fn report_history(&self, id: &str) -> Vec<ScoreReport> {
        self.state
            .read()
            .await
            .reports
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactRegistry for InMemoryRegistry {
    async fn fetch_snapshot(&self, id: &str) -> Result<ArtifactSnapshot, RegistryError> {
        self.state.read().await.snapshot(id)
    }

    async fn store_score_report(
        &self,
        id: &str,
        report: &ScoreReport,
    ) -> Result<(), RegistryError> {
        self.state.write().await.push_report(id, report)
    }

    async fn fetch_score_report(&self, id: &str) -> Result<Option<ScoreReport>, RegistryError> {
        Ok(self.state.read().await.latest_report(id))
    }

    async fn artifact_ids(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.state.read().await.artifacts.keys().cloned().collect())
    }

    async fn reset(&self) -> Result<(), RegistryError> {
        *self.state.write().await = RegistryState::default();
        Ok(())
    }
}

/// Registry persisted as a single JSON document.
///
/// Every mutation is applied to a copy, written with write-then-rename, and
/// only then made visible, so a failed save changes nothing.
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl JsonFileRegistry {
    /// Open the registry at `path`; a missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let state: RegistryState = load_json(&path)?.unwrap_or_default();
        info!(
            path = %path.display(),
            artifacts = state.artifacts.len(),
            "Opened registry file"
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or replace an artifact record.
    pub async fn insert(&self, snapshot: ArtifactSnapshot) -> Result<(), RegistryError> {
        self.mutate(|state| {
            state.upsert(snapshot);
            Ok(())
        })
        .await
    }

    async fn mutate<F>(&self, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut RegistryState) -> Result<(), RegistryError> + Send,
    {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        f(&mut next)?;
        atomic_write_json(&self.path, &next)
            .map_err(|e| RegistryError::WriteFailed(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "Registry saved");
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl ArtifactRegistry for JsonFileRegistry {
    async fn fetch_snapshot(&self, id: &str) -> Result<ArtifactSnapshot, RegistryError> {
        self.state.lock().await.snapshot(id)
    }

    async fn store_score_report(
        &self,
        id: &str,
        report: &ScoreReport,
    ) -> Result<(), RegistryError> {
        self.mutate(|state| state.push_report(id, report)).await
    }

    async fn fetch_score_report(&self, id: &str) -> Result<Option<ScoreReport>, RegistryError> {
        Ok(self.state.lock().await.latest_report(id))
    }

    async fn artifact_ids(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.state.lock().await.artifacts.keys().cloned().collect())
    }

    async fn reset(&self) -> Result<(), RegistryError> {
        self.mutate(|state| {
            *state = RegistryState::default();
            Ok(())
        })
        .await
    }
}
