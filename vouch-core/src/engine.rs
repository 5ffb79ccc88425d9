//! The trust engine: scoring, lineage and license checks over an injected
//! registry and repository host.

use crate::config::TrustConfig;
use crate::error::{LineageError, RegistryError, Result, TrustError};
use crate::lineage::{EdgeInsert, LineageNode, LineageView, SharedLineage};
use crate::registry::ArtifactRegistry;
use crate::repo_host::{GitHubClient, OfflineRepoHost, RepoHost, RepoRef};
use crate::scoring::aggregator::ScoreAggregator;
use crate::scoring::{
    Acceptance, DEFAULT_MIN_METRIC_THRESHOLD, MetricKind, ScoreReport, SizeFocus,
};
use crate::types::{ArtifactSnapshot, RelationKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of inserting an artifact's declared links into the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub inserted: usize,
    /// Links already present in the graph.
    pub existing: usize,
    pub rejected: Vec<LineageError>,
}

/// Metrics that depend on the scores of parent models.
const LINEAGE_METRICS: [MetricKind; 1] = [MetricKind::Treescore];

/// Size of one ancestor counted in a [`CostBreakdown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCost {
    pub artifact_id: String,
    pub size_bytes: u64,
}

/// Storage cost of an artifact, optionally with everything it derives from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub artifact_id: String,
    pub standalone_bytes: u64,
    /// Standalone size plus each listed dependency, each counted once.
    pub total_bytes: u64,
    /// Registered ancestors, nearest first.
    pub dependencies: Vec<DependencyCost>,
}

pub struct TrustEngine {
    registry: Arc<dyn ArtifactRegistry>,
    repo_host: Arc<dyn RepoHost>,
    aggregator: ScoreAggregator,
    lineage: SharedLineage,
    sync_on_score: bool,
    min_metric_threshold: f64,
}

impl TrustEngine {
    pub fn new(
        registry: Arc<dyn ArtifactRegistry>,
        repo_host: Arc<dyn RepoHost>,
        aggregator: ScoreAggregator,
        lineage: SharedLineage,
    ) -> Self {
        Self {
            registry,
            repo_host,
            aggregator,
            lineage,
            sync_on_score: true,
            min_metric_threshold: DEFAULT_MIN_METRIC_THRESHOLD,
        }
    }

    /// Build the standard engine from configuration.
    ///
    /// With `repo_host.enabled = false` every host-backed metric scores neutral.
    pub fn from_config(config: &TrustConfig, registry: Arc<dyn ArtifactRegistry>) -> Result<Self> {
        config.validate()?;
        let repo_host: Arc<dyn RepoHost> = if config.repo_host.enabled {
            Arc::new(GitHubClient::new(&config.repo_host)?)
        } else {
            Arc::new(OfflineRepoHost)
        };
        let aggregator = ScoreAggregator::from_config(&config.scoring, repo_host.clone())?;
        Ok(Self::new(registry, repo_host, aggregator, SharedLineage::new())
            .with_sync_on_score(config.lineage.sync_on_score)
            .with_min_metric_threshold(config.scoring.min_metric_threshold))
    }

    pub fn with_sync_on_score(mut self, enabled: bool) -> Self {
        self.sync_on_score = enabled;
        self
    }

    pub fn with_min_metric_threshold(mut self, threshold: f64) -> Self {
        self.min_metric_threshold = threshold;
        self
    }

    pub fn lineage(&self) -> &SharedLineage {
        &self.lineage
    }

    pub fn aggregator(&self) -> &ScoreAggregator {
        &self.aggregator
    }

    pub fn registry(&self) -> &Arc<dyn ArtifactRegistry> {
        &self.registry
    }

    /// Score an artifact with the size metric averaged over device classes.
    pub async fn compute_score(&self, artifact_id: &str) -> Result<ScoreReport> {
        self.compute_score_with(artifact_id, SizeFocus::Mean).await
    }

    /// Fetch, score and store a new report for `artifact_id`.
    ///
    /// If the registry refuses the report, the error carries the computed
    /// report; it is not durable.
    pub async fn compute_score_with(
        &self,
        artifact_id: &str,
        focus: SizeFocus,
    ) -> Result<ScoreReport> {
        let snapshot = self.registry.fetch_snapshot(artifact_id).await?;
        let previous = self.registry.fetch_score_report(artifact_id).await?;

        if self.sync_on_score {
            let summary = self.sync_snapshot(&snapshot).await?;
            for rejected in &summary.rejected {
                warn!(artifact = artifact_id, error = %rejected, "Declared link skipped");
            }
        }

        let parent_scores = self.parent_net_scores(&snapshot).await?;
        let snapshot = snapshot.with_parent_net_scores(parent_scores);
        let report = self.aggregator.score_with(&snapshot, focus).await;

        let report = self.store_report(previous.as_ref(), report).await?;
        self.refresh_children(artifact_id).await;
        Ok(report)
    }

    /// Persist a report and log whether it admits the artifact.
    async fn store_report(
        &self,
        previous: Option<&ScoreReport>,
        report: ScoreReport,
    ) -> Result<ScoreReport> {
        let artifact_id = report.artifact_id.clone();
        if let Err(e) = self.registry.store_score_report(&artifact_id, &report).await {
            warn!(artifact = %artifact_id, error = %e, "Score report not stored");
            return Err(TrustError::RegistryWriteFailure {
                id: artifact_id,
                message: e.to_string(),
                report: Box::new(report),
            });
        }

        let was_rejected = previous.is_some_and(|p| !self.acceptance(p).is_accepted());
        match self.acceptance(&report) {
            Acceptance::Accepted if was_rejected => {
                info!(artifact = %artifact_id, net_score = report.net_score, "Artifact promoted")
            }
            Acceptance::Accepted => {
                debug!(artifact = %artifact_id, net_score = report.net_score, "Artifact accepted")
            }
            Acceptance::Rejected { failing } => info!(
                artifact = %artifact_id,
                threshold = self.min_metric_threshold,
                ?failing,
                "Artifact rejected"
            ),
        }
        Ok(report)
    }

    /// Accepted when every score in `report` reaches the minimum metric threshold.
    pub fn acceptance(&self, report: &ScoreReport) -> Acceptance {
        report.acceptance(self.min_metric_threshold)
    }

    /// Acceptance of the latest stored report; `None` if never scored.
    pub async fn status(&self, artifact_id: &str) -> Result<Option<Acceptance>> {
        self.registry.fetch_snapshot(artifact_id).await?;
        let latest = self.registry.fetch_score_report(artifact_id).await?;
        Ok(latest.map(|report| self.acceptance(&report)))
    }

    /// Recompute the lineage metrics of `child_id` from its parents' latest
    /// net scores and store the refreshed report.
    ///
    /// Returns false, without scoring, when the child has no stored report.
    pub async fn refresh_treescore(&self, child_id: &str) -> Result<bool> {
        let Some(previous) = self.registry.fetch_score_report(child_id).await? else {
            debug!(artifact = child_id, "Never scored, treescore refresh skipped");
            return Ok(false);
        };
        let snapshot = self.registry.fetch_snapshot(child_id).await?;
        let parent_scores = self.parent_net_scores(&snapshot).await?;
        let snapshot = snapshot.with_parent_net_scores(parent_scores);

        let report = self
            .aggregator
            .rescore(&previous, &snapshot, &LINEAGE_METRICS)
            .await;
        self.store_report(Some(&previous), report).await?;
        Ok(true)
    }

    /// Refresh the direct model children of `parent_id`. Failures are logged.
    async fn refresh_children(&self, parent_id: &str) {
        for (child, relation) in self.lineage.children(parent_id) {
            if relation != RelationKind::ParentModel {
                continue;
            }
            if let Err(e) = self.refresh_treescore(&child.artifact_id).await {
                warn!(
                    parent = parent_id,
                    child = %child.artifact_id,
                    error = %e,
                    "Treescore refresh failed"
                );
            }
        }
    }

    /// Net scores of the parent models that have a stored report.
    ///
    /// Parents come from the declared links and from the lineage graph.
    async fn parent_net_scores(&self, snapshot: &ArtifactSnapshot) -> Result<Vec<f64>> {
        let mut parents: BTreeSet<String> = snapshot
            .declared_links()
            .into_iter()
            .filter(|(relation, _)| *relation == RelationKind::ParentModel)
            .map(|(_, id)| id)
            .collect();
        parents.extend(
            self.lineage
                .parents(&snapshot.id)
                .into_iter()
                .filter(|(_, relation)| *relation == RelationKind::ParentModel)
                .map(|(node, _)| node.artifact_id),
        );

        let mut scores = Vec::new();
        for parent_id in parents {
            match self.registry.fetch_score_report(&parent_id).await? {
                Some(report) => scores.push(report.net_score),
                None => debug!(artifact = %snapshot.id, parent = %parent_id, "Parent has no score yet"),
            }
        }
        Ok(scores)
    }

    /// Ancestors and descendants of a registered artifact.
    pub async fn get_lineage(&self, artifact_id: &str) -> Result<LineageView> {
        self.registry.fetch_snapshot(artifact_id).await?;
        Ok(self.lineage.view(artifact_id))
    }

    /// Record that `child_id` derives from `parent_id`.
    ///
    /// Both artifacts must be registered; the relation follows the parent's type.
    pub async fn insert_lineage_edge(&self, parent_id: &str, child_id: &str) -> Result<EdgeInsert> {
        let parent = self.registry.fetch_snapshot(parent_id).await?;
        let child = self.registry.fetch_snapshot(child_id).await?;
        let relation = RelationKind::for_parent_type(parent.artifact_type);

        let outcome = self.lineage.insert_edge(
            LineageNode::new(parent.id, parent.artifact_type),
            LineageNode::new(child.id, child.artifact_type),
            relation,
        )?;
        info!(parent = parent_id, child = child_id, %relation, ?outcome, "Lineage edge");

        if outcome == EdgeInsert::Inserted
            && relation == RelationKind::ParentModel
            && let Err(e) = self.refresh_treescore(child_id).await
        {
            warn!(child = child_id, error = %e, "Treescore refresh failed");
        }
        Ok(outcome)
    }

    /// Size of an artifact, plus its registered ancestors when
    /// `include_dependencies` is set.
    ///
    /// Ancestors missing from the registry add nothing.
    pub async fn artifact_cost(
        &self,
        artifact_id: &str,
        include_dependencies: bool,
    ) -> Result<CostBreakdown> {
        let snapshot = self.registry.fetch_snapshot(artifact_id).await?;

        let mut dependencies = Vec::new();
        if include_dependencies {
            for ancestor in self.lineage.ancestors(artifact_id) {
                match self.registry.fetch_snapshot(&ancestor.artifact_id).await {
                    Ok(dep) => dependencies.push(DependencyCost {
                        artifact_id: dep.id,
                        size_bytes: dep.size_bytes,
                    }),
                    Err(RegistryError::NotFound { id }) => debug!(
                        artifact = artifact_id,
                        dependency = %id,
                        "Unregistered dependency skipped"
                    ),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let total_bytes = dependencies
            .iter()
            .fold(snapshot.size_bytes, |sum, dep| sum.saturating_add(dep.size_bytes));
        Ok(CostBreakdown {
            artifact_id: snapshot.id,
            standalone_bytes: snapshot.size_bytes,
            total_bytes,
            dependencies,
        })
    }

    /// Insert every link the artifact declares as an edge into the graph.
    ///
    /// Cycles are collected in the summary rather than failing the sync.
    pub async fn sync_lineage(&self, artifact_id: &str) -> Result<SyncSummary> {
        let snapshot = self.registry.fetch_snapshot(artifact_id).await?;
        self.sync_snapshot(&snapshot).await
    }

    async fn sync_snapshot(&self, snapshot: &ArtifactSnapshot) -> Result<SyncSummary> {
        let links = self.registry.fetch_parent_links(&snapshot.id).await?;
        let child = LineageNode::new(snapshot.id.clone(), snapshot.artifact_type);
        self.lineage.add_node(child.clone());

        let mut summary = SyncSummary::default();
        for link in links {
            let parent = LineageNode::new(link.linked_id, link.relation.parent_type());
            match self.lineage.insert_edge(parent, child.clone(), link.relation) {
                Ok(EdgeInsert::Inserted) => summary.inserted += 1,
                Ok(EdgeInsert::AlreadyPresent) => summary.existing += 1,
                Err(e) => summary.rejected.push(e),
            }
        }
        debug!(
            artifact = %snapshot.id,
            inserted = summary.inserted,
            rejected = summary.rejected.len(),
            "Lineage synced"
        );
        Ok(summary)
    }

    /// Sync the declared links of every registered artifact.
    pub async fn rebuild_lineage(&self) -> Result<SyncSummary> {
        let mut total = SyncSummary::default();
        for id in self.registry.artifact_ids().await? {
            let summary = self.sync_lineage(&id).await?;
            total.inserted += summary.inserted;
            total.existing += summary.existing;
            total.rejected.extend(summary.rejected);
        }
        info!(
            nodes = self.lineage.node_count(),
            edges = self.lineage.edge_count(),
            rejected = total.rejected.len(),
            "Lineage rebuilt from registry"
        );
        Ok(total)
    }

    /// Whether the artifact's license matches the repository's SPDX license.
    ///
    /// A repository without a recognised license never matches.
    pub async fn license_check(&self, artifact_id: &str, repo_url: &str) -> Result<bool> {
        let snapshot = self.registry.fetch_snapshot(artifact_id).await?;
        let repo = RepoRef::parse(repo_url)?;
        let metadata = self.repo_host.repository(&repo).await?;

        let artifact_license = snapshot.license.trim();
        let compatible = match metadata.license.as_deref() {
            Some(repo_license) if !artifact_license.is_empty() => {
                repo_license.trim().eq_ignore_ascii_case(artifact_license)
            }
            _ => false,
        };
        info!(
            artifact = artifact_id,
            repo = %repo,
            artifact_license,
            repo_license = metadata.license.as_deref().unwrap_or("none"),
            compatible,
            "License check"
        );
        Ok(compatible)
    }

    /// Clear the registry and the lineage graph.
    pub async fn reset(&self) -> Result<()> {
        self.registry.reset().await?;
        self.lineage.clear();
        warn!("Registry and lineage graph reset");
        Ok(())
    }
}
