//! End-to-end tests of the trust engine against in-memory collaborators.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;

use vouch_core::error::RegistryError;
use vouch_core::registry::ArtifactRegistry;
use vouch_core::repo_host::{RepoMetadata, ReviewStats};
use vouch_core::scoring::metrics::standard_evaluators;
use vouch_core::{
    Acceptance, ArtifactLink, ArtifactSnapshot, ArtifactType, DeviceCapacities, DeviceClass,
    EdgeInsert, InMemoryRegistry, JsonFileRegistry, MetricKind, RepoHost, RepoHostError, RepoRef,
    ScoreAggregator, ScoreReport, SharedLineage, SizeFocus, TrustEngine, TrustError, WeightTable,
};

/// Repository host answering from fixed tables.
#[derive(Default)]
struct StubHost {
    commits: HashMap<String, Vec<u64>>,
    repos: HashMap<String, RepoMetadata>,
    reviews: HashMap<String, ReviewStats>,
}

#[async_trait]
impl RepoHost for StubHost {
    async fn contributor_commits(&self, repo: &RepoRef) -> Result<Vec<u64>, RepoHostError> {
        self.commits
            .get(&repo.to_string())
            .cloned()
            .ok_or(RepoHostError::NotFound { repo: repo.to_string() })
    }

    async fn repository(&self, repo: &RepoRef) -> Result<RepoMetadata, RepoHostError> {
        self.repos
            .get(&repo.to_string())
            .cloned()
            .ok_or(RepoHostError::NotFound { repo: repo.to_string() })
    }

    async fn review_stats(&self, repo: &RepoRef) -> Result<ReviewStats, RepoHostError> {
        self.reviews
            .get(&repo.to_string())
            .copied()
            .ok_or(RepoHostError::NotFound { repo: repo.to_string() })
    }
}

/// Registry that reads from an inner registry but refuses every write.
struct ReadOnlyRegistry(InMemoryRegistry);

#[async_trait]
impl ArtifactRegistry for ReadOnlyRegistry {
    async fn fetch_snapshot(&self, id: &str) -> Result<ArtifactSnapshot, RegistryError> {
        self.0.fetch_snapshot(id).await
    }

    async fn store_score_report(&self, _id: &str, _report: &ScoreReport) -> Result<(), RegistryError> {
        Err(RegistryError::WriteFailed("store is read-only".into()))
    }

    async fn fetch_score_report(&self, id: &str) -> Result<Option<ScoreReport>, RegistryError> {
        self.0.fetch_score_report(id).await
    }

    async fn artifact_ids(&self) -> Result<Vec<String>, RegistryError> {
        self.0.artifact_ids().await
    }

    async fn reset(&self) -> Result<(), RegistryError> {
        Err(RegistryError::WriteFailed("store is read-only".into()))
    }
}

fn stub_host() -> Arc<StubHost> {
    let mut host = StubHost::default();
    host.commits.insert("acme/bert".into(), vec![50, 30, 20]);
    host.repos.insert(
        "acme/bert".into(),
        RepoMetadata {
            archived: false,
            description: Some("BERT fine-tuning".into()),
            license: Some("Apache-2.0".into()),
            stars: 1200,
        },
    );
    host.reviews.insert(
        "acme/bert".into(),
        ReviewStats {
            merged: 10,
            reviewed: 8,
        },
    );
    Arc::new(host)
}

fn engine(registry: Arc<dyn ArtifactRegistry>, host: Arc<dyn RepoHost>) -> TrustEngine {
    let aggregator = ScoreAggregator::new(
        standard_evaluators(host.clone(), DeviceCapacities::default()),
        WeightTable::default(),
    )
    .unwrap();
    TrustEngine::new(registry, host, aggregator, SharedLineage::new())
}

fn bert() -> ArtifactSnapshot {
    ArtifactSnapshot::new("bert", ArtifactType::Model)
        .with_name("bert-base")
        .with_size(440_000_000)
        .with_license("apache-2.0")
        .with_source_url("https://huggingface.co/acme/bert")
        .with_code(ArtifactLink::new("bert-code").with_url("https://github.com/acme/bert"))
        .with_readme("# BERT\n## Usage\n```python\nfrom transformers import AutoModel\n```\n")
}

#[tokio::test]
async fn test_repo_host_metrics_use_stub_data() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    let engine = engine(registry, stub_host());

    let report = engine.compute_score("bert").await.unwrap();
    // 1 - 50/100 spread, 3 contributors below the knee of 5
    let expected_bus = 0.7 * 0.5 + 0.3 * (3.0 / 5.0 * 0.5);
    assert!((report.value(MetricKind::BusFactor) - expected_bus).abs() < 1e-12);
    assert!((report.value(MetricKind::CodeQuality) - 1.0).abs() < 1e-12);
    assert_eq!(report.value(MetricKind::Reviewedness), 0.8);
    assert_eq!(report.value(MetricKind::License), 1.0);
    assert_eq!(report.value(MetricKind::Reproducibility), 1.0);

    let table = WeightTable::default();
    let expected: f64 = report
        .sub_scores
        .iter()
        .map(|s| table.weight(s.metric) * s.value)
        .sum();
    assert!((report.net_score - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_offline_host_degrades_to_neutral() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    let engine = engine(registry, Arc::new(vouch_core::OfflineRepoHost));

    let report = engine.compute_score("bert").await.unwrap();
    assert_eq!(report.value(MetricKind::BusFactor), 0.0);
    assert_eq!(report.value(MetricKind::CodeQuality), 0.0);
    assert_eq!(report.value(MetricKind::Reviewedness), 0.0);
    assert_eq!(report.value(MetricKind::License), 1.0);
}

#[tokio::test]
async fn test_identical_snapshots_get_identical_cards() {
    let registry = Arc::new(InMemoryRegistry::new());
    let twin = |id: &str| {
        let mut s = bert();
        s.id = id.to_string();
        s
    };
    registry.insert(twin("left")).await;
    registry.insert(twin("right")).await;
    let engine = engine(registry, stub_host());

    let left = engine.compute_score("left").await.unwrap();
    let right = engine.compute_score("right").await.unwrap();
    assert_eq!(left.score_card(), right.score_card());

    let again = engine.compute_score("left").await.unwrap();
    assert_eq!(
        serde_json::to_string(&left.score_card()).unwrap(),
        serde_json::to_string(&again.score_card()).unwrap()
    );
}

#[tokio::test]
async fn test_write_failure_carries_report() {
    let inner = InMemoryRegistry::new();
    inner.insert(bert()).await;
    let engine = engine(Arc::new(ReadOnlyRegistry(inner)), stub_host());

    match engine.compute_score("bert").await {
        Err(TrustError::RegistryWriteFailure { id, report, .. }) => {
            assert_eq!(id, "bert");
            assert_eq!(report.artifact_id, "bert");
            assert_eq!(report.sub_scores.len(), MetricKind::ALL.len());
        }
        other => panic!("expected write failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_treescore_follows_parent_reports() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    registry
        .insert(
            ArtifactSnapshot::new("bert-squad", ArtifactType::Model)
                .with_license("MIT")
                .with_parent_model("bert"),
        )
        .await;
    let engine = engine(registry, stub_host());

    // Parent unscored: no lineage context yet.
    let before = engine.compute_score("bert-squad").await.unwrap();
    assert_eq!(before.value(MetricKind::Treescore), 0.0);

    let parent = engine.compute_score("bert").await.unwrap();
    let after = engine.compute_score("bert-squad").await.unwrap();
    assert!((after.value(MetricKind::Treescore) - parent.net_score).abs() < 1e-12);

    let view = engine.get_lineage("bert").await.unwrap();
    let descendants: Vec<&str> = view.descendants.iter().map(|n| n.artifact_id.as_str()).collect();
    assert_eq!(descendants, vec!["bert-squad"]);
}

#[tokio::test]
async fn test_child_report_follows_rescored_parent() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    registry
        .insert(
            ArtifactSnapshot::new("bert-squad", ArtifactType::Model)
                .with_license("MIT")
                .with_parent_model("bert"),
        )
        .await;
    let engine = engine(registry.clone(), stub_host());

    let child = engine.compute_score("bert-squad").await.unwrap();
    assert_eq!(child.value(MetricKind::Treescore), 0.0);

    // Scoring the parent alone refreshes the stored child report.
    let parent = engine.compute_score("bert").await.unwrap();
    let latest = registry.fetch_score_report("bert-squad").await.unwrap().unwrap();
    assert!((latest.value(MetricKind::Treescore) - parent.net_score).abs() < 1e-12);
    assert_eq!(latest.value(MetricKind::License), child.value(MetricKind::License));
    let weight = WeightTable::default().treescore;
    assert!((latest.net_score - (child.net_score + weight * parent.net_score)).abs() < 1e-9);
    assert_eq!(registry.report_history("bert-squad").await.len(), 2);
}

#[tokio::test]
async fn test_linking_parent_refreshes_scored_child() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    registry
        .insert(ArtifactSnapshot::new("distilled", ArtifactType::Model).with_license("MIT"))
        .await;
    registry.insert(ArtifactSnapshot::new("fresh", ArtifactType::Model)).await;
    let engine = engine(registry.clone(), stub_host());

    let parent = engine.compute_score("bert").await.unwrap();
    let before = engine.compute_score("distilled").await.unwrap();
    assert_eq!(before.value(MetricKind::Treescore), 0.0);

    let outcome = engine.insert_lineage_edge("bert", "distilled").await.unwrap();
    assert_eq!(outcome, EdgeInsert::Inserted);
    let latest = registry.fetch_score_report("distilled").await.unwrap().unwrap();
    assert!((latest.value(MetricKind::Treescore) - parent.net_score).abs() < 1e-12);

    // A child that was never scored gets no report from linking.
    engine.insert_lineage_edge("bert", "fresh").await.unwrap();
    assert!(registry.fetch_score_report("fresh").await.unwrap().is_none());
    assert!(!engine.refresh_treescore("fresh").await.unwrap());
}

#[tokio::test]
async fn test_cost_counts_shared_ancestor_once() {
    let registry = Arc::new(InMemoryRegistry::new());
    let model = |id: &str, size: u64| ArtifactSnapshot::new(id, ArtifactType::Model).with_size(size);
    registry.insert(model("base", 1000)).await;
    registry.insert(model("left", 100).with_parent_model("base")).await;
    registry.insert(model("right", 10).with_parent_model("base")).await;
    registry.insert(model("merged", 1)).await;
    let engine = engine(registry, stub_host());

    engine.rebuild_lineage().await.unwrap();
    engine.insert_lineage_edge("left", "merged").await.unwrap();
    engine.insert_lineage_edge("right", "merged").await.unwrap();

    let cost = engine.artifact_cost("merged", true).await.unwrap();
    assert_eq!(cost.standalone_bytes, 1);
    assert_eq!(cost.total_bytes, 1111);
    let deps: Vec<&str> = cost.dependencies.iter().map(|d| d.artifact_id.as_str()).collect();
    assert_eq!(deps, vec!["left", "right", "base"]);

    let alone = engine.artifact_cost("merged", false).await.unwrap();
    assert_eq!(alone.total_bytes, 1);
    assert!(alone.dependencies.is_empty());

    let err = engine.artifact_cost("ghost", true).await.unwrap_err();
    assert!(matches!(err, TrustError::ArtifactNotFound { .. }));
}

#[tokio::test]
async fn test_cost_skips_unregistered_dependencies() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    let engine = engine(registry, stub_host());

    // Declares `bert-code`, which is not in the registry.
    engine.sync_lineage("bert").await.unwrap();
    let cost = engine.artifact_cost("bert", true).await.unwrap();
    assert!(cost.dependencies.is_empty());
    assert_eq!(cost.total_bytes, 440_000_000);
}

#[tokio::test]
async fn test_rejected_artifact_is_promoted_by_rescore() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(ArtifactSnapshot::new("bare", ArtifactType::Model)).await;
    let engine = engine(registry, stub_host());

    assert_eq!(engine.status("bare").await.unwrap(), None);
    let report = engine.compute_score("bare").await.unwrap();
    let Acceptance::Rejected { failing } = engine.acceptance(&report) else {
        panic!("an unlicensed model without a card cannot be accepted");
    };
    assert!(failing.contains(&"license".to_string()));
    assert!(failing.contains(&"net_score".to_string()));
    assert!(!engine.status("bare").await.unwrap().unwrap().is_accepted());

    // Same report under a zero threshold is accepted.
    let lenient = engine.with_min_metric_threshold(0.0);
    lenient.compute_score("bare").await.unwrap();
    assert_eq!(lenient.status("bare").await.unwrap(), Some(Acceptance::Accepted));
}

#[tokio::test]
async fn test_declared_cycle_is_logged_not_surfaced() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry
        .insert(ArtifactSnapshot::new("a", ArtifactType::Model).with_parent_model("b"))
        .await;
    registry
        .insert(ArtifactSnapshot::new("b", ArtifactType::Model).with_parent_model("a"))
        .await;
    let engine = engine(registry, stub_host());

    engine.compute_score("a").await.unwrap();
    engine.compute_score("b").await.unwrap();
    assert_eq!(engine.lineage().edge_count(), 1);

    let summary = engine.sync_lineage("b").await.unwrap();
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.rejected.len(), 1);
}

#[tokio::test]
async fn test_device_focus_changes_net_score() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry
        .insert(ArtifactSnapshot::new("big", ArtifactType::Model).with_size(8_000_000_000))
        .await;
    let engine = engine(registry, stub_host());

    let pi = engine
        .compute_score_with("big", SizeFocus::Device(DeviceClass::RaspberryPi))
        .await
        .unwrap();
    let server = engine
        .compute_score_with("big", SizeFocus::Device(DeviceClass::AwsServer))
        .await
        .unwrap();
    assert!(pi.net_score < server.net_score);
    let size = pi.get(MetricKind::Size).unwrap().devices.unwrap();
    assert_eq!(size.desktop_pc, 1.0);
    assert_eq!(size.raspberry_pi, 0.0625);
}

#[tokio::test]
async fn test_license_check_compares_spdx_ids() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(bert()).await;
    let engine = engine(registry, stub_host());

    assert!(engine.license_check("bert", "https://github.com/acme/bert").await.unwrap());

    let err = engine
        .license_check("bert", "https://github.com/acme/unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, TrustError::RepoHost(RepoHostError::NotFound { .. })));

    let err = engine
        .license_check("ghost", "https://github.com/acme/bert")
        .await
        .unwrap_err();
    assert!(matches!(err, TrustError::ArtifactNotFound { .. }));
}

#[tokio::test]
async fn test_json_registry_round_trip_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    {
        let registry = Arc::new(JsonFileRegistry::open(&path).unwrap());
        registry.insert(bert()).await.unwrap();
        let engine = engine(registry, stub_host());
        engine.compute_score("bert").await.unwrap();
    }

    let registry = Arc::new(JsonFileRegistry::open(&path).unwrap());
    let stored = registry.fetch_score_report("bert").await.unwrap().unwrap();
    assert_eq!(stored.weights_version, "v1");

    let json = stored.to_dashboard_json();
    for metric in MetricKind::ALL {
        assert!(json.get(metric.as_str()).is_some(), "missing {metric}");
        assert!(json.get(format!("{metric}_latency")).is_some());
    }
    assert!(json.get("size_raspberry_pi").is_some());
}
