//! Bus factor from the commit distribution of the backing repository.

use super::repo_for;
use crate::error::MetricError;
use crate::repo_host::RepoHost;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator, saturating_scale};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;
use std::sync::Arc;

const CONTRIBUTOR_KNEE: f64 = 5.0;
const CONTRIBUTOR_MAX: f64 = 20.0;

/// How concentrated the commit history is in a few authors.
pub struct BusFactorMetric {
    host: Arc<dyn RepoHost>,
}

impl BusFactorMetric {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl MetricEvaluator for BusFactorMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::BusFactor
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let repo = repo_for(self.metric(), snapshot)?;
        let commits = self.host.contributor_commits(&repo).await?;
        Ok(Measurement::Scalar(bus_factor_score(&commits)))
    }
}

/// Blend of author spread (70%) and contributor count (30%).
pub fn bus_factor_score(commits: &[u64]) -> f64 {
    let total: u64 = commits.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let top = commits.iter().copied().max().unwrap_or(0);
    let spread = 1.0 - top as f64 / total as f64;
    let active = commits.iter().filter(|c| **c > 0).count() as f64;
    0.7 * spread + 0.3 * saturating_scale(active, CONTRIBUTOR_KNEE, CONTRIBUTOR_MAX)
}
