//! Code quality from repository maintenance signals.

use super::repo_for;
use crate::error::MetricError;
use crate::repo_host::{RepoHost, RepoMetadata};
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator, saturating_scale};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;
use std::sync::Arc;

const STAR_KNEE: f64 = 50.0;
const STAR_MAX: f64 = 1000.0;

/// Maintenance signals of the backing repository.
pub struct CodeQualityMetric {
    host: Arc<dyn RepoHost>,
}

impl CodeQualityMetric {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl MetricEvaluator for CodeQualityMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::CodeQuality
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let repo = repo_for(self.metric(), snapshot)?;
        let meta = self.host.repository(&repo).await?;
        Ok(Measurement::Scalar(code_quality_score(&meta)))
    }
}

pub fn code_quality_score(meta: &RepoMetadata) -> f64 {
    let mut score = 0.0;
    if !meta.archived {
        score += 0.3;
    }
    if meta.license.is_some() {
        score += 0.2;
    }
    if meta.description.is_some() {
        score += 0.2;
    }
    score + 0.3 * saturating_scale(meta.stars as f64, STAR_KNEE, STAR_MAX)
}
