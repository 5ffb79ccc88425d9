//! Treescore: mean net score of the parent models.

use crate::error::MetricError;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::scoring::{MetricKind, clamp01};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;

/// Mean net score of the artifact's parent models.
pub struct TreescoreMetric;

#[async_trait]
impl MetricEvaluator for TreescoreMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::Treescore
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let parents = &snapshot.parent_net_scores;
        if parents.is_empty() {
            return Ok(Measurement::Scalar(0.0));
        }
        let sum: f64 = parents.iter().copied().map(clamp01).sum();
        Ok(Measurement::Scalar(sum / parents.len() as f64))
    }
}
