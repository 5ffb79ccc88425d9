//! Availability: a fetchable source URL plus declared code and dataset links.

use crate::error::MetricError;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;
use url::Url;

/// Whether the artifact and its declared companions can actually be reached.
pub struct AvailabilityMetric;

#[async_trait]
impl MetricEvaluator for AvailabilityMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::Availability
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let mut score = 0.0;
        if is_fetchable(&snapshot.source_url) {
            score += 0.5;
        }
        if snapshot.code.is_some() {
            score += 0.25;
        }
        if snapshot.dataset.is_some() {
            score += 0.25;
        }
        Ok(Measurement::Scalar(score))
    }
}

fn is_fetchable(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
