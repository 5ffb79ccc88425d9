//! Dataset documentation coverage for artifacts with a linked dataset.

use super::{count_cues, readme};
use crate::error::MetricError;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;

const DATASET_CUES: &[&str] = &[
    "dataset",
    "training data",
    "split",
    "license",
    "preprocess",
    "bias",
    "limitation",
    "citation",
];

/// Documentation of the dataset an artifact was trained or evaluated on.
pub struct DatasetQualityMetric;

#[async_trait]
impl MetricEvaluator for DatasetQualityMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::DatasetQuality
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        if snapshot.dataset.is_none() {
            return Ok(Measurement::Scalar(0.0));
        }
        let found = count_cues(readme(snapshot), DATASET_CUES) as f64;
        Ok(Measurement::Scalar(0.5 + 0.5 * found / DATASET_CUES.len() as f64))
    }
}
