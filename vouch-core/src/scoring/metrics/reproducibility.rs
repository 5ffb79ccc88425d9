//! Reproducibility: whether the README carries a runnable example.

use super::{fenced_blocks, readme};
use crate::error::MetricError;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;

const RUNNABLE_CUES: &[&str] = &[
    "pip install",
    "import ",
    "from ",
    "from_pretrained",
    "cargo ",
    "npm install",
    "git clone",
    "python ",
];

/// Whether the documentation carries an example a reader could run as-is.
pub struct ReproducibilityMetric;

#[async_trait]
impl MetricEvaluator for ReproducibilityMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::Reproducibility
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let blocks = fenced_blocks(readme(snapshot));
        let score = if blocks.iter().any(|b| is_runnable(b)) {
            1.0
        } else if !blocks.is_empty() {
            0.5
        } else {
            0.0
        };
        Ok(Measurement::Scalar(score))
    }
}

fn is_runnable(block: &str) -> bool {
    block.lines().map(str::trim_start).any(|line| {
        RUNNABLE_CUES.iter().any(|cue| line.starts_with(cue)) || line.contains("from_pretrained")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactType;

    async fn value(readme: &str) -> f64 {
        let snapshot = ArtifactSnapshot::new("m", ArtifactType::Model).with_readme(readme);
        match ReproducibilityMetric.measure(&snapshot).await.unwrap() {
            Measurement::Scalar(v) => v,
            other => panic!("unexpected measurement {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_runnable_example() {
        let readme = "```python\nfrom transformers import AutoModel\nm = AutoModel.from_pretrained('x')\n```";
        assert_eq!(value(readme).await, 1.0);
    }

    #[tokio::test]
    async fn test_fenced_but_not_runnable() {
        assert_eq!(value("```\n{\"hidden_size\": 768}\n```").await, 0.5);
    }

    #[tokio::test]
    async fn test_no_code() {
        assert_eq!(value("Just prose.").await, 0.0);
    }
}
