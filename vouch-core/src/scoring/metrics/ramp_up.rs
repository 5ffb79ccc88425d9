//! Ramp-up: README length, setup and usage sections, and examples.

use super::{fenced_blocks, has_section, readme};
use crate::error::MetricError;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator, saturating_scale};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;

const WORD_KNEE: f64 = 200.0;
const WORD_MAX: f64 = 1500.0;

/// How quickly a new user can get productive from the documentation alone.
pub struct RampUpMetric;

#[async_trait]
impl MetricEvaluator for RampUpMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::RampUp
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let text = readme(snapshot);
        let words = text.split_whitespace().count() as f64;

        let mut score = 0.4 * saturating_scale(words, WORD_KNEE, WORD_MAX);
        if has_section(text, &["usage", "quickstart", "quick start", "how to use", "getting started"]) {
            score += 0.2;
        }
        if has_section(text, &["install", "setup", "requirements"]) {
            score += 0.2;
        }
        if !fenced_blocks(text).is_empty() {
            score += 0.2;
        }
        Ok(Measurement::Scalar(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactType;

    async fn value(readme: Option<&str>) -> f64 {
        let mut snapshot = ArtifactSnapshot::new("m", ArtifactType::Model);
        if let Some(text) = readme {
            snapshot = snapshot.with_readme(text);
        }
        match RampUpMetric.measure(&snapshot).await.unwrap() {
            Measurement::Scalar(v) => v,
            other => panic!("unexpected measurement {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_readme() {
        assert_eq!(value(None).await, 0.0);
    }

    #[tokio::test]
    async fn test_structured_readme() {
        let mut text = String::from("# Tool\n## Installation\n```\npip install tool\n```\n## Usage\n");
        text.push_str(&"word ".repeat(1500));
        assert!((value(Some(&text)).await - 1.0).abs() < 1e-12);
    }
}
