//! Benchmark evidence in the model card.

use super::{count_cues, readme};
use crate::error::MetricError;
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator, saturating_scale};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;

const BENCHMARK_CUES: &[&str] = &[
    "benchmark",
    "accuracy",
    "f1",
    "bleu",
    "rouge",
    "perplexity",
    "precision",
    "recall",
    "exact match",
    "evaluation",
    "results",
];
const CUE_KNEE: f64 = 2.0;
const CUE_MAX: f64 = 6.0;
const TABLE_BONUS: f64 = 0.2;

/// Evidence backing the performance the artifact claims.
pub struct PerformanceClaimsMetric;

#[async_trait]
impl MetricEvaluator for PerformanceClaimsMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::PerformanceClaims
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let text = readme(snapshot);
        let cues = count_cues(text, BENCHMARK_CUES) as f64;
        let mut score = saturating_scale(cues, CUE_KNEE, CUE_MAX);
        if has_numeric_table_row(text) {
            score += TABLE_BONUS;
        }
        Ok(Measurement::Scalar(score))
    }
}

/// A markdown table row with at least one cell that parses as a number.
fn has_numeric_table_row(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('|') && line.ends_with('|'))
        .any(|row| {
            row.split('|')
                .map(|cell| cell.trim().trim_end_matches('%'))
                .any(|cell| !cell.is_empty() && cell.parse::<f64>().is_ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactType;

    async fn value(readme: &str) -> f64 {
        let snapshot = ArtifactSnapshot::new("m", ArtifactType::Model).with_readme(readme);
        match PerformanceClaimsMetric.measure(&snapshot).await.unwrap() {
            Measurement::Scalar(v) => v,
            other => panic!("unexpected measurement {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_claims() {
        assert_eq!(value("A small model.").await, 0.0);
    }

    #[tokio::test]
    async fn test_claims_with_results_table() {
        let readme = "## Evaluation results\n\n| task | accuracy | F1 |\n|---|---|---|\n| SQuAD | 88.5% | 91.2 |\n";
        // evaluation, results, accuracy, f1 -> 4 cues -> 0.75, plus the table bonus
        assert!((value(readme).await - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_separator_row_is_not_numeric() {
        assert!(!has_numeric_table_row("| a | b |\n|---|---|"));
    }
}
