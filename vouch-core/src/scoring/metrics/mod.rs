//! The standard metric evaluators, one per quality dimension.

mod availability;
mod bus_factor;
mod code_quality;
mod dataset_quality;
mod license;
mod performance_claims;
mod ramp_up;
mod reproducibility;
mod reviewedness;
mod size;
mod treescore;

pub use availability::AvailabilityMetric;
pub use bus_factor::{BusFactorMetric, bus_factor_score};
pub use code_quality::{CodeQualityMetric, code_quality_score};
pub use dataset_quality::DatasetQualityMetric;
pub use license::{LicenseClass, LicenseMetric, classify, license_score};
pub use performance_claims::PerformanceClaimsMetric;
pub use ramp_up::RampUpMetric;
pub use reproducibility::ReproducibilityMetric;
pub use reviewedness::{ReviewednessMetric, reviewedness_score};
pub use size::{SizeMetric, size_score};
pub use treescore::TreescoreMetric;

use crate::error::MetricError;
use crate::repo_host::{RepoHost, RepoRef};
use crate::scoring::evaluator::MetricEvaluator;
use crate::scoring::{DeviceCapacities, MetricKind};
use crate::types::ArtifactSnapshot;
use std::sync::Arc;

/// Build the full evaluator set, ordered like [`MetricKind::ALL`].
pub fn standard_evaluators(
    host: Arc<dyn RepoHost>,
    capacities: DeviceCapacities,
) -> Vec<Arc<dyn MetricEvaluator>> {
    vec![
        Arc::new(AvailabilityMetric),
        Arc::new(BusFactorMetric::new(host.clone())),
        Arc::new(CodeQualityMetric::new(host.clone())),
        Arc::new(DatasetQualityMetric),
        Arc::new(LicenseMetric),
        Arc::new(PerformanceClaimsMetric),
        Arc::new(RampUpMetric),
        Arc::new(SizeMetric::new(capacities)),
        Arc::new(ReproducibilityMetric),
        Arc::new(ReviewednessMetric::new(host)),
        Arc::new(TreescoreMetric),
    ]
}

/// Resolve the repository a host-backed metric should query.
fn repo_for(metric: MetricKind, snapshot: &ArtifactSnapshot) -> Result<RepoRef, MetricError> {
    let url = snapshot.repository_url().ok_or(MetricError::MissingInput {
        metric,
        input: "repository url",
    })?;
    Ok(RepoRef::parse(url)?)
}

fn readme(snapshot: &ArtifactSnapshot) -> &str {
    snapshot.readme.as_deref().unwrap_or("")
}

/// Number of cues that occur at least once in `text`, case-insensitively.
fn count_cues(text: &str, cues: &[&str]) -> usize {
    let lower = text.to_lowercase();
    cues.iter().filter(|cue| lower.contains(*cue)).count()
}

/// Whether any markdown heading contains one of `words`.
fn has_section(text: &str, words: &[&str]) -> bool {
    text.lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with('#'))
        .any(|heading| {
            let heading = heading.to_lowercase();
            words.iter().any(|w| heading.contains(w))
        })
}

/// Bodies of the fenced code blocks in a markdown document.
fn fenced_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(body) => blocks.push(body.join("\n")),
                None => current = Some(Vec::new()),
            }
        } else if let Some(body) = current.as_mut() {
            body.push(line);
        }
    }
    blocks
}
