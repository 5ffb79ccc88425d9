//! Share of merged pull requests that were reviewed.

use super::repo_for;
use crate::error::MetricError;
use crate::repo_host::{RepoHost, ReviewStats};
use crate::scoring::MetricKind;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;
use std::sync::Arc;

/// Share of merged changes that went through code review.
pub struct ReviewednessMetric {
    host: Arc<dyn RepoHost>,
}

impl ReviewednessMetric {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl MetricEvaluator for ReviewednessMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::Reviewedness
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let repo = repo_for(self.metric(), snapshot)?;
        let stats = self.host.review_stats(&repo).await?;
        Ok(Measurement::Scalar(reviewedness_score(stats)))
    }
}

pub fn reviewedness_score(stats: ReviewStats) -> f64 {
    if stats.merged == 0 {
        return 0.0;
    }
    (stats.reviewed as f64 / stats.merged as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoHostError;
    use crate::repo_host::{RepoMetadata, RepoRef};
    use crate::scoring::evaluator::evaluate;
    use crate::types::{ArtifactLink, ArtifactType};

    /// Host whose second search request is rate limited.
    struct RateLimited;

    #[async_trait]
    impl RepoHost for RateLimited {
        async fn contributor_commits(&self, _: &RepoRef) -> Result<Vec<u64>, RepoHostError> {
            Ok(Vec::new())
        }

        async fn repository(&self, _: &RepoRef) -> Result<RepoMetadata, RepoHostError> {
            Err(RepoHostError::Unavailable)
        }

        async fn review_stats(&self, repo: &RepoRef) -> Result<ReviewStats, RepoHostError> {
            Err(RepoHostError::Status {
                repo: repo.to_string(),
                status: 403,
            })
        }
    }

    #[tokio::test]
    async fn test_failed_review_lookup_is_neutral() {
        let snapshot = ArtifactSnapshot::new("m", ArtifactType::Model)
            .with_code(ArtifactLink::new("c").with_url("https://github.com/acme/bert"));
        let metric = ReviewednessMetric::new(Arc::new(RateLimited));
        let sub = evaluate(&metric, &snapshot).await;
        assert_eq!(sub.value, 0.0);
    }

    #[test]
    fn test_reviewedness_ratio() {
        let stats = ReviewStats {
            merged: 40,
            reviewed: 30,
        };
        assert_eq!(reviewedness_score(stats), 0.75);
        assert_eq!(reviewedness_score(ReviewStats::default()), 0.0);
    }
}
