//! Concurrent fan-out of the metric evaluators and net score aggregation.
//!
//! Every evaluator runs as its own tokio task. Tasks from all in-flight
//! requests draw from one shared semaphore, so the number of evaluations
//! running at once never exceeds the configured budget. Each task is cut off
//! at the per-metric timeout; the request as a whole is cut off at the
//! aggregate timeout, after which unfinished tasks are aborted and their
//! permits return to the pool.

use super::evaluator::{MetricEvaluator, evaluate};
use super::metrics::standard_evaluators;
use super::weights::WeightTable;
use super::{METRIC_COUNT, MetricKind, ScoreReport, SizeFocus, SubScore};
use crate::config::ScoringConfig;
use crate::error::{ConfigError, MetricError};
use crate::repo_host::RepoHost;
use crate::types::ArtifactSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{info, warn};

pub const DEFAULT_METRIC_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Runs all metric evaluators for an artifact and combines their sub-scores.
///
/// Cloning is cheap and clones share the same evaluation budget.
#[derive(Clone)]
pub struct ScoreAggregator {
    /// One slot per metric, indexed by [`MetricKind::index`].
    evaluators: Vec<Option<Arc<dyn MetricEvaluator>>>,
    weights: Arc<WeightTable>,
    metric_timeout: Duration,
    aggregate_timeout: Duration,
    max_concurrency: usize,
    permits: Arc<Semaphore>,
}

impl ScoreAggregator {
    /// Build an aggregator over `evaluators`. A later evaluator for the same
    /// metric replaces an earlier one; metrics without one score neutral.
    pub fn new(
        evaluators: Vec<Arc<dyn MetricEvaluator>>,
        weights: WeightTable,
    ) -> Result<Self, ConfigError> {
        weights.validate()?;
        let mut aggregator = Self {
            evaluators: vec![None; METRIC_COUNT],
            weights: Arc::new(weights),
            metric_timeout: DEFAULT_METRIC_TIMEOUT,
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        };
        for evaluator in evaluators {
            aggregator = aggregator.with_evaluator(evaluator);
        }
        Ok(aggregator)
    }

    /// Standard evaluator set with timeouts, budget and weights from config.
    pub fn from_config(
        config: &ScoringConfig,
        host: Arc<dyn RepoHost>,
    ) -> Result<Self, ConfigError> {
        let evaluators = standard_evaluators(host, config.device_capacities);
        Ok(Self::new(evaluators, config.weights.clone())?
            .with_metric_timeout(Duration::from_millis(config.metric_timeout_ms))
            .with_aggregate_timeout(Duration::from_millis(config.aggregate_timeout_ms))
            .with_max_concurrency(config.max_concurrent_evaluations))
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn MetricEvaluator>) -> Self {
        let slot = evaluator.metric().index();
        self.evaluators[slot] = Some(evaluator);
        self
    }

    pub fn with_metric_timeout(mut self, timeout: Duration) -> Self {
        self.metric_timeout = timeout;
        self
    }

    pub fn with_aggregate_timeout(mut self, timeout: Duration) -> Self {
        self.aggregate_timeout = timeout;
        self
    }

    /// Replace the evaluation budget with a fresh pool of `max` permits.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self.permits = Arc::new(Semaphore::new(self.max_concurrency));
        self
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Permits currently free in the shared evaluation budget.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Score with the size metric averaged over all device classes.
    pub async fn score(&self, snapshot: &ArtifactSnapshot) -> ScoreReport {
        self.score_with(snapshot, SizeFocus::Mean).await
    }

    pub async fn score_with(&self, snapshot: &ArtifactSnapshot, focus: SizeFocus) -> ScoreReport {
        let started = Instant::now();
        let slots = self.fan_out(snapshot, &MetricKind::ALL, started).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let sub_scores: Vec<SubScore> = MetricKind::ALL
            .iter()
            .zip(slots)
            .map(|(metric, slot)| slot.unwrap_or_else(|| SubScore::neutral(*metric, elapsed_ms)))
            .collect();
        let net_score = self.weights.combine(&sub_scores, focus);

        info!(
            artifact = %snapshot.id,
            net_score,
            weights_version = %self.weights.version,
            latency_ms = elapsed_ms,
            "Score report computed"
        );

        ScoreReport {
            artifact_id: snapshot.id.clone(),
            weights_version: self.weights.version.clone(),
            size_focus: focus,
            sub_scores,
            net_score,
            total_latency_ms: elapsed_ms,
        }
    }

    /// Re-evaluate only `metrics` and carry every other sub-score over from
    /// `previous`. The net score is recombined under the previous size focus.
    pub async fn rescore(
        &self,
        previous: &ScoreReport,
        snapshot: &ArtifactSnapshot,
        metrics: &[MetricKind],
    ) -> ScoreReport {
        let started = Instant::now();
        let slots = self.fan_out(snapshot, metrics, started).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let sub_scores: Vec<SubScore> = MetricKind::ALL
            .iter()
            .zip(slots)
            .map(|(metric, slot)| match slot {
                Some(sub) => sub,
                None if metrics.contains(metric) => SubScore::neutral(*metric, elapsed_ms),
                None => previous
                    .get(*metric)
                    .cloned()
                    .unwrap_or_else(|| SubScore::neutral(*metric, 0)),
            })
            .collect();
        let net_score = self.weights.combine(&sub_scores, previous.size_focus);

        info!(
            artifact = %snapshot.id,
            net_score,
            previous_net_score = previous.net_score,
            rescored = metrics.len(),
            latency_ms = elapsed_ms,
            "Score report refreshed"
        );

        ScoreReport {
            artifact_id: snapshot.id.clone(),
            weights_version: self.weights.version.clone(),
            size_focus: previous.size_focus,
            sub_scores,
            net_score,
            total_latency_ms: elapsed_ms,
        }
    }

    /// Run the evaluators for `metrics` under the shared budget. Slots are
    /// indexed by [`MetricKind::index`]; a slot stays empty when its task
    /// panicked or no evaluator was selected for it.
    async fn fan_out(
        &self,
        snapshot: &ArtifactSnapshot,
        metrics: &[MetricKind],
        started: Instant,
    ) -> Vec<Option<SubScore>> {
        let deadline = started + self.aggregate_timeout;
        let shared = Arc::new(snapshot.clone());
        let timeout_ms = self.metric_timeout.as_millis() as u64;

        let mut tasks = JoinSet::new();
        for evaluator in self
            .evaluators
            .iter()
            .flatten()
            .filter(|e| metrics.contains(&e.metric()))
        {
            let evaluator = evaluator.clone();
            let snapshot = shared.clone();
            let permits = self.permits.clone();
            let metric_timeout = self.metric_timeout;

            tasks.spawn(async move {
                let metric = evaluator.metric();
                // Held until the task finishes or is aborted.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return SubScore::neutral(metric, 0);
                };
                match timeout(metric_timeout, evaluate(evaluator.as_ref(), &snapshot)).await {
                    Ok(sub) => sub,
                    Err(_) => {
                        let err = MetricError::Timeout { metric, timeout_ms };
                        warn!(artifact = %snapshot.id, error = %err, "Using neutral score");
                        SubScore::neutral(metric, timeout_ms)
                    }
                }
            });
        }

        let mut slots: Vec<Option<SubScore>> = vec![None; METRIC_COUNT];
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(sub))) => {
                    let slot = sub.metric.index();
                    slots[slot] = Some(sub);
                }
                Ok(Some(Err(e))) => {
                    warn!(artifact = %snapshot.id, error = %e, "Metric task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        artifact = %snapshot.id,
                        pending = tasks.len(),
                        timeout_ms = self.aggregate_timeout.as_millis() as u64,
                        "Aggregate timeout elapsed, cancelling remaining metrics"
                    );
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok(sub) = joined {
                            let slot = sub.metric.index();
                            slots[slot] = Some(sub);
                        }
                    }
                    break;
                }
            }
        }
        slots
    }
}

impl std::fmt::Debug for ScoreAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreAggregator")
            .field("weights_version", &self.weights.version)
            .field("metric_timeout", &self.metric_timeout)
            .field("aggregate_timeout", &self.aggregate_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
