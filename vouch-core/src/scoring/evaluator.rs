//! The metric evaluator trait and the timing wrapper around it.

use super::{DeviceScores, MetricKind, SubScore};
use crate::error::MetricError;
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Raw result of a metric before clamping and timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Scalar(f64),
    /// Per-device breakdown, used by the size metric.
    Devices(DeviceScores),
}

/// A single quality dimension computed from an artifact snapshot.
///
/// Implementations must not mutate shared state; they see only the snapshot
/// and whatever read-only clients they were built with.
#[async_trait]
pub trait MetricEvaluator: Send + Sync {
    fn metric(&self) -> MetricKind;

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError>;
}

/// Run one evaluator, timing it and folding errors into a neutral sub-score.
pub async fn evaluate(evaluator: &dyn MetricEvaluator, snapshot: &ArtifactSnapshot) -> SubScore {
    let metric = evaluator.metric();
    let started = Instant::now();
    let outcome = evaluator.measure(snapshot).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Measurement::Scalar(value)) => {
            debug!(artifact = %snapshot.id, metric = %metric, value, latency_ms, "Metric evaluated");
            SubScore::scalar(metric, value, latency_ms)
        }
        Ok(Measurement::Devices(devices)) => {
            debug!(artifact = %snapshot.id, metric = %metric, latency_ms, "Metric evaluated");
            SubScore::sized(metric, devices, latency_ms)
        }
        Err(e) => {
            warn!(artifact = %snapshot.id, metric = %metric, error = %e, "Metric failed, using neutral score");
            SubScore::neutral(metric, latency_ms)
        }
    }
}

/// Piecewise-linear saturation: half credit at `knee`, full credit at `max_x`.
pub fn saturating_scale(x: f64, knee: f64, max_x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return 0.0;
    }
    if x >= max_x {
        return 1.0;
    }
    if x <= knee {
        return (x / knee) * 0.5;
    }
    0.5 + (x - knee) / (max_x - knee) * 0.5
}
