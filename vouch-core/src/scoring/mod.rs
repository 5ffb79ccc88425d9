//! Scoring vocabulary: metric dimensions, device classes, sub-scores and reports.

pub mod aggregator;
pub mod evaluator;
pub mod metrics;
pub mod weights;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Default lowest sub-score an artifact may have and still be accepted.
pub const DEFAULT_MIN_METRIC_THRESHOLD: f64 = 0.5;

/// Number of scored dimensions.
pub const METRIC_COUNT: usize = 11;

/// Score substituted when a metric fails or times out.
pub const NEUTRAL_SCORE: f64 = 0.0;

/// One quality dimension. Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Availability,
    BusFactor,
    CodeQuality,
    DatasetQuality,
    License,
    PerformanceClaims,
    RampUp,
    Size,
    Reproducibility,
    Reviewedness,
    Treescore,
}

impl MetricKind {
    pub const ALL: [MetricKind; METRIC_COUNT] = [
        MetricKind::Availability,
        MetricKind::BusFactor,
        MetricKind::CodeQuality,
        MetricKind::DatasetQuality,
        MetricKind::License,
        MetricKind::PerformanceClaims,
        MetricKind::RampUp,
        MetricKind::Size,
        MetricKind::Reproducibility,
        MetricKind::Reviewedness,
        MetricKind::Treescore,
    ];

    /// Position in [`MetricKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable JSON key.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Availability => "availability",
            MetricKind::BusFactor => "bus_factor",
            MetricKind::CodeQuality => "code_quality",
            MetricKind::DatasetQuality => "dataset_quality",
            MetricKind::License => "license",
            MetricKind::PerformanceClaims => "performance_claims",
            MetricKind::RampUp => "ramp_up",
            MetricKind::Size => "size",
            MetricKind::Reproducibility => "reproducibility",
            MetricKind::Reviewedness => "reviewedness",
            MetricKind::Treescore => "treescore",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware class an artifact might be deployed to, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Constrained device.
    RaspberryPi,
    /// Small edge accelerator.
    JetsonNano,
    DesktopPc,
    AwsServer,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 4] = [
        DeviceClass::RaspberryPi,
        DeviceClass::JetsonNano,
        DeviceClass::DesktopPc,
        DeviceClass::AwsServer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::RaspberryPi => "raspberry_pi",
            DeviceClass::JetsonNano => "jetson_nano",
            DeviceClass::DesktopPc => "desktop_pc",
            DeviceClass::AwsServer => "aws_server",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory capacity per device class, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCapacities {
    pub raspberry_pi: u64,
    pub jetson_nano: u64,
    pub desktop_pc: u64,
    pub aws_server: u64,
}

impl DeviceCapacities {
    pub fn get(&self, class: DeviceClass) -> u64 {
        match class {
            DeviceClass::RaspberryPi => self.raspberry_pi,
            DeviceClass::JetsonNano => self.jetson_nano,
            DeviceClass::DesktopPc => self.desktop_pc,
            DeviceClass::AwsServer => self.aws_server,
        }
    }
}

impl Default for DeviceCapacities {
    fn default() -> Self {
        Self {
            raspberry_pi: 500_000_000,
            jetson_nano: 2_000_000_000,
            desktop_pc: 16_000_000_000,
            aws_server: 64_000_000_000,
        }
    }
}

/// Size score for each device class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceScores {
    pub raspberry_pi: f64,
    pub jetson_nano: f64,
    pub desktop_pc: f64,
    pub aws_server: f64,
}

impl DeviceScores {
    pub fn from_fn(mut f: impl FnMut(DeviceClass) -> f64) -> Self {
        Self {
            raspberry_pi: f(DeviceClass::RaspberryPi),
            jetson_nano: f(DeviceClass::JetsonNano),
            desktop_pc: f(DeviceClass::DesktopPc),
            aws_server: f(DeviceClass::AwsServer),
        }
    }

    pub fn get(&self, class: DeviceClass) -> f64 {
        match class {
            DeviceClass::RaspberryPi => self.raspberry_pi,
            DeviceClass::JetsonNano => self.jetson_nano,
            DeviceClass::DesktopPc => self.desktop_pc,
            DeviceClass::AwsServer => self.aws_server,
        }
    }

    pub fn mean(&self) -> f64 {
        (self.raspberry_pi + self.jetson_nano + self.desktop_pc + self.aws_server) / 4.0
    }

    fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self::from_fn(|class| f(self.get(class)))
    }
}

/// Which size value feeds the net score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "device")]
pub enum SizeFocus {
    /// Mean of the four device class scores.
    #[default]
    Mean,
    /// A single requested device class.
    Device(DeviceClass),
}

/// Output of one metric evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub metric: MetricKind,
    /// Always within [0, 1].
    pub value: f64,
    pub latency_ms: u64,
    /// Per-device breakdown, present only for [`MetricKind::Size`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<DeviceScores>,
}

impl SubScore {
    pub fn scalar(metric: MetricKind, value: f64, latency_ms: u64) -> Self {
        Self {
            metric,
            value: clamp01(value),
            latency_ms,
            devices: None,
        }
    }

    /// Size sub-score; the scalar value is the mean across device classes.
    pub fn sized(metric: MetricKind, devices: DeviceScores, latency_ms: u64) -> Self {
        let devices = devices.map(clamp01);
        Self {
            metric,
            value: clamp01(devices.mean()),
            latency_ms,
            devices: Some(devices),
        }
    }

    /// Fallback for a failed, timed-out or cancelled evaluation.
    pub fn neutral(metric: MetricKind, latency_ms: u64) -> Self {
        let devices = (metric == MetricKind::Size).then(|| DeviceScores::from_fn(|_| NEUTRAL_SCORE));
        Self {
            metric,
            value: NEUTRAL_SCORE,
            latency_ms,
            devices,
        }
    }

    /// Value contributed to the net score under the given size focus.
    pub fn weighted_value(&self, focus: SizeFocus) -> f64 {
        match (focus, &self.devices) {
            (SizeFocus::Device(class), Some(devices)) => devices.get(class),
            _ => self.value,
        }
    }
}

/// Aggregate of all sub-scores for one artifact.
///
/// A new report is produced on every rescore; reports are never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub artifact_id: String,
    /// Version of the weight table that produced `net_score`.
    pub weights_version: String,
    pub size_focus: SizeFocus,
    /// One entry per metric, in [`MetricKind::ALL`] order.
    pub sub_scores: Vec<SubScore>,
    pub net_score: f64,
    /// Wall-clock span of the whole fan-out.
    pub total_latency_ms: u64,
}

impl ScoreReport {
    pub fn get(&self, metric: MetricKind) -> Option<&SubScore> {
        self.sub_scores.iter().find(|s| s.metric == metric)
    }

    pub fn value(&self, metric: MetricKind) -> f64 {
        self.get(metric).map_or(NEUTRAL_SCORE, |s| s.value)
    }

    /// Names of every score below `threshold`, in report order.
    ///
    /// The size metric is judged per device class (`size.raspberry_pi`);
    /// the net score is judged under the name `net_score`.
    pub fn failing_metrics(&self, threshold: f64) -> Vec<String> {
        let mut failing = Vec::new();
        if self.net_score < threshold {
            failing.push("net_score".to_string());
        }
        for sub in &self.sub_scores {
            match &sub.devices {
                Some(devices) => {
                    for class in DeviceClass::ALL {
                        if devices.get(class) < threshold {
                            failing.push(format!("{}.{class}", sub.metric));
                        }
                    }
                }
                None if sub.value < threshold => failing.push(sub.metric.as_str().to_string()),
                None => {}
            }
        }
        failing
    }

    pub fn acceptance(&self, threshold: f64) -> Acceptance {
        let failing = self.failing_metrics(threshold);
        if failing.is_empty() {
            Acceptance::Accepted
        } else {
            Acceptance::Rejected { failing }
        }
    }

    /// Score values only, keyed by the dashboard names.
    ///
    /// Latencies are excluded, so identical inputs yield identical cards.
    pub fn score_card(&self) -> Value {
        let mut card = Map::new();
        card.insert("net_score".into(), json!(self.net_score));
        for sub in &self.sub_scores {
            card.insert(sub.metric.as_str().into(), json!(sub.value));
            if let Some(devices) = &sub.devices {
                for class in DeviceClass::ALL {
                    card.insert(format!("size_{class}"), json!(devices.get(class)));
                }
            }
        }
        Value::Object(card)
    }

    /// Flat JSON for the dashboard: scores plus `<key>_latency` siblings.
    pub fn to_dashboard_json(&self) -> Value {
        let mut out = match self.score_card() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        out.insert("artifact_id".into(), json!(self.artifact_id));
        out.insert("weights_version".into(), json!(self.weights_version));
        out.insert("net_score_latency".into(), json!(self.total_latency_ms));
        for sub in &self.sub_scores {
            out.insert(format!("{}_latency", sub.metric), json!(sub.latency_ms));
        }
        Value::Object(out)
    }
}

/// Whether an artifact's latest report clears the minimum metric threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Acceptance {
    Accepted,
    Rejected { failing: Vec<String> },
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Acceptance::Accepted)
    }
}

/// Clamp into [0, 1], mapping NaN to the neutral score.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        NEUTRAL_SCORE
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_order_matches_index() {
        for (i, metric) in MetricKind::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
        assert_eq!(MetricKind::ALL.len(), METRIC_COUNT);
    }

    #[test]
    fn test_metric_serde_uses_dashboard_keys() {
        for metric in MetricKind::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(0.25), 0.25);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }

    #[test]
    fn test_neutral_size_has_device_breakdown() {
        let sub = SubScore::neutral(MetricKind::Size, 10);
        assert_eq!(sub.value, 0.0);
        assert_eq!(sub.devices.unwrap().aws_server, 0.0);
        assert!(SubScore::neutral(MetricKind::License, 0).devices.is_none());
    }

    #[test]
    fn test_weighted_value_respects_focus() {
        let sub = SubScore::sized(
            MetricKind::Size,
            DeviceScores {
                raspberry_pi: 0.1,
                jetson_nano: 0.4,
                desktop_pc: 1.0,
                aws_server: 1.0,
            },
            0,
        );
        assert!((sub.weighted_value(SizeFocus::Mean) - 0.625).abs() < 1e-12);
        assert_eq!(
            sub.weighted_value(SizeFocus::Device(DeviceClass::RaspberryPi)),
            0.1
        );
    }

    fn report_with(value: f64, devices: DeviceScores) -> ScoreReport {
        ScoreReport {
            artifact_id: "m".into(),
            weights_version: "v1".into(),
            size_focus: SizeFocus::Mean,
            sub_scores: MetricKind::ALL
                .iter()
                .map(|m| match m {
                    MetricKind::Size => SubScore::sized(*m, devices, 0),
                    _ => SubScore::scalar(*m, value, 0),
                })
                .collect(),
            net_score: value,
            total_latency_ms: 0,
        }
    }

    #[test]
    fn test_failing_metrics_checks_each_device() {
        let devices = DeviceScores {
            raspberry_pi: 0.2,
            jetson_nano: 0.6,
            desktop_pc: 1.0,
            aws_server: 1.0,
        };
        let mut report = report_with(0.9, devices);
        assert_eq!(report.failing_metrics(0.5), vec!["size.raspberry_pi"]);

        report.sub_scores[MetricKind::License.index()] = SubScore::scalar(MetricKind::License, 0.0, 0);
        assert_eq!(
            report.acceptance(0.5),
            Acceptance::Rejected {
                failing: vec!["license".into(), "size.raspberry_pi".into()]
            }
        );
        assert!(report.acceptance(0.0).is_accepted());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let report = report_with(0.5, DeviceScores::from_fn(|_| 0.5));
        assert!(report.failing_metrics(0.5).is_empty());

        let low = report_with(0.4, DeviceScores::from_fn(|_| 1.0));
        let failing = low.failing_metrics(0.5);
        assert_eq!(failing[0], "net_score");
        assert_eq!(failing.len(), 1 + METRIC_COUNT - 1);
    }

    #[test]
    fn test_acceptance_serializes_with_status_tag() {
        let rejected = Acceptance::Rejected {
            failing: vec!["treescore".into()],
        };
        let json = serde_json::to_value(&rejected).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["failing"][0], "treescore");
        assert_eq!(serde_json::to_value(Acceptance::Accepted).unwrap()["status"], "accepted");
    }

    #[test]
    fn test_dashboard_json_keys() {
        let report = ScoreReport {
            artifact_id: "m".into(),
            weights_version: "v1".into(),
            size_focus: SizeFocus::Mean,
            sub_scores: MetricKind::ALL
                .iter()
                .map(|m| SubScore::neutral(*m, 3))
                .collect(),
            net_score: 0.0,
            total_latency_ms: 7,
        };
        let json = report.to_dashboard_json();
        assert_eq!(json["net_score_latency"], 7);
        assert_eq!(json["bus_factor_latency"], 3);
        assert_eq!(json["size_desktop_pc"], 0.0);
        assert_eq!(json["artifact_id"], "m");

        let card = report.score_card();
        assert!(card.get("artifact_id").is_none());
        assert!(card.get("size_latency").is_none());
        assert_eq!(card.as_object().unwrap().len(), 1 + METRIC_COUNT + 4);
    }
}
