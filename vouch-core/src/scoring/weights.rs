//! Versioned weight table combining sub-scores into a net score.

use super::{MetricKind, SizeFocus, SubScore, clamp01};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Allowed drift of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Per-metric weights. Every metric carries a weight; the sum must be 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    /// Recorded on every report produced with this table.
    pub version: String,
    pub availability: f64,
    pub bus_factor: f64,
    pub code_quality: f64,
    pub dataset_quality: f64,
    pub license: f64,
    pub performance_claims: f64,
    pub ramp_up: f64,
    pub size: f64,
    pub reproducibility: f64,
    pub reviewedness: f64,
    pub treescore: f64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            version: "v1".into(),
            availability: 0.08,
            bus_factor: 0.06,
            code_quality: 0.10,
            dataset_quality: 0.08,
            license: 0.20,
            performance_claims: 0.06,
            ramp_up: 0.08,
            size: 0.10,
            reproducibility: 0.08,
            reviewedness: 0.06,
            treescore: 0.10,
        }
    }
}

impl WeightTable {
    pub fn weight(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Availability => self.availability,
            MetricKind::BusFactor => self.bus_factor,
            MetricKind::CodeQuality => self.code_quality,
            MetricKind::DatasetQuality => self.dataset_quality,
            MetricKind::License => self.license,
            MetricKind::PerformanceClaims => self.performance_claims,
            MetricKind::RampUp => self.ramp_up,
            MetricKind::Size => self.size,
            MetricKind::Reproducibility => self.reproducibility,
            MetricKind::Reviewedness => self.reviewedness,
            MetricKind::Treescore => self.treescore,
        }
    }

    /// Reject tables with negative or non-finite weights, or a sum other than 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidWeights {
            version: self.version.clone(),
            reason,
        };

        if self.version.trim().is_empty() {
            return Err(invalid("version must not be empty".into()));
        }

        let mut sum = 0.0;
        for metric in MetricKind::ALL {
            let w = self.weight(metric);
            if !w.is_finite() {
                return Err(invalid(format!("weight for {metric} is not finite")));
            }
            if w < 0.0 {
                return Err(invalid(format!("weight for {metric} is negative ({w})")));
            }
            sum += w;
        }

        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!("weights sum to {sum}, expected 1.0")));
        }
        Ok(())
    }

    /// Weighted sum of the sub-scores, clamped into [0, 1].
    ///
    /// Missing metrics contribute nothing.
    pub fn combine(&self, sub_scores: &[SubScore], focus: SizeFocus) -> f64 {
        let total: f64 = sub_scores
            .iter()
            .map(|s| self.weight(s.metric) * clamp01(s.weighted_value(focus)))
            .sum();
        clamp01(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{DeviceClass, DeviceScores};

    fn all_at(value: f64) -> Vec<SubScore> {
        MetricKind::ALL
            .iter()
            .map(|m| SubScore::scalar(*m, value, 0))
            .collect()
    }

    #[test]
    fn test_default_table_is_valid() {
        WeightTable::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_sum() {
        let table = WeightTable {
            license: 0.5,
            ..WeightTable::default()
        };
        let err = table.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWeights { .. }));
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let table = WeightTable {
            license: -0.1,
            treescore: 0.4,
            ..WeightTable::default()
        };
        assert!(table.validate().unwrap_err().to_string().contains("negative"));
    }

    #[test]
    fn test_rejects_nan_weight() {
        let table = WeightTable {
            size: f64::NAN,
            ..WeightTable::default()
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_combine_extremes() {
        let table = WeightTable::default();
        assert!((table.combine(&all_at(1.0), SizeFocus::Mean) - 1.0).abs() < 1e-9);
        assert_eq!(table.combine(&all_at(0.0), SizeFocus::Mean), 0.0);
    }

    #[test]
    fn test_combine_uses_focused_device() {
        let table = WeightTable::default();
        let mut subs = all_at(0.0);
        subs[MetricKind::Size.index()] = SubScore::sized(
            MetricKind::Size,
            DeviceScores {
                raspberry_pi: 0.0,
                jetson_nano: 0.0,
                desktop_pc: 1.0,
                aws_server: 1.0,
            },
            0,
        );
        let mean = table.combine(&subs, SizeFocus::Mean);
        let desktop = table.combine(&subs, SizeFocus::Device(DeviceClass::DesktopPc));
        assert!((mean - 0.05).abs() < 1e-12);
        assert!((desktop - 0.10).abs() < 1e-12);
    }
}
