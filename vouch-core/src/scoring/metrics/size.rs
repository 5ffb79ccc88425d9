//! Per-device deployability from the declared artifact size.

use crate::error::MetricError;
use crate::scoring::evaluator::{Measurement, MetricEvaluator};
use crate::scoring::{DeviceCapacities, DeviceScores, MetricKind};
use crate::types::ArtifactSnapshot;
use async_trait::async_trait;

/// Deployability of the artifact on each device class.
pub struct SizeMetric {
    capacities: DeviceCapacities,
}

impl SizeMetric {
    pub fn new(capacities: DeviceCapacities) -> Self {
        Self { capacities }
    }
}

#[async_trait]
impl MetricEvaluator for SizeMetric {
    fn metric(&self) -> MetricKind {
        MetricKind::Size
    }

    async fn measure(&self, snapshot: &ArtifactSnapshot) -> Result<Measurement, MetricError> {
        let devices = DeviceScores::from_fn(|class| {
            size_score(self.capacities.get(class), snapshot.size_bytes)
        });
        Ok(Measurement::Devices(devices))
    }
}

/// `min(1, capacity / size)`; an empty artifact fits everywhere.
pub fn size_score(capacity: u64, size: u64) -> f64 {
    if size == 0 {
        return 1.0;
    }
    (capacity as f64 / size as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::DeviceClass;
    use crate::types::ArtifactType;

    #[test]
    fn test_size_score() {
        assert_eq!(size_score(100, 0), 1.0);
        assert_eq!(size_score(100, 50), 1.0);
        assert_eq!(size_score(100, 400), 0.25);
        assert!(size_score(100, u64::MAX) < 1e-15);
    }

    #[tokio::test]
    async fn test_500mb_artifact() {
        let snapshot = ArtifactSnapshot::new("m", ArtifactType::Model).with_size(500_000_000);
        let Measurement::Devices(devices) = SizeMetric::new(DeviceCapacities::default())
            .measure(&snapshot)
            .await
            .unwrap()
        else {
            panic!("size must report per-device scores");
        };
        assert_eq!(devices.get(DeviceClass::DesktopPc), 1.0);
        assert_eq!(devices.get(DeviceClass::RaspberryPi), 1.0);

        let large = snapshot.with_size(4_000_000_000);
        let Measurement::Devices(devices) = SizeMetric::new(DeviceCapacities::default())
            .measure(&large)
            .await
            .unwrap()
        else {
            panic!("size must report per-device scores");
        };
        assert!(devices.raspberry_pi < devices.desktop_pc);
        assert_eq!(devices.raspberry_pi, 0.125);
        assert_eq!(devices.jetson_nano, 0.5);
    }
}
