use std::collections::BTreeMap;

use crate::config::ThresholdConfig;
use crate::kinematics::haversine_meters;
use crate::models::{MovementMetrics, Sample, SpeedZone};
use crate::zones::SpeedZoneCalculator;

/// Distance, speed-zone and impact features over a sample window
pub struct MovementMetricsCalculator {
    thresholds: ThresholdConfig,
}

impl MovementMetricsCalculator {
    /// Create calculator with default thresholds
    pub fn new() -> Self {
        MovementMetricsCalculator {
            thresholds: ThresholdConfig::default(),
        }
    }

    /// Create calculator with custom thresholds
    pub fn with_config(thresholds: ThresholdConfig) -> Self {
        MovementMetricsCalculator { thresholds }
    }

    /// Calculate movement metrics for samples sorted ascending by timestamp
    ///
    /// Returns `None` for fewer than two samples. Each segment's distance is
    /// attributed to the zone of the sample that ends it, so the five zone
    /// distances always sum to the total.
    pub fn calculate(&self, samples: &[Sample]) -> Option<MovementMetrics> {
        if samples.len() < 2 {
            return None;
        }

        let t = &self.thresholds;
        let mut speed_zones: BTreeMap<SpeedZone, f64> =
            SpeedZone::ALL.iter().map(|zone| (*zone, 0.0)).collect();

        let mut total_distance = 0.0;
        let mut sprint_distance = 0.0;
        let mut high_intensity_distance = 0.0;
        // A window that opens mid-sprint counts that sprint once
        let mut sprint_count = u32::from(SpeedZoneCalculator::is_sprint(samples[0].movement.speed, t));
        let mut acceleration_count = 0u32;
        let mut deceleration_count = 0u32;
        let mut segment_speed_sum = 0.0;

        for pair in samples.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);

            let distance = haversine_meters(
                previous.position.latitude,
                previous.position.longitude,
                current.position.latitude,
                current.position.longitude,
            );
            total_distance += distance;

            let speed = current.movement.speed;
            segment_speed_sum += speed;

            let zone = SpeedZoneCalculator::classify(speed, t);
            *speed_zones.entry(zone).or_insert(0.0) += distance;

            match zone {
                SpeedZone::Sprinting => {
                    sprint_distance += distance;
                    // Edge-triggered: only an entry into the sprint band counts
                    if !SpeedZoneCalculator::is_sprint(previous.movement.speed, t) {
                        sprint_count += 1;
                    }
                }
                SpeedZone::HighIntensity => high_intensity_distance += distance,
                _ => {}
            }

            let acceleration = current.movement.acceleration;
            if acceleration > t.acceleration_ms2 {
                acceleration_count += 1;
            } else if acceleration < -t.acceleration_ms2 {
                deceleration_count += 1;
            }
        }

        let max_speed = samples
            .iter()
            .map(|s| s.movement.speed)
            .filter(|speed| speed.is_finite())
            .fold(0.0, f64::max);

        let mut jump_count = 0u32;
        let mut player_load = 0.0;
        for accel in samples.iter().filter_map(Sample::accelerometer) {
            if accel.z > t.jump_vertical_ms2 {
                jump_count += 1;
            }
            player_load += accel.magnitude() * t.player_load_scale;
        }

        Some(MovementMetrics {
            total_distance,
            sprint_distance,
            high_intensity_distance,
            sprint_count,
            acceleration_count,
            deceleration_count,
            max_speed,
            average_speed: segment_speed_sum / (samples.len() - 1) as f64,
            jump_count,
            player_load,
            speed_zones,
        })
    }
}

impl Default for MovementMetricsCalculator {
    fn default() -> Self {
        Self::new()
    }
}
