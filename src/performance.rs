use crate::models::{PerformanceMetrics, Sample};

/// Upper bound of the per-sample intensity score
pub const MAX_INTENSITY: f64 = 10.0;

/// Physiological estimates that need a model beyond raw telemetry
///
/// Implementations must return non-negative values and must not depend on
/// heart-rate availability for their defaults.
pub trait PerformanceEstimator: Send + Sync {
    /// Work rate in %
    fn work_rate(&self, samples: &[Sample]) -> f64;

    /// Fatigue index on a 1-10 scale
    fn fatigue_index(&self, samples: &[Sample]) -> f64;

    /// Recovery time in seconds
    fn recovery_time_secs(&self, samples: &[Sample]) -> f64;

    /// VO2max in ml/kg/min
    fn vo2_max(&self, samples: &[Sample]) -> f64;
}

/// Fixed estimates used until a real estimation model is plugged in
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderPerformanceEstimator;

impl PerformanceEstimator for PlaceholderPerformanceEstimator {
    fn work_rate(&self, _samples: &[Sample]) -> f64 {
        85.0
    }

    fn fatigue_index(&self, _samples: &[Sample]) -> f64 {
        5.0
    }

    fn recovery_time_secs(&self, _samples: &[Sample]) -> f64 {
        120.0
    }

    fn vo2_max(&self, _samples: &[Sample]) -> f64 {
        45.0
    }
}

/// Intensity of a single sample on a 0-10 scale
///
/// `speed / 30 + |acceleration| / 5`, capped at 10.
pub fn sample_intensity(sample: &Sample) -> f64 {
    let intensity = sample.movement.speed / 30.0 + sample.movement.acceleration.abs() / 5.0;
    intensity.min(MAX_INTENSITY)
}

/// Heart-rate and intensity aggregates over a sample window
pub struct PerformanceMetricsCalculator<'a> {
    estimator: &'a dyn PerformanceEstimator,
}

impl<'a> PerformanceMetricsCalculator<'a> {
    pub fn new(estimator: &'a dyn PerformanceEstimator) -> Self {
        PerformanceMetricsCalculator { estimator }
    }

    /// Calculate performance metrics
    ///
    /// Heart-rate aggregates only use readings above zero; samples without a
    /// sensor still contribute to intensity through their movement terms.
    pub fn calculate(&self, samples: &[Sample]) -> PerformanceMetrics {
        let heart_rates: Vec<u32> = samples
            .iter()
            .filter_map(Sample::heart_rate)
            .map(u32::from)
            .collect();

        let max_heart_rate = heart_rates.iter().copied().max().unwrap_or(0);
        let average_heart_rate = if heart_rates.is_empty() {
            0
        } else {
            // Integer mean, truncated
            heart_rates.iter().sum::<u32>() / heart_rates.len() as u32
        };

        let intensity_score = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(sample_intensity).sum::<f64>() / samples.len() as f64
        };

        PerformanceMetrics {
            work_rate: self.estimator.work_rate(samples),
            intensity_score,
            fatigue_index: self.estimator.fatigue_index(samples),
            recovery_time: self.estimator.recovery_time_secs(samples),
            max_heart_rate: max_heart_rate as u16,
            average_heart_rate: average_heart_rate as u16,
            vo2_max: self.estimator.vo2_max(samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Biometrics, Movement, Position};
    use chrono::Utc;

    fn create_sample(speed: f64, acceleration: f64, heart_rate: Option<u16>) -> Sample {
        Sample {
            player_id: "p1".to_string(),
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
            position: Position {
                latitude: 53.4631,
                longitude: -2.2914,
                altitude: 40.0,
                accuracy: 1.5,
                satellites: 14,
            },
            movement: Movement {
                speed,
                acceleration,
                direction: 0.0,
                imu: None,
            },
            biometrics: heart_rate.map(|hr| Biometrics {
                heart_rate: hr,
                body_temperature: 37.2,
                stress_level: 4,
            }),
            environmental: None,
        }
    }

    #[test]
    fn test_heart_rate_aggregates_skip_missing_readings() {
        let samples = vec![
            create_sample(10.0, 0.0, Some(150)),
            create_sample(12.0, 0.0, None),
            create_sample(14.0, 0.0, Some(0)),
            create_sample(16.0, 0.0, Some(171)),
        ];

        let estimator = PlaceholderPerformanceEstimator;
        let metrics = PerformanceMetricsCalculator::new(&estimator).calculate(&samples);

        assert_eq!(metrics.max_heart_rate, 171);
        assert_eq!(metrics.average_heart_rate, 160);
    }

    #[test]
    fn test_intensity_score() {
        let samples = vec![
            create_sample(30.0, 5.0, None),
            create_sample(0.0, -2.5, None),
            create_sample(300.0, 50.0, None),
        ];

        let estimator = PlaceholderPerformanceEstimator;
        let metrics = PerformanceMetricsCalculator::new(&estimator).calculate(&samples);

        // 2.0, 0.5 and a capped 10.0
        assert!((metrics.intensity_score - 12.5 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.max_heart_rate, 0);
        assert_eq!(metrics.average_heart_rate, 0);
    }

    #[test]
    fn test_placeholder_estimates() {
        let estimator = PlaceholderPerformanceEstimator;
        let metrics = PerformanceMetricsCalculator::new(&estimator).calculate(&[]);

        assert_eq!(metrics.work_rate, 85.0);
        assert_eq!(metrics.fatigue_index, 5.0);
        assert_eq!(metrics.recovery_time, 120.0);
        assert_eq!(metrics.vo2_max, 45.0);
        assert_eq!(metrics.intensity_score, 0.0);
    }
}
