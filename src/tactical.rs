use std::collections::BTreeMap;

use crate::config::FieldConfig;
use crate::models::{Position, Sample, TacticalMetrics};
use crate::zones::FieldGrid;

/// Maps a geographic position onto the synthetic 0-100 field
pub trait FieldProjection: Send + Sync {
    /// Field coordinates `(x, y)` of a position
    fn project(&self, position: &Position) -> (f64, f64);
}

/// Linear degrees-to-field scaling: `x = lon × scale`, `y = lat × scale`
///
/// A stand-in calibration. Real pitches need a measured homography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFieldProjection {
    pub scale: f64,
}

impl LinearFieldProjection {
    pub fn new(scale: f64) -> Self {
        LinearFieldProjection { scale }
    }
}

impl Default for LinearFieldProjection {
    fn default() -> Self {
        LinearFieldProjection::new(FieldConfig::default().projection_scale)
    }
}

impl FieldProjection for LinearFieldProjection {
    fn project(&self, position: &Position) -> (f64, f64) {
        (position.longitude * self.scale, position.latitude * self.scale)
    }
}

/// Positional quality estimates that need team context
pub trait PositionalModel: Send + Sync {
    /// Field coverage in %
    fn field_coverage(&self, samples: &[Sample]) -> f64;

    /// Formation adherence in %
    fn formation_adherence(&self, samples: &[Sample]) -> f64;

    /// Team synchronization in %
    fn team_synchronization(&self, samples: &[Sample]) -> f64;
}

/// Fixed estimates used until a positional model is available
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderPositionalModel;

impl PositionalModel for PlaceholderPositionalModel {
    fn field_coverage(&self, _samples: &[Sample]) -> f64 {
        75.0
    }

    fn formation_adherence(&self, _samples: &[Sample]) -> f64 {
        80.0
    }

    fn team_synchronization(&self, _samples: &[Sample]) -> f64 {
        70.0
    }
}

/// Occupancy count per grid zone for a set of samples
pub fn build_heat_map(
    samples: &[Sample],
    projection: &dyn FieldProjection,
    grid: &FieldGrid,
) -> BTreeMap<String, u32> {
    let mut heat_map = BTreeMap::new();
    for sample in samples {
        let (x, y) = projection.project(&sample.position);
        *heat_map.entry(grid.zone_for(x, y)).or_insert(0) += 1;
    }
    heat_map
}

/// Mean field position of a set of samples, `(0, 0)` when empty
pub fn average_field_position(samples: &[Sample], projection: &dyn FieldProjection) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }

    let (sum_x, sum_y) = samples.iter().fold((0.0, 0.0), |(sx, sy), sample| {
        let (x, y) = projection.project(&sample.position);
        (sx + x, sy + y)
    });
    let n = samples.len() as f64;
    (sum_x / n, sum_y / n)
}

/// Average field position and heat-map occupancy
pub struct TacticalMetricsCalculator<'a> {
    projection: &'a dyn FieldProjection,
    positional_model: &'a dyn PositionalModel,
    grid: FieldGrid,
}

impl<'a> TacticalMetricsCalculator<'a> {
    pub fn new(
        projection: &'a dyn FieldProjection,
        positional_model: &'a dyn PositionalModel,
        grid: FieldGrid,
    ) -> Self {
        TacticalMetricsCalculator {
            projection,
            positional_model,
            grid,
        }
    }

    pub fn calculate(&self, samples: &[Sample]) -> TacticalMetrics {
        let (average_position_x, average_position_y) =
            average_field_position(samples, self.projection);

        TacticalMetrics {
            field_coverage: self.positional_model.field_coverage(samples),
            heat_map: build_heat_map(samples, self.projection, &self.grid),
            formation_adherence: self.positional_model.formation_adherence(samples),
            team_synchronization: self.positional_model.team_synchronization(samples),
            average_position_x,
            average_position_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Movement;
    use chrono::Utc;

    fn create_sample(latitude: f64, longitude: f64) -> Sample {
        Sample {
            player_id: "p1".to_string(),
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
            position: Position {
                latitude,
                longitude,
                altitude: 0.0,
                accuracy: 2.0,
                satellites: 10,
            },
            movement: Movement {
                speed: 8.0,
                acceleration: 0.0,
                direction: 0.0,
                imu: None,
            },
            biometrics: None,
            environmental: None,
        }
    }

    #[test]
    fn test_linear_projection() {
        let projection = LinearFieldProjection::default();
        let (x, y) = projection.project(&create_sample(0.0005, 0.0002).position);
        assert!((x - 20.0).abs() < 1e-9);
        assert!((y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_heat_map_and_average_position() {
        // Field units are 1e-5 degrees
        let samples = vec![
            create_sample(0.0005, 0.0005),
            create_sample(0.0005, 0.0005),
            create_sample(0.0009, 0.0001),
        ];

        let projection = LinearFieldProjection::default();
        let model = PlaceholderPositionalModel;
        let metrics = TacticalMetricsCalculator::new(&projection, &model, FieldGrid::default())
            .calculate(&samples);

        assert_eq!(metrics.heat_map.get("zone_2_2"), Some(&2));
        assert_eq!(metrics.heat_map.get("zone_1_3"), Some(&1));
        assert_eq!(metrics.heat_map.values().sum::<u32>(), 3);
        assert!((metrics.average_position_x - 110.0 / 3.0).abs() < 1e-6);
        assert!((metrics.average_position_y - 190.0 / 3.0).abs() < 1e-6);
        assert_eq!(metrics.field_coverage, 75.0);
        assert_eq!(metrics.formation_adherence, 80.0);
        assert_eq!(metrics.team_synchronization, 70.0);
    }

    #[test]
    fn test_empty_window() {
        let projection = LinearFieldProjection::default();
        let model = PlaceholderPositionalModel;
        let metrics = TacticalMetricsCalculator::new(&projection, &model, FieldGrid::default())
            .calculate(&[]);

        assert!(metrics.heat_map.is_empty());
        assert_eq!(metrics.average_position_x, 0.0);
    }
}
