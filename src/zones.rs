use crate::config::{FieldConfig, ThresholdConfig};
use crate::models::SpeedZone;

/// Speed band classification
pub struct SpeedZoneCalculator;

impl SpeedZoneCalculator {
    /// Determine which speed zone a speed in km/h falls into
    ///
    /// Each band is open at its lower bound:
    /// - Sprinting: > sprint threshold (24)
    /// - High intensity: > 19.8
    /// - Running: > 14
    /// - Jogging: > 7
    /// - Walking: everything else, including negative or NaN readings
    pub fn classify(speed: f64, thresholds: &ThresholdConfig) -> SpeedZone {
        if speed > thresholds.sprint_kmh {
            SpeedZone::Sprinting
        } else if speed > thresholds.high_intensity_kmh() {
            SpeedZone::HighIntensity
        } else if speed > thresholds.jogging_max_kmh {
            SpeedZone::Running
        } else if speed > thresholds.walking_max_kmh {
            SpeedZone::Jogging
        } else {
            SpeedZone::Walking
        }
    }

    /// True when the speed is above the sprint threshold
    pub fn is_sprint(speed: f64, thresholds: &ThresholdConfig) -> bool {
        speed > thresholds.sprint_kmh
    }

    /// True when the speed is above the high-intensity threshold (sprints included)
    pub fn is_high_intensity(speed: f64, thresholds: &ThresholdConfig) -> bool {
        speed > thresholds.high_intensity_kmh()
    }
}

/// Square grid over the synthetic field used for heat maps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGrid {
    divisions: u32,
    cell_size: f64,
}

impl FieldGrid {
    pub fn new(config: &FieldConfig) -> Self {
        let divisions = config.grid_divisions.max(1);
        FieldGrid {
            divisions,
            cell_size: config.field_size / divisions as f64,
        }
    }

    pub fn divisions(&self) -> u32 {
        self.divisions
    }

    /// 1-based cell index of a coordinate along one axis, clamped to the grid
    pub fn cell_index(&self, value: f64) -> u32 {
        if !value.is_finite() || value <= 0.0 || self.cell_size <= 0.0 {
            return 1;
        }
        let index = (value / self.cell_size).floor() as u32 + 1;
        index.min(self.divisions)
    }

    /// Zone identifier `zone_{x}_{y}` for a field coordinate
    pub fn zone_for(&self, x: f64, y: f64) -> String {
        format!("zone_{}_{}", self.cell_index(x), self.cell_index(y))
    }

    /// Total number of cells on the grid
    pub fn cell_count(&self) -> usize {
        (self.divisions * self.divisions) as usize
    }
}

impl Default for FieldGrid {
    fn default() -> Self {
        FieldGrid::new(&FieldConfig::default())
    }
}
