use chrono::{DateTime, Duration, Utc};

use crate::config::WindowConfig;
use crate::models::{LoadMetrics, Sample, SessionMetrics};

/// Load units contributed by each sample
pub const LOAD_PER_SAMPLE: f64 = 0.1;

/// Training stress points per load unit
pub const TSS_PER_LOAD_UNIT: f64 = 10.0;

const PROXY_CHRONIC_FACTOR: f64 = 0.8;
const DEFAULT_RECOVERY_HOURS: u32 = 24;
const DEFAULT_READINESS: f64 = 8.0;

/// Load of one session window
pub fn session_load(samples: &[Sample]) -> f64 {
    LOAD_PER_SAMPLE * samples.len() as f64
}

/// Load of a stored session, recovered from its training stress score
pub fn stored_session_load(metrics: &SessionMetrics) -> f64 {
    metrics.load.training_stress_score / TSS_PER_LOAD_UNIT
}

/// Acute:chronic ratio, 0 when there is no chronic load
pub fn acute_chronic_ratio(acute: f64, chronic: f64) -> f64 {
    if chronic > 0.0 && chronic.is_finite() {
        acute / chronic
    } else {
        0.0
    }
}

/// Acute/chronic training load model
pub trait LoadModel: Send + Sync {
    /// Days of stored history the model wants, 0 when it needs none
    fn history_days(&self) -> i64 {
        0
    }

    /// Compute load metrics for the current window
    ///
    /// `history` holds earlier session metrics for the same player, `as_of`
    /// is the reference instant for rolling windows.
    fn calculate(
        &self,
        samples: &[Sample],
        history: &[SessionMetrics],
        as_of: DateTime<Utc>,
    ) -> LoadMetrics;
}

/// Single-session proxy: chronic load is 80% of acute, so the ratio is 1.25
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyLoadModel;

impl LoadModel for ProxyLoadModel {
    fn calculate(
        &self,
        samples: &[Sample],
        _history: &[SessionMetrics],
        _as_of: DateTime<Utc>,
    ) -> LoadMetrics {
        let acute_load = session_load(samples);
        let chronic_load = acute_load * PROXY_CHRONIC_FACTOR;

        LoadMetrics {
            acute_load,
            chronic_load,
            acute_chronic_ratio: acute_chronic_ratio(acute_load, chronic_load),
            training_stress_score: acute_load * TSS_PER_LOAD_UNIT,
            recovery_hours: DEFAULT_RECOVERY_HOURS,
            readiness_score: DEFAULT_READINESS,
        }
    }
}

/// Rolling means of session load over acute and chronic windows
///
/// The current window counts as one session in both means. Stored metrics
/// for the same session are ignored so recomputation is stable.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingLoadModel {
    acute_days: i64,
    chronic_days: i64,
}

impl RollingLoadModel {
    pub fn new(acute_days: i64, chronic_days: i64) -> Self {
        RollingLoadModel {
            acute_days,
            chronic_days,
        }
    }

    pub fn from_windows(windows: &WindowConfig) -> Self {
        RollingLoadModel::new(windows.acute_load_days, windows.chronic_load_days)
    }

    fn window_mean(
        &self,
        current: f64,
        history: &[SessionMetrics],
        session_id: Option<&str>,
        as_of: DateTime<Utc>,
        days: i64,
    ) -> f64 {
        let start = as_of - Duration::days(days);
        let loads: Vec<f64> = history
            .iter()
            .filter(|m| Some(m.session_id.as_str()) != session_id)
            .filter(|m| m.calculated_at > start && m.calculated_at <= as_of)
            .map(stored_session_load)
            .collect();

        (loads.iter().sum::<f64>() + current) / (loads.len() + 1) as f64
    }
}

impl Default for RollingLoadModel {
    fn default() -> Self {
        RollingLoadModel::from_windows(&WindowConfig::default())
    }
}

impl LoadModel for RollingLoadModel {
    fn history_days(&self) -> i64 {
        self.chronic_days
    }

    fn calculate(
        &self,
        samples: &[Sample],
        history: &[SessionMetrics],
        as_of: DateTime<Utc>,
    ) -> LoadMetrics {
        let current = session_load(samples);
        let session_id = samples.first().map(|s| s.session_id.as_str());

        let acute_load = self.window_mean(current, history, session_id, as_of, self.acute_days);
        let chronic_load = self.window_mean(current, history, session_id, as_of, self.chronic_days);

        LoadMetrics {
            acute_load,
            chronic_load,
            acute_chronic_ratio: acute_chronic_ratio(acute_load, chronic_load),
            training_stress_score: current * TSS_PER_LOAD_UNIT,
            recovery_hours: DEFAULT_RECOVERY_HOURS,
            readiness_score: DEFAULT_READINESS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MovementMetrics, Movement, PerformanceMetrics, Position, TacticalMetrics,
    };
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn create_samples(count: usize, session_id: &str) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample {
                player_id: "p1".to_string(),
                session_id: session_id.to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 9, 23, 10, 0, 0).unwrap()
                    + Duration::seconds(i as i64),
                position: Position {
                    latitude: 53.0,
                    longitude: -2.0,
                    altitude: 0.0,
                    accuracy: 2.0,
                    satellites: 9,
                },
                movement: Movement {
                    speed: 10.0,
                    acceleration: 0.0,
                    direction: 0.0,
                    imu: None,
                },
                biometrics: None,
                environmental: None,
            })
            .collect()
    }

    fn stored(session_id: &str, days_ago: i64, tss: f64, as_of: DateTime<Utc>) -> SessionMetrics {
        SessionMetrics {
            player_id: "p1".to_string(),
            session_id: session_id.to_string(),
            calculated_at: as_of - Duration::days(days_ago),
            movement: MovementMetrics {
                total_distance: 0.0,
                sprint_distance: 0.0,
                high_intensity_distance: 0.0,
                sprint_count: 0,
                acceleration_count: 0,
                deceleration_count: 0,
                max_speed: 0.0,
                average_speed: 0.0,
                jump_count: 0,
                player_load: 0.0,
                speed_zones: BTreeMap::new(),
            },
            performance: PerformanceMetrics {
                work_rate: 85.0,
                intensity_score: 0.0,
                fatigue_index: 5.0,
                recovery_time: 120.0,
                max_heart_rate: 0,
                average_heart_rate: 0,
                vo2_max: 45.0,
            },
            tactical: TacticalMetrics {
                field_coverage: 75.0,
                heat_map: BTreeMap::new(),
                formation_adherence: 80.0,
                team_synchronization: 70.0,
                average_position_x: 0.0,
                average_position_y: 0.0,
            },
            load: LoadMetrics {
                acute_load: 0.0,
                chronic_load: 0.0,
                acute_chronic_ratio: 0.0,
                training_stress_score: tss,
                recovery_hours: 24,
                readiness_score: 8.0,
            },
        }
    }

    #[test]
    fn test_proxy_load_model() {
        let load = ProxyLoadModel.calculate(&create_samples(100, "s1"), &[], Utc::now());

        assert!((load.acute_load - 10.0).abs() < 1e-9);
        assert!((load.chronic_load - 8.0).abs() < 1e-9);
        assert!((load.acute_chronic_ratio - 1.25).abs() < 1e-9);
        assert!((load.training_stress_score - 100.0).abs() < 1e-9);
        assert_eq!(load.recovery_hours, 24);
        assert_eq!(load.readiness_score, 8.0);
    }

    #[test]
    fn test_ratio_guarded_without_chronic_load() {
        assert_eq!(acute_chronic_ratio(5.0, 0.0), 0.0);
        assert_eq!(acute_chronic_ratio(0.0, 0.0), 0.0);

        let load = ProxyLoadModel.calculate(&[], &[], Utc::now());
        assert_eq!(load.chronic_load, 0.0);
        assert_eq!(load.acute_chronic_ratio, 0.0);
    }

    #[test]
    fn test_rolling_load_model_windows() {
        let as_of = Utc.with_ymd_and_hms(2024, 9, 30, 12, 0, 0).unwrap();
        let history = vec![
            stored("old", 20, 40.0, as_of),
            stored("recent", 3, 120.0, as_of),
            stored("current", 0, 999.0, as_of),
        ];

        let model = RollingLoadModel::default();
        assert_eq!(model.history_days(), 28);

        let load = model.calculate(&create_samples(80, "current"), &history, as_of);

        // Current session load is 8; acute averages 12 and 8, chronic adds 4
        assert!((load.acute_load - 10.0).abs() < 1e-9);
        assert!((load.chronic_load - 8.0).abs() < 1e-9);
        assert!((load.acute_chronic_ratio - 1.25).abs() < 1e-9);
        assert!((load.training_stress_score - 80.0).abs() < 1e-9);
    }
}
