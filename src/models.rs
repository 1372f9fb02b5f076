use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Three-axis sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }

    /// Euclidean norm of the vector
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// GNSS fix attached to a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees
    pub latitude: f64,

    /// Longitude in decimal degrees
    pub longitude: f64,

    /// Altitude in meters above sea level
    pub altitude: f64,

    /// Horizontal accuracy in meters
    pub accuracy: f64,

    /// Number of satellites used for the fix
    pub satellites: u8,
}

/// Inertial measurement unit readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    /// Accelerometer in m/s²
    pub accelerometer: Vector3,

    /// Gyroscope in rad/s
    pub gyroscope: Vector3,

    /// Magnetometer in µT
    pub magnetometer: Vector3,
}

/// Instantaneous movement state reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Speed in km/h
    pub speed: f64,

    /// Longitudinal acceleration in m/s² (negative when braking)
    pub acceleration: f64,

    /// Heading in degrees
    pub direction: f64,

    /// Raw IMU data, absent on GNSS-only devices
    pub imu: Option<ImuData>,
}

/// Biometric readings from a chest strap or optical sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biometrics {
    /// Heart rate in beats per minute (0 when the sensor lost contact)
    pub heart_rate: u16,

    /// Body temperature in °C
    pub body_temperature: f64,

    /// Self-reported or derived stress level on a 1-10 scale
    pub stress_level: u8,
}

/// Ambient conditions at the time of the sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environmental {
    /// Temperature in °C
    pub temperature: f64,

    /// Barometric pressure in hPa
    pub pressure: f64,

    /// Relative humidity in %
    pub humidity: f64,
}

/// One telemetry reading from a wearable tracker
///
/// Samples are immutable once recorded. They are ordered by `timestamp`,
/// ties keep arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub player_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    pub movement: Movement,
    pub biometrics: Option<Biometrics>,
    pub environmental: Option<Environmental>,
}

impl Sample {
    /// Heart rate if a biometric sensor reported a positive value
    pub fn heart_rate(&self) -> Option<u16> {
        self.biometrics
            .as_ref()
            .map(|b| b.heart_rate)
            .filter(|hr| *hr > 0)
    }

    /// Accelerometer vector if IMU data is present
    pub fn accelerometer(&self) -> Option<Vector3> {
        self.movement.imu.as_ref().map(|imu| imu.accelerometer)
    }
}

/// Sort samples by timestamp, keeping arrival order for equal timestamps
pub fn sort_samples(samples: &mut [Sample]) {
    // sort_by is stable, which preserves arrival order on ties
    samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

/// The five mutually exclusive speed bands used to partition distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedZone {
    Walking,
    Jogging,
    Running,
    HighIntensity,
    Sprinting,
}

impl SpeedZone {
    pub const ALL: [SpeedZone; 5] = [
        SpeedZone::Walking,
        SpeedZone::Jogging,
        SpeedZone::Running,
        SpeedZone::HighIntensity,
        SpeedZone::Sprinting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpeedZone::Walking => "walking",
            SpeedZone::Jogging => "jogging",
            SpeedZone::Running => "running",
            SpeedZone::HighIntensity => "high_intensity",
            SpeedZone::Sprinting => "sprinting",
        }
    }
}

impl fmt::Display for SpeedZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Distance, speed and impact features for one session window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementMetrics {
    /// Total distance in meters
    pub total_distance: f64,

    /// Distance covered above the sprint threshold in meters
    pub sprint_distance: f64,

    /// Distance covered in the high-intensity band in meters
    pub high_intensity_distance: f64,

    /// Number of entries into the sprint zone
    pub sprint_count: u32,

    /// Samples with acceleration above the event threshold
    pub acceleration_count: u32,

    /// Samples with deceleration below the negative event threshold
    pub deceleration_count: u32,

    /// Maximum speed in km/h
    pub max_speed: f64,

    /// Average speed in km/h
    pub average_speed: f64,

    /// Jump proxy count from vertical acceleration
    pub jump_count: u32,

    /// Cumulative accelerometer magnitude, scaled
    pub player_load: f64,

    /// Distance per speed zone in meters; always holds all five zones
    pub speed_zones: BTreeMap<SpeedZone, f64>,
}

impl MovementMetrics {
    /// Sum of all zone distances, equal to `total_distance` up to rounding
    pub fn zone_distance_sum(&self) -> f64 {
        self.speed_zones.values().sum()
    }
}

/// Heart-rate and intensity aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Work rate in %
    pub work_rate: f64,

    /// Intensity score on a 0-10 scale
    pub intensity_score: f64,

    /// Fatigue index on a 1-10 scale
    pub fatigue_index: f64,

    /// Estimated recovery time in seconds
    pub recovery_time: f64,

    /// Maximum heart rate observed (0 when no sensor data)
    pub max_heart_rate: u16,

    /// Average heart rate observed (0 when no sensor data)
    pub average_heart_rate: u16,

    /// Estimated VO2max in ml/kg/min
    pub vo2_max: f64,
}

/// Positional features on the synthetic 0-100 field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalMetrics {
    /// Field coverage in %
    pub field_coverage: f64,

    /// Sample counts per field zone (`zone_{x}_{y}`)
    pub heat_map: BTreeMap<String, u32>,

    /// Formation adherence in %
    pub formation_adherence: f64,

    /// Team synchronization in %
    pub team_synchronization: f64,

    /// Mean field X coordinate
    pub average_position_x: f64,

    /// Mean field Y coordinate
    pub average_position_y: f64,
}

/// Training load indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadMetrics {
    /// Acute (7-day) load
    pub acute_load: f64,

    /// Chronic (28-day) load
    pub chronic_load: f64,

    /// Acute:chronic ratio, 0 when chronic load is 0
    pub acute_chronic_ratio: f64,

    pub training_stress_score: f64,

    /// Hours of recovery recommended before the next hard session
    pub recovery_hours: u32,

    /// Readiness on a 1-10 scale
    pub readiness_score: f64,
}

/// Aggregated metrics for a player over one session (or a trailing window of it)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub player_id: String,
    pub session_id: String,
    pub calculated_at: DateTime<Utc>,
    pub movement: MovementMetrics,
    pub performance: PerformanceMetrics,
    pub tactical: TacticalMetrics,
    pub load: LoadMetrics,
}

/// Categories of scored outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionType {
    InjuryRisk,
    PerformanceDecline,
    OptimalPosition,
    FatigueLevel,
    RecoveryTime,
    TacticalRecommendation,
}

impl PredictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::InjuryRisk => "INJURY_RISK",
            PredictionType::PerformanceDecline => "PERFORMANCE_DECLINE",
            PredictionType::OptimalPosition => "OPTIMAL_POSITION",
            PredictionType::FatigueLevel => "FATIGUE_LEVEL",
            PredictionType::RecoveryTime => "RECOVERY_TIME",
            PredictionType::TacticalRecommendation => "TACTICAL_RECOMMENDATION",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PredictionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INJURY_RISK" => Ok(PredictionType::InjuryRisk),
            "PERFORMANCE_DECLINE" => Ok(PredictionType::PerformanceDecline),
            "OPTIMAL_POSITION" => Ok(PredictionType::OptimalPosition),
            "FATIGUE_LEVEL" => Ok(PredictionType::FatigueLevel),
            "RECOVERY_TIME" => Ok(PredictionType::RecoveryTime),
            "TACTICAL_RECOMMENDATION" => Ok(PredictionType::TacticalRecommendation),
            _ => Err(format!("Invalid prediction type: {}", s)),
        }
    }
}

/// A scored, categorized output of a heuristic scorer. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub player_id: Option<String>,
    pub session_id: Option<String>,
    pub prediction_type: PredictionType,

    /// Feature mapping the score was computed from
    pub input: serde_json::Value,

    /// Recommendation mapping
    pub output: serde_json::Value,

    /// Confidence in [0, 1]
    pub confidence: f64,

    pub predicted_at: DateTime<Utc>,
}

impl Prediction {
    /// Build a prediction, clamping confidence into [0, 1]
    pub fn new(
        prediction_type: PredictionType,
        player_id: Option<String>,
        session_id: Option<String>,
        input: serde_json::Value,
        output: serde_json::Value,
        confidence: f64,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Prediction {
            id: Uuid::new_v4(),
            player_id,
            session_id,
            prediction_type,
            input,
            output,
            confidence,
            predicted_at: Utc::now(),
        }
    }

    /// Look up a string field of the output mapping
    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.output.get(key).and_then(|v| v.as_str())
    }

    /// Look up a numeric field of the output mapping
    pub fn output_f64(&self, key: &str) -> Option<f64> {
        self.output.get(key).and_then(|v| v.as_f64())
    }
}

/// Physical profile used to personalise performance analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Best recorded speed in km/h
    pub max_speed: f64,

    /// Typical match speed in km/h
    pub average_speed: f64,

    pub max_heart_rate: u16,

    pub resting_heart_rate: u16,

    pub preferred_positions: Vec<String>,

    /// Fitness level on a 1-10 scale
    pub fitness_level: f64,
}

/// Registered player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,

    /// Role string such as "Forward" or "Goalkeeper"
    pub position: Option<String>,

    pub jersey_number: Option<u8>,
    pub team_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,

    /// Height in centimeters
    pub height: Option<f64>,

    /// Weight in kilograms
    pub weight: Option<f64>,

    pub device_id: Option<String>,
    pub active: bool,
    pub profile: Option<PlayerProfile>,
}

/// Kind of on-field session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Training,
    Match,
    Recovery,
    FitnessTest,
}

/// A training session or match that samples are recorded against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: String,
    pub team_id: Option<String>,
    pub name: String,
    pub session_type: SessionType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub player_ids: Vec<String>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(seconds: i64, speed: f64) -> Sample {
        Sample {
            player_id: "p1".to_string(),
            session_id: "s1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 9, 23, 10, 0, 0).unwrap()
                + chrono::Duration::seconds(seconds),
            position: Position {
                latitude: 53.4631,
                longitude: -2.2914,
                altitude: 50.0,
                accuracy: 2.0,
                satellites: 12,
            },
            movement: Movement {
                speed,
                acceleration: 0.0,
                direction: 0.0,
                imu: None,
            },
            biometrics: None,
            environmental: None,
        }
    }

    #[test]
    fn test_speed_zone_serialization() {
        let json = serde_json::to_string(&SpeedZone::HighIntensity).unwrap();
        assert_eq!(json, "\"high_intensity\"");

        let mut zones = BTreeMap::new();
        zones.insert(SpeedZone::Sprinting, 12.5);
        let json = serde_json::to_string(&zones).unwrap();
        assert_eq!(json, "{\"sprinting\":12.5}");
    }

    #[test]
    fn test_prediction_type_parsing() {
        assert_eq!(
            "fatigue_level".parse::<PredictionType>().unwrap(),
            PredictionType::FatigueLevel
        );
        assert!("unknown".parse::<PredictionType>().is_err());

        let json = serde_json::to_string(&PredictionType::TacticalRecommendation).unwrap();
        assert_eq!(json, "\"TACTICAL_RECOMMENDATION\"");
    }

    #[test]
    fn test_prediction_confidence_clamped() {
        let p = Prediction::new(
            PredictionType::InjuryRisk,
            Some("p1".to_string()),
            None,
            serde_json::Value::Null,
            serde_json::json!({"riskLevel": "LOW"}),
            1.7,
        );
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.output_str("riskLevel"), Some("LOW"));

        let p = Prediction::new(
            PredictionType::InjuryRisk,
            None,
            None,
            serde_json::Value::Null,
            serde_json::Value::Null,
            f64::NAN,
        );
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn test_sort_samples_keeps_arrival_order_on_ties() {
        let mut samples = vec![sample_at(2, 1.0), sample_at(1, 2.0), sample_at(1, 3.0)];
        sort_samples(&mut samples);

        let speeds: Vec<f64> = samples.iter().map(|s| s.movement.speed).collect();
        assert_eq!(speeds, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_heart_rate_filters_zero_readings() {
        let mut sample = sample_at(0, 5.0);
        assert_eq!(sample.heart_rate(), None);

        sample.biometrics = Some(Biometrics {
            heart_rate: 0,
            body_temperature: 37.0,
            stress_level: 3,
        });
        assert_eq!(sample.heart_rate(), None);

        sample.biometrics.as_mut().unwrap().heart_rate = 152;
        assert_eq!(sample.heart_rate(), Some(152));
    }

    #[test]
    fn test_vector_magnitude() {
        assert!((Vector3::new(3.0, 4.0, 12.0).magnitude() - 13.0).abs() < 1e-12);
    }
}
