use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use super::{build_prediction, to_strings, Confidence, ScoreBand, ScoreTable};
use crate::config::ThresholdConfig;
use crate::error::Result;
use crate::kinematics::{haversine_meters, mean, population_std_dev};
use crate::models::{Prediction, PredictionType, Sample, SessionMetrics};

/// In-session fatigue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FatigueCategory {
    Low,
    Moderate,
    High,
    Severe,
}

impl FatigueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueCategory::Low => "LOW",
            FatigueCategory::Moderate => "MODERATE",
            FatigueCategory::High => "HIGH",
            FatigueCategory::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for FatigueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed response attached to a fatigue category
#[derive(Debug)]
pub struct FatigueResponse {
    pub category: FatigueCategory,
    pub immediate_actions: &'static [&'static str],
    pub recovery_protocols: &'static [&'static str],
    pub estimated_recovery_time: &'static str,
}

static FATIGUE_BANDS: [ScoreBand<FatigueResponse>; 3] = [
    ScoreBand {
        above: 0.8,
        outcome: FatigueResponse {
            category: FatigueCategory::Severe,
            immediate_actions: &[
                "IMMEDIATE SUBSTITUTION RECOMMENDED",
                "Complete rest for remainder of session",
                "Medical assessment required",
            ],
            recovery_protocols: &[
                "Ice bath therapy",
                "Extended sleep (9+ hours)",
                "Nutritional recovery plan",
            ],
            estimated_recovery_time: "24-48 hours",
        },
    },
    ScoreBand {
        above: 0.6,
        outcome: FatigueResponse {
            category: FatigueCategory::High,
            immediate_actions: &[
                "Consider substitution in next 10-15 minutes",
                "Reduce intensity - avoid high-speed runs",
                "Monitor closely for further decline",
            ],
            recovery_protocols: &[
                "Active recovery protocols",
                "Hydration focus",
                "Light stretching",
            ],
            estimated_recovery_time: "12-24 hours",
        },
    },
    ScoreBand {
        above: 0.3,
        outcome: FatigueResponse {
            category: FatigueCategory::Moderate,
            immediate_actions: &[
                "Manage workload - avoid unnecessary sprints",
                "Increase recovery time between efforts",
                "Monitor for progression to high fatigue",
            ],
            recovery_protocols: &["Proper cool-down routine", "Adequate hydration"],
            estimated_recovery_time: "6-12 hours",
        },
    },
];

/// Score-to-response policy for fatigue
pub static FATIGUE_TABLE: ScoreTable<FatigueResponse> = ScoreTable::new(
    &FATIGUE_BANDS,
    FatigueResponse {
        category: FatigueCategory::Low,
        immediate_actions: &[
            "Continue current activity level",
            "Maintain awareness of fatigue indicators",
        ],
        recovery_protocols: &["Standard recovery protocols"],
        estimated_recovery_time: "2-6 hours",
    },
);

/// Average speed in the first and last quarter of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedDecline {
    pub first_quarter_speed: f64,
    pub last_quarter_speed: f64,
    /// Percentage drop from first to last quarter, 0 when the first quarter is empty or still
    pub speed_decline_percentage: f64,
}

/// Average |acceleration| in the first and last quarter of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccelerationDecline {
    pub first_quarter_acceleration: f64,
    pub last_quarter_acceleration: f64,
    /// Percentage drop from first to last quarter
    pub acceleration_decline: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateAnalysis {
    pub available: bool,
    #[serde(rename = "averageHR", skip_serializing_if = "Option::is_none")]
    pub average_hr: Option<f64>,
    #[serde(rename = "maxHR", skip_serializing_if = "Option::is_none")]
    pub max_hr: Option<u16>,
    #[serde(rename = "hrVariability", skip_serializing_if = "Option::is_none")]
    pub hr_variability: Option<f64>,
    /// Share of readings above the zone-4 threshold, in %
    #[serde(rename = "timeInZone4Plus", skip_serializing_if = "Option::is_none")]
    pub time_in_zone4_plus: Option<f64>,
}

/// Features the fatigue score is computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueAnalysis {
    pub speed_decline: SpeedDecline,
    pub heart_rate: HeartRateAnalysis,
    /// Meters covered per unit of cumulative |acceleration|
    pub movement_efficiency: f64,
    pub acceleration: AccelerationDecline,
    /// Seconds between the end of one high-intensity effort and the next
    pub recovery_times: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_rate: Option<f64>,
}

impl FatigueAnalysis {
    pub fn average_recovery(&self) -> Option<f64> {
        if self.recovery_times.is_empty() {
            None
        } else {
            Some(mean(&self.recovery_times))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueAssessment {
    pub fatigue_level: f64,
    pub fatigue_category: FatigueCategory,
    pub immediate_actions: Vec<String>,
    pub recovery_protocols: Vec<String>,
    pub estimated_recovery_time: String,
    pub key_indicators: Vec<String>,
}

/// Percentage decline from `first` to `last`, 0 when `first` is 0
fn decline_percentage(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        0.0
    } else {
        (first - last) / first * 100.0
    }
}

/// Mean of the first and last quarter of a series
///
/// The first quarter is `[0, n/4)`, the last `[3n/4, n)` with integer
/// division, so short series have an empty first quarter.
fn quarter_means(values: &[f64]) -> (f64, f64) {
    let quarter = values.len() / 4;
    (mean(&values[..quarter]), mean(&values[3 * quarter..]))
}

/// Detects in-session fatigue from speed, heart-rate and effort patterns
pub struct FatigueScorer {
    thresholds: ThresholdConfig,
}

impl FatigueScorer {
    pub fn new() -> Self {
        FatigueScorer {
            thresholds: ThresholdConfig::default(),
        }
    }

    pub fn with_config(thresholds: ThresholdConfig) -> Self {
        FatigueScorer { thresholds }
    }

    fn is_effort(&self, sample: &Sample) -> bool {
        sample.movement.speed > self.thresholds.effort_speed_kmh
            || sample.movement.acceleration.abs() > self.thresholds.acceleration_ms2
    }

    /// Extract fatigue features from samples sorted ascending by timestamp
    pub fn analyze(&self, samples: &[Sample], metrics: Option<&SessionMetrics>) -> FatigueAnalysis {
        let speeds: Vec<f64> = samples.iter().map(|s| s.movement.speed).collect();
        let (first_quarter_speed, last_quarter_speed) = quarter_means(&speeds);

        let accelerations: Vec<f64> = samples
            .iter()
            .map(|s| s.movement.acceleration.abs())
            .collect();
        let (first_quarter_acceleration, last_quarter_acceleration) = quarter_means(&accelerations);

        FatigueAnalysis {
            speed_decline: SpeedDecline {
                first_quarter_speed,
                last_quarter_speed,
                speed_decline_percentage: decline_percentage(first_quarter_speed, last_quarter_speed),
            },
            heart_rate: self.analyze_heart_rate(samples),
            movement_efficiency: movement_efficiency(samples),
            acceleration: AccelerationDecline {
                first_quarter_acceleration,
                last_quarter_acceleration,
                acceleration_decline: decline_percentage(
                    first_quarter_acceleration,
                    last_quarter_acceleration,
                ),
            },
            recovery_times: self.recovery_times(samples),
            player_load: metrics.map(|m| m.movement.player_load),
            work_rate: metrics.map(|m| m.performance.work_rate),
        }
    }

    fn analyze_heart_rate(&self, samples: &[Sample]) -> HeartRateAnalysis {
        let heart_rates: Vec<f64> = samples
            .iter()
            .filter_map(Sample::heart_rate)
            .map(f64::from)
            .collect();

        if heart_rates.is_empty() {
            return HeartRateAnalysis {
                available: false,
                average_hr: None,
                max_hr: None,
                hr_variability: None,
                time_in_zone4_plus: None,
            };
        }

        let zone4_threshold = self.thresholds.high_hr_zone_bpm();
        let above = heart_rates.iter().filter(|hr| **hr > zone4_threshold).count();

        HeartRateAnalysis {
            available: true,
            average_hr: Some(mean(&heart_rates)),
            max_hr: samples.iter().filter_map(Sample::heart_rate).max(),
            hr_variability: Some(population_std_dev(&heart_rates)),
            time_in_zone4_plus: Some(above as f64 / heart_rates.len() as f64 * 100.0),
        }
    }

    /// Gaps between high-intensity efforts, in whole seconds
    ///
    /// An effort ends at the first sample below both thresholds; the gap runs
    /// from that sample to the next effort sample. An effort that never
    /// resumes adds no gap.
    fn recovery_times(&self, samples: &[Sample]) -> Vec<f64> {
        let mut recovery_times = Vec::new();
        let mut in_effort = false;

        for (i, sample) in samples.iter().enumerate() {
            let effort = self.is_effort(sample);

            if effort && !in_effort {
                in_effort = true;
            } else if !effort && in_effort {
                in_effort = false;

                if let Some(next) = samples[i + 1..].iter().find(|s| self.is_effort(s)) {
                    let gap = (next.timestamp - sample.timestamp).num_seconds();
                    recovery_times.push(gap as f64);
                }
            }
        }

        recovery_times
    }

    /// Weighted fatigue level in [0, 1]
    pub fn fatigue_level(&self, analysis: &FatigueAnalysis) -> f64 {
        let mut score = 0.0;

        let speed_decline = analysis.speed_decline.speed_decline_percentage;
        if speed_decline > 15.0 {
            score += 0.3;
        } else if speed_decline > 10.0 {
            score += 0.2;
        } else if speed_decline > 5.0 {
            score += 0.1;
        }

        if let Some(time_in_zone) = analysis.heart_rate.time_in_zone4_plus {
            if time_in_zone > 60.0 {
                score += 0.25;
            } else if time_in_zone > 40.0 {
                score += 0.15;
            }
        }

        if analysis.movement_efficiency < 50.0 {
            score += 0.2;
        } else if analysis.movement_efficiency < 75.0 {
            score += 0.1;
        }

        let acceleration_decline = analysis.acceleration.acceleration_decline;
        if acceleration_decline > 20.0 {
            score += 0.15;
        } else if acceleration_decline > 10.0 {
            score += 0.1;
        }

        if let Some(average_recovery) = analysis.average_recovery() {
            if average_recovery > 120.0 {
                score += 0.1;
            } else if average_recovery > 90.0 {
                score += 0.05;
            }
        }

        f64::min(score, 1.0)
    }

    pub fn key_indicators(&self, analysis: &FatigueAnalysis) -> Vec<String> {
        let mut indicators = Vec::new();

        if analysis.speed_decline.speed_decline_percentage > 10.0 {
            indicators.push("Significant speed decline detected".to_string());
        }
        if analysis.acceleration.acceleration_decline > 15.0 {
            indicators.push("Reduced acceleration capacity".to_string());
        }
        if analysis.movement_efficiency < 60.0 {
            indicators.push("Decreased movement efficiency".to_string());
        }
        if analysis.average_recovery().is_some_and(|avg| avg > 100.0) {
            indicators.push("Extended recovery times between efforts".to_string());
        }

        indicators
    }

    pub fn confidence(&self, analysis: &FatigueAnalysis) -> f64 {
        Confidence::base(0.7)
            .boost_if(analysis.heart_rate.available, 0.15)
            .boost_if(analysis.recovery_times.len() > 3, 0.1)
            .capped(0.95)
    }

    pub fn assess(&self, analysis: &FatigueAnalysis) -> FatigueAssessment {
        let fatigue_level = self.fatigue_level(analysis);
        let response = FATIGUE_TABLE.lookup(fatigue_level);

        FatigueAssessment {
            fatigue_level,
            fatigue_category: response.category,
            immediate_actions: to_strings(response.immediate_actions),
            recovery_protocols: to_strings(response.recovery_protocols),
            estimated_recovery_time: response.estimated_recovery_time.to_string(),
            key_indicators: self.key_indicators(analysis),
        }
    }

    /// Score fatigue for one player's session
    ///
    /// `samples` must be sorted ascending by timestamp. An empty sample list
    /// yields the fixed LOW prediction with confidence 0.4.
    pub fn score(
        &self,
        player_id: &str,
        session_id: &str,
        samples: &[Sample],
        metrics: Option<&SessionMetrics>,
    ) -> Result<Prediction> {
        if samples.is_empty() {
            return Ok(Self::default_prediction(player_id));
        }

        let analysis = self.analyze(samples, metrics);
        let assessment = self.assess(&analysis);

        build_prediction(
            PredictionType::FatigueLevel,
            Some(player_id),
            Some(session_id),
            &analysis,
            &assessment,
            self.confidence(&analysis),
        )
    }

    /// Prediction used when the session has no samples
    pub fn default_prediction(player_id: &str) -> Prediction {
        Prediction::new(
            PredictionType::FatigueLevel,
            Some(player_id.to_string()),
            None,
            json!({}),
            json!({
                "fatigueLevel": 0.2,
                "fatigueCategory": FatigueCategory::Low.as_str(),
                "immediateActions": ["Insufficient data for fatigue analysis"],
                "recoveryProtocols": ["Standard recovery protocols"],
            }),
            0.4,
        )
    }
}

impl Default for FatigueScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Distance per unit of cumulative |acceleration| over consecutive pairs
fn movement_efficiency(samples: &[Sample]) -> f64 {
    let mut distance = 0.0;
    let mut acceleration = 0.0;

    for pair in samples.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        distance += haversine_meters(
            previous.position.latitude,
            previous.position.longitude,
            current.position.latitude,
            current.position.longitude,
        );
        acceleration += current.movement.acceleration.abs();
    }

    if acceleration > 0.0 {
        distance / acceleration
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Biometrics, Movement, Position};
    use chrono::{Duration, TimeZone, Utc};

    fn create_sample(seconds: i64, speed: f64, acceleration: f64, heart_rate: Option<u16>) -> Sample {
        Sample {
            player_id: "p7".to_string(),
            session_id: "match-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 10, 5, 15, 0, 0).unwrap()
                + Duration::seconds(seconds),
            position: Position {
                latitude: 51.5560 + seconds as f64 * 0.00005,
                longitude: -0.2795,
                altitude: 30.0,
                accuracy: 1.8,
                satellites: 13,
            },
            movement: Movement {
                speed,
                acceleration,
                direction: 0.0,
                imu: None,
            },
            biometrics: heart_rate.map(|hr| Biometrics {
                heart_rate: hr,
                body_temperature: 37.5,
                stress_level: 5,
            }),
            environmental: None,
        }
    }

    #[test]
    fn test_fatigue_table_is_ordered() {
        assert!(FATIGUE_TABLE.is_well_ordered());
        assert_eq!(FATIGUE_TABLE.lookup(0.81).category, FatigueCategory::Severe);
        assert_eq!(FATIGUE_TABLE.lookup(0.8).category, FatigueCategory::High);
        assert_eq!(FATIGUE_TABLE.lookup(0.45).category, FatigueCategory::Moderate);
        assert_eq!(FATIGUE_TABLE.lookup(0.3).category, FatigueCategory::Low);
        assert_eq!(FATIGUE_TABLE.lookup(0.0).estimated_recovery_time, "2-6 hours");
    }

    #[test]
    fn test_default_prediction_for_empty_session() {
        let prediction = FatigueScorer::new().score("p7", "match-1", &[], None).unwrap();

        assert_eq!(prediction.prediction_type, PredictionType::FatigueLevel);
        assert_eq!(prediction.output_str("fatigueCategory"), Some("LOW"));
        assert_eq!(prediction.output_f64("fatigueLevel"), Some(0.2));
        assert_eq!(prediction.confidence, 0.4);
    }

    #[test]
    fn test_quarter_declines() {
        // 8 samples: quarters of 2, speeds fall from 20 to 10
        let samples: Vec<Sample> = [20.0, 20.0, 18.0, 16.0, 14.0, 12.0, 10.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, speed)| create_sample(i as i64, *speed, 2.0, None))
            .collect();

        let analysis = FatigueScorer::new().analyze(&samples, None);

        assert_eq!(analysis.speed_decline.first_quarter_speed, 20.0);
        assert_eq!(analysis.speed_decline.last_quarter_speed, 10.0);
        assert!((analysis.speed_decline.speed_decline_percentage - 50.0).abs() < 1e-9);
        assert_eq!(analysis.acceleration.acceleration_decline, 0.0);
        assert!(!analysis.heart_rate.available);
    }

    #[test]
    fn test_short_sessions_do_not_divide_by_zero() {
        let samples = vec![
            create_sample(0, 12.0, 0.0, None),
            create_sample(1, 10.0, 0.0, None),
        ];

        let analysis = FatigueScorer::new().analyze(&samples, None);

        assert_eq!(analysis.speed_decline.speed_decline_percentage, 0.0);
        assert_eq!(analysis.acceleration.acceleration_decline, 0.0);
        assert_eq!(analysis.movement_efficiency, 0.0);
    }

    #[test]
    fn test_heart_rate_zone_time() {
        let samples = vec![
            create_sample(0, 10.0, 0.0, Some(150)),
            create_sample(1, 10.0, 0.0, Some(161)),
            create_sample(2, 10.0, 0.0, Some(162)),
            create_sample(3, 10.0, 0.0, Some(180)),
            create_sample(4, 10.0, 0.0, None),
        ];

        let analysis = FatigueScorer::new().analyze(&samples, None);

        assert!(analysis.heart_rate.available);
        assert_eq!(analysis.heart_rate.max_hr, Some(180));
        assert_eq!(analysis.heart_rate.time_in_zone4_plus, Some(50.0));
        assert!((analysis.heart_rate.average_hr.unwrap() - 163.25).abs() < 1e-9);
    }

    #[test]
    fn test_recovery_times_between_efforts() {
        let samples = vec![
            create_sample(0, 25.0, 0.0, None),
            create_sample(10, 8.0, 0.0, None),
            create_sample(100, 6.0, 0.0, None),
            create_sample(160, 10.0, 4.0, None),
            create_sample(170, 5.0, 0.0, None),
            create_sample(200, 5.0, 0.0, None),
        ];

        let analysis = FatigueScorer::new().analyze(&samples, None);

        // Second effort never resumes, so only one gap is recorded
        assert_eq!(analysis.recovery_times, vec![150.0]);
        assert_eq!(analysis.average_recovery(), Some(150.0));
    }

    #[test]
    fn test_fatigue_level_components() {
        let scorer = FatigueScorer::new();
        let mut analysis = FatigueAnalysis {
            speed_decline: SpeedDecline {
                first_quarter_speed: 20.0,
                last_quarter_speed: 16.0,
                speed_decline_percentage: 20.0,
            },
            heart_rate: HeartRateAnalysis {
                available: true,
                average_hr: Some(170.0),
                max_hr: Some(188),
                hr_variability: Some(6.0),
                time_in_zone4_plus: Some(65.0),
            },
            movement_efficiency: 40.0,
            acceleration: AccelerationDecline {
                first_quarter_acceleration: 2.0,
                last_quarter_acceleration: 1.5,
                acceleration_decline: 25.0,
            },
            recovery_times: vec![130.0, 140.0, 150.0, 160.0],
            player_load: None,
            work_rate: None,
        };

        // 0.30 + 0.25 + 0.20 + 0.15 + 0.10
        assert!((scorer.fatigue_level(&analysis) - 1.0).abs() < 1e-9);
        let assessment = scorer.assess(&analysis);
        assert_eq!(assessment.fatigue_category, FatigueCategory::Severe);
        assert_eq!(assessment.immediate_actions[0], "IMMEDIATE SUBSTITUTION RECOMMENDED");
        assert_eq!(assessment.key_indicators.len(), 4);
        assert!((scorer.confidence(&analysis) - 0.95).abs() < 1e-9);

        analysis.speed_decline.speed_decline_percentage = 7.0;
        analysis.heart_rate.time_in_zone4_plus = Some(45.0);
        analysis.movement_efficiency = 80.0;
        analysis.acceleration.acceleration_decline = 12.0;
        analysis.recovery_times = vec![95.0];

        // 0.10 + 0.15 + 0.10 + 0.05
        assert!((scorer.fatigue_level(&analysis) - 0.4).abs() < 1e-9);
        assert_eq!(scorer.assess(&analysis).fatigue_category, FatigueCategory::Moderate);
        assert!((scorer.confidence(&analysis) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_carries_features_and_metrics() {
        let samples: Vec<Sample> = (0..12)
            .map(|i| create_sample(i, 18.0 - i as f64, 1.0, Some(165)))
            .collect();

        let prediction = FatigueScorer::new()
            .score("p7", "match-1", &samples, None)
            .unwrap();

        assert_eq!(prediction.session_id.as_deref(), Some("match-1"));
        assert!(prediction.input.get("speedDecline").is_some());
        assert_eq!(prediction.input["heartRate"]["available"], json!(true));
        assert!(prediction.input.get("playerLoad").is_none());
        assert!(prediction.output_str("fatigueCategory").is_some());
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }
}
