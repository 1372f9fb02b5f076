use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use super::{build_prediction, to_strings, Confidence, ScoreBand, ScoreTable};
use crate::error::Result;
use crate::kinematics::{coefficient_of_variation, has_spike, linear_trend_slope, mean};
use crate::models::{Prediction, PredictionType, SessionMetrics};

/// Acute:chronic ratio above which a day counts as high load
const HIGH_LOAD_RATIO: f64 = 1.3;

/// Acute:chronic ratio below which a day counts as recovery
const RECOVERY_RATIO: f64 = 0.8;

/// Stand-ins for left/right movement asymmetry analysis
///
/// Real implementations need per-limb IMU data. The signals are read once
/// per scoring run.
pub trait AsymmetrySignals: Send + Sync {
    /// Asymmetry index, 0 for perfectly symmetric movement
    fn movement_asymmetry(&self, history: &[SessionMetrics]) -> f64;

    /// Whether the acceleration pattern changed noticeably over the history
    fn acceleration_pattern_change(&self, history: &[SessionMetrics]) -> bool;
}

/// Random placeholder signals
///
/// Asymmetry is uniform in [0.05, 0.15) and a pattern change is reported with
/// probability 0.2. Injury scores are not reproducible while this is in use.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomizedAsymmetrySignals;

impl AsymmetrySignals for RandomizedAsymmetrySignals {
    fn movement_asymmetry(&self, _history: &[SessionMetrics]) -> f64 {
        0.05 + rand::thread_rng().gen::<f64>() * 0.1
    }

    fn acceleration_pattern_change(&self, _history: &[SessionMetrics]) -> bool {
        rand::thread_rng().gen::<f64>() > 0.8
    }
}

/// Constant signals for reproducible scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAsymmetrySignals {
    pub asymmetry: f64,
    pub pattern_change: bool,
}

impl FixedAsymmetrySignals {
    pub fn new(asymmetry: f64, pattern_change: bool) -> Self {
        FixedAsymmetrySignals {
            asymmetry,
            pattern_change,
        }
    }
}

impl Default for FixedAsymmetrySignals {
    fn default() -> Self {
        FixedAsymmetrySignals::new(0.1, false)
    }
}

impl AsymmetrySignals for FixedAsymmetrySignals {
    fn movement_asymmetry(&self, _history: &[SessionMetrics]) -> f64 {
        self.asymmetry
    }

    fn acceleration_pattern_change(&self, _history: &[SessionMetrics]) -> bool {
        self.pattern_change
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InjuryRiskLevel {
    Minimal,
    Low,
    Moderate,
    High,
}

impl InjuryRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryRiskLevel::Minimal => "MINIMAL",
            InjuryRiskLevel::Low => "LOW",
            InjuryRiskLevel::Moderate => "MODERATE",
            InjuryRiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for InjuryRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk level with its baseline recommendations
#[derive(Debug)]
pub struct InjuryResponse {
    pub level: InjuryRiskLevel,
    pub recommendations: &'static [&'static str],
}

static INJURY_BANDS: [ScoreBand<InjuryResponse>; 3] = [
    ScoreBand {
        above: 0.7,
        outcome: InjuryResponse {
            level: InjuryRiskLevel::High,
            recommendations: &[
                "URGENT: Reduce training load by 30-40% for next 7 days",
                "Schedule immediate medical assessment",
                "Focus on recovery and regeneration protocols",
            ],
        },
    },
    ScoreBand {
        above: 0.4,
        outcome: InjuryResponse {
            level: InjuryRiskLevel::Moderate,
            recommendations: &[
                "Reduce training intensity by 20% for next 3-5 days",
                "Increase recovery time between sessions",
                "Monitor movement patterns closely",
            ],
        },
    },
    ScoreBand {
        above: 0.2,
        outcome: InjuryResponse {
            level: InjuryRiskLevel::Low,
            recommendations: &[
                "Maintain current load but monitor closely",
                "Ensure adequate sleep and nutrition",
                "Include preventive exercises in warm-up",
            ],
        },
    },
];

pub static INJURY_TABLE: ScoreTable<InjuryResponse> = ScoreTable::new(
    &INJURY_BANDS,
    InjuryResponse {
        level: InjuryRiskLevel::Minimal,
        recommendations: &[],
    },
);

/// Workload features over a player's recent history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjuryFeatures {
    pub avg_acute_chronic_ratio: f64,
    pub max_acute_chronic_ratio: f64,
    /// Coefficient of variation of the ratio
    pub acute_chronic_variability: f64,
    pub avg_player_load: f64,
    pub player_load_trend: f64,
    pub player_load_spike: bool,
    pub avg_sprint_count: f64,
    pub sprint_count_trend: f64,
    /// Fractional drop from the first to the last max speed
    pub max_speed_decline: f64,
    pub speed_variability: f64,
    /// Longest run of sessions with ratio above 1.3
    pub consecutive_high_load_days: u32,
    /// Sessions with ratio below 0.8
    pub recovery_days: u32,
    pub workload_imbalance: f64,
    pub movement_asymmetry: f64,
    pub acceleration_pattern_change: bool,
}

impl InjuryFeatures {
    /// Extract features from history sorted ascending by `calculated_at`
    ///
    /// Returns `None` for an empty history.
    pub fn extract(history: &[SessionMetrics], signals: &dyn AsymmetrySignals) -> Option<Self> {
        if history.is_empty() {
            return None;
        }

        let ratios: Vec<f64> = history.iter().map(|m| m.load.acute_chronic_ratio).collect();
        let player_loads: Vec<f64> = history.iter().map(|m| m.movement.player_load).collect();
        let sprint_counts: Vec<f64> = history
            .iter()
            .map(|m| f64::from(m.movement.sprint_count))
            .collect();
        let max_speeds: Vec<f64> = history.iter().map(|m| m.movement.max_speed).collect();

        Some(InjuryFeatures {
            avg_acute_chronic_ratio: mean(&ratios),
            max_acute_chronic_ratio: ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            acute_chronic_variability: coefficient_of_variation(&ratios),
            avg_player_load: mean(&player_loads),
            player_load_trend: linear_trend_slope(&player_loads),
            player_load_spike: has_spike(&player_loads),
            avg_sprint_count: mean(&sprint_counts),
            sprint_count_trend: linear_trend_slope(&sprint_counts),
            max_speed_decline: first_to_last_decline(&max_speeds),
            speed_variability: coefficient_of_variation(&max_speeds),
            consecutive_high_load_days: longest_run(&ratios, |r| r > HIGH_LOAD_RATIO),
            recovery_days: ratios.iter().filter(|r| **r < RECOVERY_RATIO).count() as u32,
            workload_imbalance: coefficient_of_variation(&player_loads),
            movement_asymmetry: signals.movement_asymmetry(history),
            acceleration_pattern_change: signals.acceleration_pattern_change(history),
        })
    }
}

/// `(first - last) / first`, 0 for fewer than two values or a zero first value
fn first_to_last_decline(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 && *first != 0.0 => (first - last) / first,
        _ => 0.0,
    }
}

fn longest_run(values: &[f64], predicate: impl Fn(f64) -> bool) -> u32 {
    let mut longest = 0;
    let mut current = 0;

    for value in values {
        if predicate(*value) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    longest
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjuryAssessment {
    pub injury_risk: f64,
    pub risk_level: InjuryRiskLevel,
    pub recommendations: Vec<String>,
    pub key_factors: Vec<String>,
}

/// Scores overuse injury risk from workload history
pub struct InjuryRiskScorer<'a> {
    signals: &'a dyn AsymmetrySignals,
}

impl<'a> InjuryRiskScorer<'a> {
    pub fn new(signals: &'a dyn AsymmetrySignals) -> Self {
        InjuryRiskScorer { signals }
    }

    /// Weighted risk in [0, 1]
    pub fn injury_risk(&self, features: &InjuryFeatures) -> f64 {
        let mut risk = 0.0;

        if features.max_acute_chronic_ratio > 1.5 {
            risk += 0.4;
        } else if features.max_acute_chronic_ratio > 1.3 {
            risk += 0.25;
        } else if features.avg_acute_chronic_ratio > 1.2 {
            risk += 0.1;
        }

        if features.player_load_spike {
            risk += 0.2;
        }

        if features.consecutive_high_load_days > 5 {
            risk += 0.15;
        } else if features.consecutive_high_load_days > 3 {
            risk += 0.1;
        }

        if features.max_speed_decline > 0.1 {
            risk += 0.15;
        }

        if features.movement_asymmetry > 0.15 {
            risk += 0.1;
        }

        f64::min(risk, 1.0)
    }

    pub fn key_factors(&self, features: &InjuryFeatures) -> Vec<String> {
        let mut factors = Vec::new();

        if features.max_acute_chronic_ratio > 1.3 {
            factors.push("Elevated acute:chronic workload ratio".to_string());
        }
        if features.player_load_spike {
            factors.push("Recent spike in player load".to_string());
        }
        if features.consecutive_high_load_days > 3 {
            factors.push("Consecutive high-load training days".to_string());
        }
        if features.max_speed_decline > 0.05 {
            factors.push("Decline in maximum speed performance".to_string());
        }

        factors
    }

    pub fn assess(&self, features: &InjuryFeatures) -> InjuryAssessment {
        let injury_risk = self.injury_risk(features);
        let response = INJURY_TABLE.lookup(injury_risk);

        let mut recommendations = to_strings(response.recommendations);
        if features.avg_acute_chronic_ratio > 1.3 {
            recommendations.push("Focus on gradual load progression".to_string());
        }
        if features.movement_asymmetry > 0.1 {
            recommendations.push("Address movement asymmetries with corrective exercises".to_string());
        }

        InjuryAssessment {
            injury_risk,
            risk_level: response.level,
            recommendations,
            key_factors: self.key_factors(features),
        }
    }

    pub fn confidence(&self, history_len: usize) -> f64 {
        Confidence::base(0.7)
            .boost_if(history_len > 3, 0.2)
            .bounded(0.5, 0.95)
    }

    /// Score injury risk from a player's recent session metrics
    ///
    /// History is sorted by `calculated_at` before features are extracted.
    /// An empty history yields the fixed MINIMAL prediction.
    pub fn score(&self, player_id: &str, history: &[SessionMetrics]) -> Result<Prediction> {
        let mut ordered = history.to_vec();
        ordered.sort_by(|a, b| a.calculated_at.cmp(&b.calculated_at));

        let Some(features) = InjuryFeatures::extract(&ordered, self.signals) else {
            return Ok(Self::default_prediction(player_id));
        };
        let assessment = self.assess(&features);

        build_prediction(
            PredictionType::InjuryRisk,
            Some(player_id),
            None,
            &features,
            &assessment,
            self.confidence(ordered.len()),
        )
    }

    /// Prediction used when there is no history
    pub fn default_prediction(player_id: &str) -> Prediction {
        Prediction::new(
            PredictionType::InjuryRisk,
            Some(player_id.to_string()),
            None,
            json!({}),
            json!({
                "injuryRisk": 0.1,
                "riskLevel": InjuryRiskLevel::Minimal.as_str(),
                "recommendations": [
                    "Continue current training regimen",
                    "Monitor for data availability",
                ],
                "keyFactors": ["Insufficient historical data"],
            }),
            0.5,
        )
    }
}
