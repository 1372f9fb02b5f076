use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use super::{build_prediction, to_strings, Confidence, Priority};
use crate::error::Result;
use crate::kinematics::{coefficient_of_variation, linear_trend_slope, mean};
use crate::models::{Player, Prediction, PredictionType, SessionMetrics};

/// Average max speed below which a player without a profile should sprint more
const DEFAULT_SPEED_POTENTIAL_KMH: f64 = 25.0;

/// Playing role used to pick role-specific recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerRole {
    Forward,
    Midfielder,
    Defender,
    Goalkeeper,
}

impl PlayerRole {
    /// Parse a role string, case-insensitive. "Striker" counts as a forward.
    pub fn parse(role: &str) -> Option<Self> {
        match role.trim().to_uppercase().as_str() {
            "FORWARD" | "STRIKER" => Some(PlayerRole::Forward),
            "MIDFIELDER" => Some(PlayerRole::Midfielder),
            "DEFENDER" => Some(PlayerRole::Defender),
            "GOALKEEPER" => Some(PlayerRole::Goalkeeper),
            _ => None,
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            PlayerRole::Forward => &[
                "Focus on explosive sprint training for breakaways",
                "Improve finishing under fatigue conditions",
            ],
            PlayerRole::Midfielder => &[
                "Enhance aerobic capacity for box-to-box play",
                "Work on acceleration for quick direction changes",
            ],
            PlayerRole::Defender => &[
                "Improve reactive speed for defensive actions",
                "Focus on sustained running for defensive coverage",
            ],
            PlayerRole::Goalkeeper => &[
                "Enhance explosive power for diving and jumping",
                "Improve agility and reaction time",
            ],
        }
    }

    pub fn training(&self) -> &'static [&'static str] {
        match self {
            PlayerRole::Forward => &[
                "Sprint starts from various positions",
                "Finishing drills with fatigue",
            ],
            PlayerRole::Midfielder => &["Interval running", "Change of direction drills"],
            PlayerRole::Defender => &["Defensive positioning drills", "1v1 defensive scenarios"],
            PlayerRole::Goalkeeper => &["Plyometric exercises", "Reaction time drills"],
        }
    }
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerRole::Forward => "Forward",
            PlayerRole::Midfielder => "Midfielder",
            PlayerRole::Defender => "Defender",
            PlayerRole::Goalkeeper => "Goalkeeper",
        };
        write!(f, "{}", name)
    }
}

/// A session well above the player's average intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformancePeak {
    pub date: DateTime<Utc>,
    pub intensity: f64,
    pub max_speed: f64,
    pub work_rate: f64,
}

/// A session well below the player's average intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceValley {
    pub date: DateTime<Utc>,
    pub intensity: f64,
    pub possible_causes: Vec<String>,
}

/// Trends and consistency of a player's recent sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalysis {
    pub avg_max_speed: f64,
    pub max_speed_trend: f64,
    pub speed_consistency: f64,
    pub avg_total_distance: f64,
    pub distance_trend: f64,
    pub endurance_consistency: f64,
    pub avg_intensity: f64,
    pub intensity_trend: f64,
    pub avg_work_rate: f64,
    pub work_rate_trend: f64,
    /// Average max speed relative to the profile's best speed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness_level: Option<f64>,
    pub performance_peaks: Vec<PerformancePeak>,
    pub performance_valleys: Vec<PerformanceValley>,
    /// Mean readiness on a 0-1 scale
    pub recovery_efficiency: f64,
}

impl PerformanceAnalysis {
    /// Analyze history sorted ascending by `calculated_at`; `None` when empty
    pub fn from_history(history: &[SessionMetrics], player: &Player) -> Option<Self> {
        if history.is_empty() {
            return None;
        }

        let max_speeds: Vec<f64> = history.iter().map(|m| m.movement.max_speed).collect();
        let distances: Vec<f64> = history.iter().map(|m| m.movement.total_distance).collect();
        let intensities: Vec<f64> = history
            .iter()
            .map(|m| m.performance.intensity_score)
            .collect();
        let work_rates: Vec<f64> = history.iter().map(|m| m.performance.work_rate).collect();

        let avg_max_speed = mean(&max_speeds);
        let avg_intensity = mean(&intensities);

        let speed_utilization = player.profile.as_ref().map(|profile| {
            if profile.max_speed > 0.0 {
                avg_max_speed / profile.max_speed
            } else {
                0.0
            }
        });

        let readiness: f64 = history.iter().map(|m| m.load.readiness_score).sum();

        Some(PerformanceAnalysis {
            avg_max_speed,
            max_speed_trend: linear_trend_slope(&max_speeds),
            speed_consistency: 1.0 - coefficient_of_variation(&max_speeds),
            avg_total_distance: mean(&distances),
            distance_trend: linear_trend_slope(&distances),
            endurance_consistency: 1.0 - coefficient_of_variation(&distances),
            avg_intensity,
            intensity_trend: linear_trend_slope(&intensities),
            avg_work_rate: mean(&work_rates),
            work_rate_trend: linear_trend_slope(&work_rates),
            speed_utilization,
            fitness_level: player.profile.as_ref().map(|p| p.fitness_level),
            performance_peaks: peaks(history, avg_intensity),
            performance_valleys: valleys(history, avg_intensity),
            recovery_efficiency: readiness / (history.len() as f64 * 10.0),
        })
    }
}

fn peaks(history: &[SessionMetrics], avg_intensity: f64) -> Vec<PerformancePeak> {
    let threshold = avg_intensity * 1.2;
    history
        .iter()
        .filter(|m| m.performance.intensity_score > threshold)
        .map(|m| PerformancePeak {
            date: m.calculated_at,
            intensity: m.performance.intensity_score,
            max_speed: m.movement.max_speed,
            work_rate: m.performance.work_rate,
        })
        .collect()
}

fn valleys(history: &[SessionMetrics], avg_intensity: f64) -> Vec<PerformanceValley> {
    let threshold = avg_intensity * 0.8;
    history
        .iter()
        .filter(|m| m.performance.intensity_score < threshold)
        .map(|m| PerformanceValley {
            date: m.calculated_at,
            intensity: m.performance.intensity_score,
            possible_causes: possible_causes(m),
        })
        .collect()
}

fn possible_causes(metrics: &SessionMetrics) -> Vec<String> {
    let mut causes = Vec::new();
    if metrics.load.acute_chronic_ratio > 1.3 {
        causes.push("High training load".to_string());
    }
    if metrics.load.readiness_score < 6.0 {
        causes.push("Poor readiness/recovery".to_string());
    }
    if metrics.performance.max_heart_rate < 160 {
        causes.push("Low cardiovascular engagement".to_string());
    }
    causes
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMetrics {
    pub target_max_speed: f64,
    pub target_work_rate: f64,
    pub target_intensity: f64,
}

/// Training recommendations for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformancePlan {
    pub recommendations: Vec<String>,
    pub training_focus: Vec<String>,
    pub target_metrics: TargetMetrics,
    pub timeframe: String,
    pub priority: Priority,
}

/// Turns recent performance trends into training recommendations
#[derive(Debug, Clone, Default)]
pub struct PerformanceScorer;

impl PerformanceScorer {
    pub fn new() -> Self {
        PerformanceScorer
    }

    pub fn plan(&self, analysis: &PerformanceAnalysis, player: &Player) -> PerformancePlan {
        let mut recommendations = Vec::new();
        let mut training_focus = Vec::new();

        let speed_potential = player
            .profile
            .as_ref()
            .map(|p| p.max_speed * 0.85)
            .unwrap_or(DEFAULT_SPEED_POTENTIAL_KMH);

        if analysis.max_speed_trend < -0.1 {
            recommendations.push("Focus on speed development - declining trend detected");
            training_focus.extend(["Sprint intervals", "Plyometric exercises"]);
        } else if analysis.avg_max_speed < speed_potential {
            recommendations.push("Increase sprint training to reach speed potential");
            training_focus.push("Acceleration drills");
        }

        if analysis.distance_trend < -0.05 {
            recommendations.push("Improve aerobic capacity - endurance declining");
            training_focus.extend(["Aerobic base training", "Tempo runs"]);
        }
        if analysis.endurance_consistency < 0.8 {
            recommendations.push("Work on consistency in endurance performance");
            training_focus.push("Steady-state cardio");
        }

        if analysis.avg_intensity < 6.0 {
            recommendations.push("Increase training intensity for better match preparation");
            training_focus.push("High-intensity intervals");
        }

        if analysis.avg_work_rate < 80.0 {
            recommendations.push("Improve work rate through tactical training");
            training_focus.extend(["Small-sided games", "Position-specific drills"]);
        }

        if analysis.recovery_efficiency < 0.7 {
            recommendations.push("Optimize recovery protocols");
            training_focus.extend(["Active recovery sessions", "Sleep hygiene improvement"]);
        }

        if let Some(role) = player.position.as_deref().and_then(PlayerRole::parse) {
            recommendations.extend(role.recommendations());
            training_focus.extend(role.training());
        }

        PerformancePlan {
            recommendations: to_strings(&recommendations),
            training_focus: to_strings(&training_focus),
            target_metrics: TargetMetrics {
                target_max_speed: analysis.avg_max_speed * 1.05,
                target_work_rate: f64::min(analysis.avg_work_rate * 1.1, 95.0),
                target_intensity: f64::min(analysis.avg_intensity * 1.15, 10.0),
            },
            timeframe: "4-6 weeks".to_string(),
            priority: self.priority(analysis),
        }
    }

    pub fn priority(&self, analysis: &PerformanceAnalysis) -> Priority {
        let speed = analysis.max_speed_trend;
        let distance = analysis.distance_trend;
        let intensity = analysis.intensity_trend;

        if speed < -0.15 || distance < -0.1 || intensity < -0.2 {
            Priority::High
        } else if speed < -0.05 || distance < -0.05 || intensity < -0.1 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn confidence(&self, analysis: &PerformanceAnalysis) -> f64 {
        let clear_trend =
            analysis.max_speed_trend.abs() > 0.1 || analysis.distance_trend.abs() > 0.05;
        Confidence::base(0.75).boost_if(clear_trend, 0.15).capped(0.95)
    }

    /// Score a known player's recent sessions
    ///
    /// History is sorted by `calculated_at` first. An empty history yields the
    /// baseline-building prediction with confidence 0.5.
    pub fn score(&self, player: &Player, history: &[SessionMetrics]) -> Result<Prediction> {
        let mut ordered = history.to_vec();
        ordered.sort_by(|a, b| a.calculated_at.cmp(&b.calculated_at));

        let Some(analysis) = PerformanceAnalysis::from_history(&ordered, player) else {
            return Ok(Self::default_prediction(&player.id));
        };
        let plan = self.plan(&analysis, player);

        build_prediction(
            PredictionType::PerformanceDecline,
            Some(&player.id),
            None,
            &analysis,
            &plan,
            self.confidence(&analysis),
        )
    }

    /// Prediction used when the player has no recent sessions
    pub fn default_prediction(player_id: &str) -> Prediction {
        Prediction::new(
            PredictionType::PerformanceDecline,
            Some(player_id.to_string()),
            None,
            json!({}),
            json!({
                "recommendations": [
                    "Establish baseline performance data",
                    "Focus on consistent training attendance",
                    "Monitor basic fitness metrics",
                ],
                "trainingFocus": ["General fitness", "Basic skills"],
                "priority": Priority::Low.as_str(),
            }),
            0.5,
        )
    }
}
