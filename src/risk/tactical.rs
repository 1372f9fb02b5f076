use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use super::{build_prediction, Confidence, Priority};
use crate::config::TacticalConfig;
use crate::error::Result;
use crate::kinematics::mean;
use crate::models::{Prediction, PredictionType, Sample, SessionMetrics};
use crate::tactical::{average_field_position, build_heat_map, FieldProjection};
use crate::zones::FieldGrid;

/// Upper Y bound of the defensive third on the 0-100 field
const DEFENSIVE_THIRD_Y: f64 = 33.0;

/// Lower Y bound of the attacking third on the 0-100 field
const ATTACKING_THIRD_Y: f64 = 67.0;

const ALWAYS_ON_PRESSING_TRIGGERS: [&str; 2] = [
    "Opponent ball possession in middle third",
    "Slow opponent build-up play",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationAnalysis {
    /// "D-M-F" counts per third, or "Unknown" with too few players
    pub detected_formation: String,
    /// Mean formation adherence on a 0-1 scale
    pub formation_stability: f64,
    pub player_positions: BTreeMap<String, [f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressingAnalysis {
    pub average_intensity: f64,
    pub pressing_effectiveness: f64,
    pub pressing_triggers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionAnalysis {
    pub average_transition_speed: f64,
    pub transition_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefensiveAnalysis {
    /// Mean formation adherence in %
    pub organization_level: f64,
    pub pressing_coordination: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackingAnalysis {
    /// Mean sprint distance in km
    pub attacking_intensity: f64,
}

/// Team-wide features for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TacticalAnalysis {
    pub formation: FormationAnalysis,
    pub team_compactness: f64,
    pub pressing: PressingAnalysis,
    pub transitions: TransitionAnalysis,
    pub defense: DefensiveAnalysis,
    pub attack: AttackingAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TacticalPlan {
    pub tactical_advice: Vec<String>,
    pub training_focus: Vec<String>,
    pub priority: Priority,
    pub expected_improvement: String,
}

/// Latest metrics per player, keyed by player id
fn latest_per_player(metrics: &[SessionMetrics]) -> BTreeMap<&str, &SessionMetrics> {
    let mut latest: BTreeMap<&str, &SessionMetrics> = BTreeMap::new();
    for m in metrics {
        latest
            .entry(m.player_id.as_str())
            .and_modify(|current| {
                if m.calculated_at >= current.calculated_at {
                    *current = m;
                }
            })
            .or_insert(m);
    }
    latest
}

/// Group samples by timestamp across all players of a session
pub fn group_by_timestamp(samples: &[Sample]) -> BTreeMap<DateTime<Utc>, Vec<&Sample>> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&Sample>> = BTreeMap::new();
    for sample in samples {
        groups.entry(sample.timestamp).or_default().push(sample);
    }
    groups
}

/// Inverse bounding-box area of one moment's positions, in raw degrees
fn momentary_compactness(group: &[&Sample]) -> f64 {
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);

    for sample in group {
        min_x = min_x.min(sample.position.longitude);
        max_x = max_x.max(sample.position.longitude);
        min_y = min_y.min(sample.position.latitude);
        max_y = max_y.max(sample.position.latitude);
    }

    let area = (max_x - min_x) * (max_y - min_y);
    1.0 / (1.0 + area)
}

/// Session-wide team shape and intensity analysis
pub struct TacticalScorer {
    config: TacticalConfig,
}

impl TacticalScorer {
    pub fn new() -> Self {
        TacticalScorer {
            config: TacticalConfig::default(),
        }
    }

    pub fn with_config(config: TacticalConfig) -> Self {
        TacticalScorer { config }
    }

    /// Mean compactness over moments with enough distinct players, 0 when none qualify
    pub fn team_compactness(&self, samples: &[Sample]) -> f64 {
        let values: Vec<f64> = group_by_timestamp(samples)
            .values()
            .filter(|group| {
                let players: BTreeSet<&str> =
                    group.iter().map(|s| s.player_id.as_str()).collect();
                players.len() >= self.config.min_players
            })
            .map(|group| momentary_compactness(group))
            .collect();

        mean(&values)
    }

    pub fn formation(&self, latest: &BTreeMap<&str, &SessionMetrics>) -> FormationAnalysis {
        let player_positions: BTreeMap<String, [f64; 2]> = latest
            .iter()
            .map(|(player_id, m)| {
                (
                    player_id.to_string(),
                    [m.tactical.average_position_x, m.tactical.average_position_y],
                )
            })
            .collect();

        let detected_formation = if player_positions.len() < self.config.min_players {
            "Unknown".to_string()
        } else {
            let (mut defenders, mut midfielders, mut forwards) = (0, 0, 0);
            for [_, y] in player_positions.values() {
                if *y < DEFENSIVE_THIRD_Y {
                    defenders += 1;
                } else if *y < ATTACKING_THIRD_Y {
                    midfielders += 1;
                } else {
                    forwards += 1;
                }
            }
            format!("{}-{}-{}", defenders, midfielders, forwards)
        };

        let adherence: Vec<f64> = latest
            .values()
            .map(|m| m.tactical.formation_adherence)
            .collect();

        FormationAnalysis {
            detected_formation,
            formation_stability: mean(&adherence) / 100.0,
            player_positions,
        }
    }

    pub fn analyze(&self, metrics: &[SessionMetrics], samples: &[Sample]) -> TacticalAnalysis {
        let latest = latest_per_player(metrics);
        let team: Vec<&SessionMetrics> = latest.values().copied().collect();
        let team_mean = |f: fn(&SessionMetrics) -> f64| -> f64 {
            mean(&team.iter().map(|m| f(m)).collect::<Vec<f64>>())
        };

        let mut pressing_triggers = Vec::new();
        if team_mean(|m| f64::from(m.movement.acceleration_count)) > 20.0 {
            pressing_triggers.push("High ball recovery attempts".to_string());
        }
        pressing_triggers.extend(ALWAYS_ON_PRESSING_TRIGGERS.iter().map(|t| t.to_string()));

        let tracked_speeds: Vec<f64> = samples
            .iter()
            .map(|s| s.movement.speed)
            .filter(|speed| *speed > self.config.transition_tracking_speed_kmh)
            .collect();
        let fast_samples = samples
            .iter()
            .filter(|s| s.movement.speed > self.config.transition_speed_kmh)
            .count();
        let transition_efficiency = if samples.is_empty() {
            0.0
        } else {
            f64::min(1.0, fast_samples as f64 / samples.len() as f64 * 10.0)
        };

        TacticalAnalysis {
            formation: self.formation(&latest),
            team_compactness: self.team_compactness(samples),
            pressing: PressingAnalysis {
                average_intensity: team_mean(|m| m.performance.intensity_score),
                pressing_effectiveness: team_mean(|m| m.performance.work_rate) / 100.0,
                pressing_triggers,
            },
            transitions: TransitionAnalysis {
                average_transition_speed: mean(&tracked_speeds),
                transition_efficiency,
            },
            defense: DefensiveAnalysis {
                organization_level: team_mean(|m| m.tactical.formation_adherence),
                pressing_coordination: team_mean(|m| m.tactical.team_synchronization) / 100.0,
            },
            attack: AttackingAnalysis {
                attacking_intensity: team_mean(|m| m.movement.sprint_distance) / 1000.0,
            },
        }
    }

    pub fn plan(&self, analysis: &TacticalAnalysis) -> TacticalPlan {
        let mut tactical_advice = Vec::new();
        let mut training_focus = Vec::new();

        if analysis.formation.formation_stability < 0.7 {
            tactical_advice.push("Improve formation discipline - players drifting from positions");
            training_focus.push("Positional play drills");
        }
        if analysis.team_compactness < 0.6 {
            tactical_advice.push("Increase team compactness - too much space between lines");
            training_focus.push("Compactness drills");
        }
        if analysis.pressing.pressing_effectiveness < 0.7 {
            tactical_advice.push("Improve pressing coordination and timing");
            training_focus.push("Pressing triggers training");
        }
        if analysis.transitions.transition_efficiency < 0.6 {
            tactical_advice.push("Work on faster transitions between phases");
            training_focus.push("Transition speed drills");
        }

        TacticalPlan {
            tactical_advice: tactical_advice.into_iter().map(String::from).collect(),
            training_focus: training_focus.into_iter().map(String::from).collect(),
            priority: self.priority(analysis),
            expected_improvement: "15-25% within 3-4 training sessions".to_string(),
        }
    }

    pub fn priority(&self, analysis: &TacticalAnalysis) -> Priority {
        let compactness = analysis.team_compactness;
        let stability = analysis.formation.formation_stability;

        if compactness < 0.5 || stability < 0.6 {
            Priority::High
        } else if compactness < 0.7 || stability < 0.8 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn confidence(&self, analysis: &TacticalAnalysis) -> f64 {
        Confidence::base(0.8)
            .boost_if(analysis.team_compactness > 0.7, 0.1)
            .capped(0.95)
    }

    /// Score a session from every player's metrics and samples
    ///
    /// Either input being empty yields the fixed LOW prediction with
    /// confidence 0.3.
    pub fn score(
        &self,
        session_id: &str,
        metrics: &[SessionMetrics],
        samples: &[Sample],
    ) -> Result<Prediction> {
        if metrics.is_empty() || samples.is_empty() {
            return Ok(Self::default_prediction(session_id));
        }

        let analysis = self.analyze(metrics, samples);
        let plan = self.plan(&analysis);

        build_prediction(
            PredictionType::TacticalRecommendation,
            None,
            Some(session_id),
            &analysis,
            &plan,
            self.confidence(&analysis),
        )
    }

    pub fn default_prediction(session_id: &str) -> Prediction {
        Prediction::new(
            PredictionType::TacticalRecommendation,
            None,
            Some(session_id.to_string()),
            json!({}),
            json!({
                "tacticalAdvice": ["Insufficient data for tactical analysis"],
                "trainingFocus": ["Basic positioning", "Team shape"],
                "priority": Priority::Low.as_str(),
            }),
            0.3,
        )
    }
}

impl Default for TacticalScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// One player's positional play in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAnalysis {
    pub heat_map: BTreeMap<String, u32>,
    pub average_position: [f64; 2],
    pub field_coverage: f64,
    /// Root-mean-square distance from the mean position, in field units
    pub movement_variability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPlan {
    pub position_adjustments: Vec<String>,
    pub optimal_zone: String,
    pub movement_pattern: String,
}

fn third_for(y: f64) -> &'static str {
    if y < DEFENSIVE_THIRD_Y {
        "Defensive third"
    } else if y < ATTACKING_THIRD_Y {
        "Middle third"
    } else {
        "Attacking third"
    }
}

/// Recommends where a player should position themselves
pub struct OptimalPositionScorer<'a> {
    projection: &'a dyn FieldProjection,
    grid: FieldGrid,
    config: TacticalConfig,
}

impl<'a> OptimalPositionScorer<'a> {
    pub fn new(projection: &'a dyn FieldProjection, grid: FieldGrid, config: TacticalConfig) -> Self {
        OptimalPositionScorer {
            projection,
            grid,
            config,
        }
    }

    fn movement_variability(&self, samples: &[Sample]) -> f64 {
        let (avg_x, avg_y) = average_field_position(samples, self.projection);
        let squared: Vec<f64> = samples
            .iter()
            .map(|s| {
                let (x, y) = self.projection.project(&s.position);
                (x - avg_x).powi(2) + (y - avg_y).powi(2)
            })
            .collect();
        mean(&squared).sqrt()
    }

    pub fn analyze(&self, samples: &[Sample], metrics: &SessionMetrics) -> PositionAnalysis {
        PositionAnalysis {
            heat_map: build_heat_map(samples, self.projection, &self.grid),
            average_position: [
                metrics.tactical.average_position_x,
                metrics.tactical.average_position_y,
            ],
            field_coverage: metrics.tactical.field_coverage,
            movement_variability: self.movement_variability(samples),
        }
    }

    pub fn plan(&self, analysis: &PositionAnalysis) -> PositionPlan {
        let mut position_adjustments = Vec::new();
        let y = analysis.average_position[1];

        if analysis.field_coverage < 60.0 {
            position_adjustments.push("Increase field coverage - move more dynamically".to_string());
        }
        if y < self.config.defensive_line_y {
            position_adjustments.push("Push higher up the field when team has possession".to_string());
        } else if y > self.config.attacking_line_y {
            position_adjustments.push("Drop deeper to help with build-up play".to_string());
        }

        PositionPlan {
            position_adjustments,
            optimal_zone: third_for(y).to_string(),
            movement_pattern: "Dynamic with structured positioning".to_string(),
        }
    }

    pub fn confidence(&self, analysis: &PositionAnalysis) -> f64 {
        let mobile = analysis.field_coverage > 70.0
            && analysis.movement_variability > self.config.mobile_variability;
        Confidence::base(0.75).boost_if(mobile, 0.15).capped(0.9)
    }

    /// Score one player's positioning in a session
    ///
    /// Needs both the player's samples and their stored session metrics;
    /// otherwise the fixed "maintain position" prediction is returned.
    pub fn score(
        &self,
        player_id: &str,
        session_id: &str,
        samples: &[Sample],
        metrics: Option<&SessionMetrics>,
    ) -> Result<Prediction> {
        let Some(metrics) = metrics.filter(|_| !samples.is_empty()) else {
            return Ok(Self::default_prediction(player_id));
        };

        let analysis = self.analyze(samples, metrics);
        let plan = self.plan(&analysis);

        build_prediction(
            PredictionType::OptimalPosition,
            Some(player_id),
            Some(session_id),
            &analysis,
            &plan,
            self.confidence(&analysis),
        )
    }

    pub fn default_prediction(player_id: &str) -> Prediction {
        Prediction::new(
            PredictionType::OptimalPosition,
            Some(player_id.to_string()),
            None,
            json!({}),
            json!({
                "positionAdjustments": ["Maintain current position", "Focus on consistency"],
                "optimalZone": "Current zone",
            }),
            0.4,
        )
    }
}
