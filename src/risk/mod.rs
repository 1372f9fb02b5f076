//! Heuristic risk and recommendation scorers
//!
//! Every scorer follows the same steps: extract features, add weighted
//! threshold contributions, look the score up in an ordered band table,
//! fill recommendation templates and attach a confidence value. Scorers
//! fall back to fixed low-confidence predictions when input is missing.

pub mod fatigue;
pub mod injury;
pub mod performance;
pub mod tactical;

pub use fatigue::{FatigueAnalysis, FatigueAssessment, FatigueCategory, FatigueScorer};
pub use injury::{
    AsymmetrySignals, FixedAsymmetrySignals, InjuryAssessment, InjuryFeatures, InjuryRiskLevel,
    InjuryRiskScorer, RandomizedAsymmetrySignals,
};
pub use performance::{PerformanceAnalysis, PerformancePlan, PerformanceScorer, PlayerRole};
pub use tactical::{
    OptimalPositionScorer, PositionAnalysis, PositionPlan, TacticalAnalysis, TacticalPlan,
    TacticalScorer,
};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::models::{Prediction, PredictionType};

/// One row of a score table: scores strictly above `above` map to `outcome`
#[derive(Debug)]
pub struct ScoreBand<T: 'static> {
    pub above: f64,
    pub outcome: T,
}

/// Ordered score-to-outcome lookup
///
/// Bands are checked from the highest threshold down; a score that clears
/// none of them falls through to `otherwise`. Every finite score maps to
/// exactly one outcome.
#[derive(Debug)]
pub struct ScoreTable<T: 'static> {
    bands: &'static [ScoreBand<T>],
    otherwise: T,
}

impl<T: 'static> ScoreTable<T> {
    pub const fn new(bands: &'static [ScoreBand<T>], otherwise: T) -> Self {
        ScoreTable { bands, otherwise }
    }

    /// Outcome for a score
    pub fn lookup(&self, score: f64) -> &T {
        self.bands
            .iter()
            .find(|band| score > band.above)
            .map(|band| &band.outcome)
            .unwrap_or(&self.otherwise)
    }

    /// True when thresholds are strictly decreasing, so no band shadows another
    pub fn is_well_ordered(&self) -> bool {
        self.bands.windows(2).all(|pair| pair[0].above > pair[1].above)
    }
}

/// Confidence accumulator: a base value raised by corroborating signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidence(f64);

impl Confidence {
    pub fn base(value: f64) -> Self {
        Confidence(value)
    }

    /// Add `amount` when `signal` holds
    pub fn boost_if(self, signal: bool, amount: f64) -> Self {
        if signal {
            Confidence(self.0 + amount)
        } else {
            self
        }
    }

    /// Clamp into `[floor, ceiling]`, itself inside `[0, 1]`
    pub fn bounded(self, floor: f64, ceiling: f64) -> f64 {
        self.0.max(floor).min(ceiling).clamp(0.0, 1.0)
    }

    /// Clamp into `[0, ceiling]`
    pub fn capped(self, ceiling: f64) -> f64 {
        self.bounded(0.0, ceiling)
    }
}

/// Urgency of a recommendation plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialize typed features and outcome into a prediction
pub(crate) fn build_prediction<I: Serialize, O: Serialize>(
    prediction_type: PredictionType,
    player_id: Option<&str>,
    session_id: Option<&str>,
    input: &I,
    output: &O,
    confidence: f64,
) -> Result<Prediction> {
    Ok(Prediction::new(
        prediction_type,
        player_id.map(str::to_string),
        session_id.map(str::to_string),
        serde_json::to_value(input)?,
        serde_json::to_value(output)?,
        confidence,
    ))
}

pub(crate) fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    static BANDS: [ScoreBand<&str>; 2] = [
        ScoreBand { above: 0.7, outcome: "HIGH" },
        ScoreBand { above: 0.3, outcome: "MEDIUM" },
    ];
    static TABLE: ScoreTable<&str> = ScoreTable::new(&BANDS, "LOW");

    #[test]
    fn test_score_table_lookup() {
        assert_eq!(*TABLE.lookup(0.9), "HIGH");
        assert_eq!(*TABLE.lookup(0.7), "MEDIUM");
        assert_eq!(*TABLE.lookup(0.31), "MEDIUM");
        assert_eq!(*TABLE.lookup(0.3), "LOW");
        assert_eq!(*TABLE.lookup(-1.0), "LOW");
        assert_eq!(*TABLE.lookup(f64::NAN), "LOW");
        assert!(TABLE.is_well_ordered());
    }

    #[test]
    fn test_confidence_accumulation() {
        let c = Confidence::base(0.7).boost_if(true, 0.15).boost_if(true, 0.1);
        assert!((c.capped(0.95) - 0.95).abs() < 1e-12);

        let c = Confidence::base(0.7).boost_if(false, 0.15);
        assert!((c.capped(0.95) - 0.7).abs() < 1e-12);

        assert_eq!(Confidence::base(0.2).bounded(0.5, 0.95), 0.5);
        assert_eq!(Confidence::base(1.4).capped(1.5), 1.0);
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"MEDIUM\"");
        assert!(Priority::High > Priority::Low);
    }
}
