//! Persistence seams consumed by the analytics engine
//!
//! The engine only talks to these traits. `InMemoryStore` backs tests and the
//! CLI; `SqliteStore` in [`crate::database`] persists to disk.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, StoreError};
use crate::models::{sort_samples, Player, Prediction, PredictionType, Sample, SessionMetrics};

/// Raw telemetry samples
pub trait SampleStore: Send + Sync {
    fn append(&self, sample: Sample) -> Result<()>;

    /// All samples of a player in a session, ordered by timestamp
    fn samples_for(&self, player_id: &str, session_id: &str) -> Result<Vec<Sample>>;

    /// Samples at or after `since`, ordered by timestamp
    fn samples_since(
        &self,
        player_id: &str,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Sample>>;

    /// Every player's samples in a session, ordered by timestamp, then
    /// player id, then arrival
    fn samples_for_session(&self, session_id: &str) -> Result<Vec<Sample>>;
}

/// Derived session metrics, one record per (player, session)
pub trait MetricsStore: Send + Sync {
    /// Insert or replace the record for the metrics' player and session
    fn save_metrics(&self, metrics: &SessionMetrics) -> Result<()>;

    fn metrics_for(&self, player_id: &str, session_id: &str) -> Result<Option<SessionMetrics>>;

    /// Records with `from <= calculated_at <= to`, oldest first
    fn metrics_in_range(
        &self,
        player_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionMetrics>>;

    fn metrics_for_session(&self, session_id: &str) -> Result<Vec<SessionMetrics>>;
}

pub trait PlayerRegistry: Send + Sync {
    fn player(&self, player_id: &str) -> Result<Option<Player>>;

    fn register_player(&self, player: Player) -> Result<()>;
}

/// Append-only prediction log
pub trait PredictionStore: Send + Sync {
    fn append_prediction(&self, prediction: &Prediction) -> Result<()>;

    fn predictions_for_player(&self, player_id: &str) -> Result<Vec<Prediction>>;

    fn predictions_for_session(&self, session_id: &str) -> Result<Vec<Prediction>>;

    fn predictions_by_type(&self, prediction_type: PredictionType) -> Result<Vec<Prediction>>;

    /// Most recent prediction of a type for a player
    fn latest_prediction(
        &self,
        player_id: &str,
        prediction_type: PredictionType,
    ) -> Result<Option<Prediction>>;

    /// Predictions made at or after `since`, newest first
    fn recent_predictions(&self, since: DateTime<Utc>) -> Result<Vec<Prediction>>;
}

type SessionKey = (String, String);

fn key(player_id: &str, session_id: &str) -> SessionKey {
    (player_id.to_string(), session_id.to_string())
}

/// Lock-guarded in-process store implementing every store trait
#[derive(Debug, Default)]
pub struct InMemoryStore {
    samples: RwLock<BTreeMap<SessionKey, Vec<Sample>>>,
    metrics: RwLock<BTreeMap<SessionKey, SessionMetrics>>,
    players: RwLock<BTreeMap<String, Player>>,
    predictions: RwLock<Vec<Prediction>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<'a, T>(lock: &'a RwLock<T>, name: &str) -> Result<RwLockReadGuard<'a, T>> {
        lock.read()
            .map_err(|_| StoreError::LockPoisoned(name.to_string()).into())
    }

    fn write<'a, T>(lock: &'a RwLock<T>, name: &str) -> Result<RwLockWriteGuard<'a, T>> {
        lock.write()
            .map_err(|_| StoreError::LockPoisoned(name.to_string()).into())
    }

    fn filter_predictions(&self, keep: impl Fn(&Prediction) -> bool) -> Result<Vec<Prediction>> {
        let predictions = Self::read(&self.predictions, "predictions")?;
        Ok(predictions.iter().filter(|p| keep(p)).cloned().collect())
    }
}

impl SampleStore for InMemoryStore {
    fn append(&self, sample: Sample) -> Result<()> {
        let mut samples = Self::write(&self.samples, "samples")?;
        samples
            .entry(key(&sample.player_id, &sample.session_id))
            .or_default()
            .push(sample);
        Ok(())
    }

    fn samples_for(&self, player_id: &str, session_id: &str) -> Result<Vec<Sample>> {
        let samples = Self::read(&self.samples, "samples")?;
        let mut found = samples
            .get(&key(player_id, session_id))
            .cloned()
            .unwrap_or_default();
        sort_samples(&mut found);
        Ok(found)
    }

    fn samples_since(
        &self,
        player_id: &str,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let mut found = self.samples_for(player_id, session_id)?;
        found.retain(|s| s.timestamp >= since);
        Ok(found)
    }

    fn samples_for_session(&self, session_id: &str) -> Result<Vec<Sample>> {
        let samples = Self::read(&self.samples, "samples")?;
        // Keys iterate by player id, so the stable sort keeps that order on ties
        let mut found: Vec<Sample> = samples
            .iter()
            .filter(|((_, session), _)| session == session_id)
            .flat_map(|(_, list)| list.iter().cloned())
            .collect();
        sort_samples(&mut found);
        Ok(found)
    }
}

impl MetricsStore for InMemoryStore {
    fn save_metrics(&self, metrics: &SessionMetrics) -> Result<()> {
        let mut stored = Self::write(&self.metrics, "metrics")?;
        stored.insert(key(&metrics.player_id, &metrics.session_id), metrics.clone());
        Ok(())
    }

    fn metrics_for(&self, player_id: &str, session_id: &str) -> Result<Option<SessionMetrics>> {
        let stored = Self::read(&self.metrics, "metrics")?;
        Ok(stored.get(&key(player_id, session_id)).cloned())
    }

    fn metrics_in_range(
        &self,
        player_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionMetrics>> {
        let stored = Self::read(&self.metrics, "metrics")?;
        let mut found: Vec<SessionMetrics> = stored
            .values()
            .filter(|m| m.player_id == player_id)
            .filter(|m| m.calculated_at >= from && m.calculated_at <= to)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.calculated_at.cmp(&b.calculated_at));
        Ok(found)
    }

    fn metrics_for_session(&self, session_id: &str) -> Result<Vec<SessionMetrics>> {
        let stored = Self::read(&self.metrics, "metrics")?;
        let mut found: Vec<SessionMetrics> = stored
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        Ok(found)
    }
}

impl PlayerRegistry for InMemoryStore {
    fn player(&self, player_id: &str) -> Result<Option<Player>> {
        let players = Self::read(&self.players, "players")?;
        Ok(players.get(player_id).cloned())
    }

    fn register_player(&self, player: Player) -> Result<()> {
        let mut players = Self::write(&self.players, "players")?;
        players.insert(player.id.clone(), player);
        Ok(())
    }
}

impl PredictionStore for InMemoryStore {
    fn append_prediction(&self, prediction: &Prediction) -> Result<()> {
        let mut predictions = Self::write(&self.predictions, "predictions")?;
        predictions.push(prediction.clone());
        Ok(())
    }

    fn predictions_for_player(&self, player_id: &str) -> Result<Vec<Prediction>> {
        self.filter_predictions(|p| p.player_id.as_deref() == Some(player_id))
    }

    fn predictions_for_session(&self, session_id: &str) -> Result<Vec<Prediction>> {
        self.filter_predictions(|p| p.session_id.as_deref() == Some(session_id))
    }

    fn predictions_by_type(&self, prediction_type: PredictionType) -> Result<Vec<Prediction>> {
        self.filter_predictions(|p| p.prediction_type == prediction_type)
    }

    fn latest_prediction(
        &self,
        player_id: &str,
        prediction_type: PredictionType,
    ) -> Result<Option<Prediction>> {
        let predictions = Self::read(&self.predictions, "predictions")?;
        // Later appends win ties on predicted_at
        Ok(predictions
            .iter()
            .filter(|p| p.player_id.as_deref() == Some(player_id))
            .filter(|p| p.prediction_type == prediction_type)
            .fold(None::<&Prediction>, |latest, p| match latest {
                Some(current) if current.predicted_at > p.predicted_at => Some(current),
                _ => Some(p),
            })
            .cloned())
    }

    fn recent_predictions(&self, since: DateTime<Utc>) -> Result<Vec<Prediction>> {
        let mut recent = self.filter_predictions(|p| p.predicted_at >= since)?;
        recent.sort_by(|a, b| b.predicted_at.cmp(&a.predicted_at));
        Ok(recent)
    }
}
