//! Analytics facade over the stores, calculators and scorers
//!
//! `AnalyticsEngine` is what callers (the CLI, an ingestion service, a
//! request layer) talk to. It reads from the stores, runs the pure
//! calculators and scorers, and writes derived metrics and predictions back.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregator::{SessionMetricsAggregator, WindowPolicy};
use crate::config::AnalyticsConfig;
use crate::error::{PitchRsError, Result};
use crate::import::validation::SampleValidator;
use crate::logging::log_error;
use crate::models::{Prediction, Sample, SessionMetrics};
use crate::risk::{
    AsymmetrySignals, FatigueScorer, InjuryRiskScorer, OptimalPositionScorer, PerformanceScorer,
    RandomizedAsymmetrySignals, TacticalScorer,
};
use crate::store::{MetricsStore, PlayerRegistry, PredictionStore, SampleStore};

/// What an incremental metrics run did
#[derive(Debug, Clone, PartialEq)]
pub enum IncrementalOutcome {
    /// Metrics for the trailing window were written
    Written(SessionMetrics),
    /// Fewer than two samples in the trailing window
    Skipped,
    /// Computation or persistence failed; the error was logged
    Failed(String),
}

/// Entry point for metrics computation and scoring
#[derive(Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    aggregator: SessionMetricsAggregator,
    asymmetry: Arc<dyn AsymmetrySignals>,
    samples: Arc<dyn SampleStore>,
    metrics: Arc<dyn MetricsStore>,
    players: Arc<dyn PlayerRegistry>,
    predictions: Arc<dyn PredictionStore>,
}

impl AnalyticsEngine {
    pub fn new(
        config: AnalyticsConfig,
        samples: Arc<dyn SampleStore>,
        metrics: Arc<dyn MetricsStore>,
        players: Arc<dyn PlayerRegistry>,
        predictions: Arc<dyn PredictionStore>,
    ) -> Self {
        AnalyticsEngine {
            aggregator: SessionMetricsAggregator::new(&config),
            asymmetry: Arc::new(RandomizedAsymmetrySignals),
            config,
            samples,
            metrics,
            players,
            predictions,
        }
    }

    /// Engine backed by one store that implements every store trait
    pub fn with_store<S>(config: AnalyticsConfig, store: Arc<S>) -> Self
    where
        S: SampleStore + MetricsStore + PlayerRegistry + PredictionStore + 'static,
    {
        AnalyticsEngine::new(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            store,
        )
    }

    /// Replace the metrics aggregator, e.g. to inject real estimators
    pub fn with_aggregator(mut self, aggregator: SessionMetricsAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_asymmetry_signals(mut self, signals: Arc<dyn AsymmetrySignals>) -> Self {
        self.asymmetry = signals;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    fn load_history(
        &self,
        player_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SessionMetrics>> {
        let days = self.aggregator.load_history_days();
        if days <= 0 {
            return Ok(Vec::new());
        }
        self.metrics
            .metrics_in_range(player_id, as_of - Duration::days(days), as_of)
    }

    fn record(&self, prediction: Prediction) -> Result<Prediction> {
        self.predictions.append_prediction(&prediction)?;
        Ok(prediction)
    }

    /// Metrics over every stored sample of a player's session
    ///
    /// Returns `None` when the session has fewer than two samples. Nothing
    /// is persisted.
    pub fn compute_session_metrics(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionMetrics>> {
        self.compute_session_metrics_as_of(player_id, session_id, Utc::now())
    }

    pub fn compute_session_metrics_as_of(
        &self,
        player_id: &str,
        session_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Option<SessionMetrics>> {
        let samples = self.samples.samples_for(player_id, session_id)?;
        if samples.is_empty() {
            debug!(player_id, session_id, "No samples for session");
            return Ok(None);
        }

        let history = self.load_history(player_id, as_of)?;
        Ok(self.aggregator.aggregate(
            player_id,
            session_id,
            samples,
            WindowPolicy::FullSession,
            &history,
            as_of,
        ))
    }

    /// Compute and persist metrics for every player with samples in a session
    pub fn compute_session_metrics_for_all(&self, session_id: &str) -> Result<Vec<SessionMetrics>> {
        let as_of = Utc::now();
        let player_ids: BTreeSet<String> = self
            .samples
            .samples_for_session(session_id)?
            .into_iter()
            .map(|s| s.player_id)
            .collect();

        info!(session_id, players = player_ids.len(), "Computing session metrics");

        let computed: Vec<Option<SessionMetrics>> = player_ids
            .par_iter()
            .map(|player_id| self.compute_session_metrics_as_of(player_id, session_id, as_of))
            .collect::<Result<_>>()?;

        let computed: Vec<SessionMetrics> = computed.into_iter().flatten().collect();
        for metrics in &computed {
            self.metrics.save_metrics(metrics)?;
        }
        Ok(computed)
    }

    /// Recompute the trailing-window metrics for a sample's player and session
    ///
    /// The window ends at the sample's timestamp. Failures are logged and
    /// reported as `Failed`, never returned as errors. Concurrent runs for the
    /// same player and session overwrite each other.
    pub fn compute_incremental_metrics(&self, sample: &Sample) -> IncrementalOutcome {
        match self.try_incremental(sample) {
            Ok(Some(metrics)) => {
                debug!(
                    player_id = %sample.player_id,
                    session_id = %sample.session_id,
                    "Incremental metrics written"
                );
                IncrementalOutcome::Written(metrics)
            }
            Ok(None) => IncrementalOutcome::Skipped,
            Err(e) => {
                let context = format!(
                    "incremental metrics for {}/{}",
                    sample.player_id, sample.session_id
                );
                log_error(&context, &e);
                IncrementalOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_incremental(&self, sample: &Sample) -> Result<Option<SessionMetrics>> {
        let window = Duration::seconds(self.config.windows.incremental_window_secs);
        let anchor = sample.timestamp;

        let recent =
            self.samples
                .samples_since(&sample.player_id, &sample.session_id, anchor - window)?;
        let history = self.load_history(&sample.player_id, anchor)?;

        let Some(metrics) = self.aggregator.aggregate(
            &sample.player_id,
            &sample.session_id,
            recent,
            WindowPolicy::Trailing(window),
            &history,
            anchor,
        ) else {
            return Ok(None);
        };

        self.metrics.save_metrics(&metrics)?;
        Ok(Some(metrics))
    }

    /// Validate and store a sample, then run a best-effort incremental
    /// metrics update
    ///
    /// Only validation and the append can fail the call. A rejected sample
    /// is never stored.
    pub fn ingest_sample(&self, mut sample: Sample) -> Result<IncrementalOutcome> {
        SampleValidator::validate(&sample)?;
        SampleValidator::clean_sample(&mut sample);
        self.samples.append(sample.clone())?;
        Ok(self.compute_incremental_metrics(&sample))
    }

    /// In-session fatigue for a player
    pub fn score_fatigue(&self, player_id: &str, session_id: &str) -> Result<Prediction> {
        info!(player_id, session_id, "Scoring fatigue");

        let samples = self.samples.samples_for(player_id, session_id)?;
        if samples.is_empty() {
            warn!(player_id, session_id, "No samples, returning default fatigue prediction");
        }
        let metrics = self.metrics.metrics_for(player_id, session_id)?;

        let prediction = FatigueScorer::with_config(self.config.thresholds.clone()).score(
            player_id,
            session_id,
            &samples,
            metrics.as_ref(),
        )?;
        self.record(prediction)
    }

    /// Injury risk from the trailing injury-history window ending now
    pub fn score_injury_risk(&self, player_id: &str) -> Result<Prediction> {
        self.score_injury_risk_as_of(player_id, Utc::now())
    }

    pub fn score_injury_risk_as_of(&self, player_id: &str, as_of: DateTime<Utc>) -> Result<Prediction> {
        info!(player_id, "Scoring injury risk");

        let from = as_of - Duration::days(self.config.windows.injury_history_days);
        let history = self.metrics.metrics_in_range(player_id, from, as_of)?;
        if history.is_empty() {
            warn!(player_id, "No historical data, returning default injury prediction");
        }

        let prediction = InjuryRiskScorer::new(self.asymmetry.as_ref()).score(player_id, &history)?;
        self.record(prediction)
    }

    /// Performance optimization plan from the trailing performance window
    ///
    /// Fails with `InvalidReference` for an unregistered player.
    pub fn score_performance(&self, player_id: &str) -> Result<Prediction> {
        self.score_performance_as_of(player_id, Utc::now())
    }

    pub fn score_performance_as_of(
        &self,
        player_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Prediction> {
        info!(player_id, "Scoring performance");

        let player = self
            .players
            .player(player_id)?
            .ok_or_else(|| PitchRsError::InvalidReference(format!("player {}", player_id)))?;

        let from = as_of - Duration::days(self.config.windows.performance_history_days);
        let history = self.metrics.metrics_in_range(player_id, from, as_of)?;
        if history.is_empty() {
            warn!(player_id, "No recent sessions, returning default performance prediction");
        }

        let prediction = PerformanceScorer::new().score(&player, &history)?;
        self.record(prediction)
    }

    /// Team tactical analysis across every player of a session
    pub fn score_tactical(&self, session_id: &str) -> Result<Prediction> {
        info!(session_id, "Scoring tactical analysis");

        let metrics = self.metrics.metrics_for_session(session_id)?;
        let samples = self.samples.samples_for_session(session_id)?;
        if metrics.is_empty() || samples.is_empty() {
            warn!(session_id, "Missing metrics or samples, returning default tactical prediction");
        }

        let prediction = TacticalScorer::with_config(self.config.tactical.clone()).score(
            session_id,
            &metrics,
            &samples,
        )?;
        self.record(prediction)
    }

    /// Positioning advice for one player in a session
    pub fn score_optimal_position(&self, player_id: &str, session_id: &str) -> Result<Prediction> {
        info!(player_id, session_id, "Scoring optimal position");

        let samples = self.samples.samples_for(player_id, session_id)?;
        let metrics = self.metrics.metrics_for(player_id, session_id)?;
        if samples.is_empty() || metrics.is_none() {
            warn!(player_id, session_id, "Missing samples or metrics, returning default position prediction");
        }

        let projection = self.aggregator.field_projection();
        let prediction = OptimalPositionScorer::new(
            projection.as_ref(),
            self.aggregator.grid(),
            self.config.tactical.clone(),
        )
        .score(player_id, session_id, &samples, metrics.as_ref())?;
        self.record(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorSeverity, StoreError};
    use crate::models::{Movement, Player, Position, PredictionType};
    use crate::risk::FixedAsymmetrySignals;
    use crate::store::InMemoryStore;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 26, 15, 0, 0).unwrap()
    }

    fn create_sample(player_id: &str, seconds: i64, speed: f64) -> Sample {
        Sample {
            player_id: player_id.to_string(),
            session_id: "league-9".to_string(),
            timestamp: base_time() + Duration::seconds(seconds),
            position: Position {
                latitude: 0.0003 + seconds as f64 * 0.000001,
                longitude: 0.0005,
                altitude: 0.0,
                accuracy: 2.0,
                satellites: 11,
            },
            movement: Movement {
                speed,
                acceleration: 0.5,
                direction: 0.0,
                imu: None,
            },
            biometrics: None,
            environmental: None,
        }
    }

    fn create_engine() -> (AnalyticsEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let engine = AnalyticsEngine::with_store(AnalyticsConfig::default(), store.clone())
            .with_asymmetry_signals(Arc::new(FixedAsymmetrySignals::default()));
        (engine, store)
    }

    #[test]
    fn test_session_metrics_none_without_samples() {
        let (engine, _) = create_engine();
        assert!(engine.compute_session_metrics("p1", "league-9").unwrap().is_none());
    }

    #[test]
    fn test_ingest_skips_then_writes() {
        let (engine, store) = create_engine();

        let first = engine.ingest_sample(create_sample("p1", 0, 12.0)).unwrap();
        assert_eq!(first, IncrementalOutcome::Skipped);

        let second = engine.ingest_sample(create_sample("p1", 1, 26.0)).unwrap();
        assert!(matches!(second, IncrementalOutcome::Written(_)));

        let stored = store.metrics_for("p1", "league-9").unwrap().unwrap();
        assert_eq!(stored.movement.max_speed, 26.0);
        assert_eq!(stored.calculated_at, base_time() + Duration::seconds(1));

        // Samples older than the trailing window are left out
        let late = engine.ingest_sample(create_sample("p1", 1000, 10.0)).unwrap();
        assert_eq!(late, IncrementalOutcome::Skipped);
    }

    /// Sample store whose windowed reads always fail
    struct BrokenWindowStore(InMemoryStore);

    impl SampleStore for BrokenWindowStore {
        fn append(&self, sample: Sample) -> Result<()> {
            self.0.append(sample)
        }

        fn samples_for(&self, player_id: &str, session_id: &str) -> Result<Vec<Sample>> {
            self.0.samples_for(player_id, session_id)
        }

        fn samples_since(&self, _: &str, _: &str, _: DateTime<Utc>) -> Result<Vec<Sample>> {
            Err(crate::error::StoreError::LockPoisoned("samples".to_string()).into())
        }

        fn samples_for_session(&self, session_id: &str) -> Result<Vec<Sample>> {
            self.0.samples_for_session(session_id)
        }
    }

    #[test]
    fn test_incremental_failure_does_not_fail_ingestion() {
        let store = Arc::new(InMemoryStore::new());
        let engine = AnalyticsEngine::new(
            AnalyticsConfig::default(),
            Arc::new(BrokenWindowStore(InMemoryStore::new())),
            store.clone(),
            store.clone(),
            store,
        );

        let outcome = engine.ingest_sample(create_sample("p1", 0, 12.0)).unwrap();
        assert!(matches!(outcome, IncrementalOutcome::Failed(_)));
    }

    #[test]
    fn test_ingest_rejects_invalid_sample() {
        let (engine, store) = create_engine();

        let mut sample = create_sample("p1", 0, 12.0);
        sample.position.latitude = f64::NAN;
        let err = engine.ingest_sample(sample).unwrap_err();
        assert!(matches!(err, PitchRsError::Validation(_)));
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(store.samples_for("p1", "league-9").unwrap().is_empty());

        // Implausible speed is capped rather than rejected
        engine.ingest_sample(create_sample("p1", 1, 80.0)).unwrap();
        let stored = store.samples_for("p1", "league-9").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].movement.speed, 45.0);
    }

    /// Metrics store whose reads fail the way a busy SQLite database does
    struct BusyMetricsStore;

    impl BusyMetricsStore {
        fn busy() -> PitchRsError {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some("database is locked".to_string()),
            ))
            .into()
        }
    }

    impl MetricsStore for BusyMetricsStore {
        fn save_metrics(&self, _: &SessionMetrics) -> Result<()> {
            Err(Self::busy())
        }

        fn metrics_for(&self, _: &str, _: &str) -> Result<Option<SessionMetrics>> {
            Err(Self::busy())
        }

        fn metrics_in_range(
            &self,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<SessionMetrics>> {
            Err(Self::busy())
        }

        fn metrics_for_session(&self, _: &str) -> Result<Vec<SessionMetrics>> {
            Err(Self::busy())
        }
    }

    #[test]
    fn test_store_failures_propagate_typed() {
        let store = Arc::new(InMemoryStore::new());
        let engine = AnalyticsEngine::new(
            AnalyticsConfig::default(),
            store.clone(),
            Arc::new(BusyMetricsStore),
            store.clone(),
            store.clone(),
        );
        store.append(create_sample("p1", 0, 12.0)).unwrap();

        let err = engine.score_injury_risk("p1").unwrap_err();
        assert!(matches!(err, PitchRsError::Store(StoreError::Sqlite(_))));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Error);

        let err = engine.score_fatigue("p1", "league-9").unwrap_err();
        assert!(matches!(err, PitchRsError::Store(StoreError::Sqlite(_))));
        assert!(err.is_retryable());

        // Nothing is recorded for a failed score
        assert!(store.predictions_for_player("p1").unwrap().is_empty());
    }

    #[test]
    fn test_compute_for_all_persists_each_player() {
        let (engine, store) = create_engine();
        for player in ["p1", "p2", "p3"] {
            for i in 0..5 {
                store.append(create_sample(player, i, 10.0 + i as f64)).unwrap();
            }
        }
        store.append(create_sample("p4", 0, 10.0)).unwrap();

        let computed = engine.compute_session_metrics_for_all("league-9").unwrap();
        assert_eq!(computed.len(), 3);
        assert_eq!(store.metrics_for_session("league-9").unwrap().len(), 3);
    }

    #[test]
    fn test_scores_are_recorded() {
        let (engine, store) = create_engine();

        let fatigue = engine.score_fatigue("p1", "league-9").unwrap();
        assert_eq!(fatigue.output_str("fatigueCategory"), Some("LOW"));
        assert_eq!(fatigue.confidence, 0.4);

        let injury = engine.score_injury_risk("p1").unwrap();
        assert_eq!(injury.output_str("riskLevel"), Some("MINIMAL"));

        let tactical = engine.score_tactical("league-9").unwrap();
        assert_eq!(tactical.confidence, 0.3);

        let position = engine.score_optimal_position("p1", "league-9").unwrap();
        assert_eq!(position.output_str("optimalZone"), Some("Current zone"));

        assert_eq!(store.predictions_for_player("p1").unwrap().len(), 3);
        assert!(store
            .latest_prediction("p1", PredictionType::InjuryRisk)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_performance_requires_known_player() {
        let (engine, store) = create_engine();

        let err = engine.score_performance("ghost").unwrap_err();
        assert!(matches!(err, PitchRsError::InvalidReference(_)));

        store
            .register_player(Player {
                id: "p1".to_string(),
                name: "Keeper".to_string(),
                position: Some("Goalkeeper".to_string()),
                jersey_number: Some(1),
                team_id: None,
                date_of_birth: None,
                height: None,
                weight: None,
                device_id: None,
                active: true,
                profile: None,
            })
            .unwrap();

        let prediction = engine.score_performance("p1").unwrap();
        assert_eq!(prediction.output_str("priority"), Some("LOW"));
        assert_eq!(prediction.confidence, 0.5);
    }
}
