use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::instrument;

use crate::config::{AnalyticsConfig, LoadModelKind, ThresholdConfig};
use crate::load::{LoadModel, ProxyLoadModel, RollingLoadModel};
use crate::models::{sort_samples, Sample, SessionMetrics};
use crate::movement::MovementMetricsCalculator;
use crate::performance::{
    PerformanceEstimator, PerformanceMetricsCalculator, PlaceholderPerformanceEstimator,
};
use crate::tactical::{
    FieldProjection, LinearFieldProjection, PlaceholderPositionalModel, PositionalModel,
    TacticalMetricsCalculator,
};
use crate::zones::FieldGrid;

/// Which part of a sample sequence a metrics run looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Every sample of the session
    FullSession,
    /// Samples no older than the duration before the anchor instant
    Trailing(Duration),
}

impl WindowPolicy {
    /// Select the window from samples sorted ascending by timestamp
    ///
    /// The trailing window is closed at both ends: `[anchor - d, anchor]`.
    pub fn select<'s>(&self, samples: &'s [Sample], anchor: DateTime<Utc>) -> &'s [Sample] {
        match self {
            WindowPolicy::FullSession => samples,
            WindowPolicy::Trailing(duration) => {
                let start = anchor - *duration;
                let first = samples.partition_point(|s| s.timestamp < start);
                let end = samples.partition_point(|s| s.timestamp <= anchor);
                if first >= end {
                    &samples[0..0]
                } else {
                    &samples[first..end]
                }
            }
        }
    }
}

/// Runs the movement, performance, tactical and load calculators over one window
#[derive(Clone)]
pub struct SessionMetricsAggregator {
    thresholds: ThresholdConfig,
    grid: FieldGrid,
    performance_estimator: Arc<dyn PerformanceEstimator>,
    field_projection: Arc<dyn FieldProjection>,
    positional_model: Arc<dyn PositionalModel>,
    load_model: Arc<dyn LoadModel>,
}

impl SessionMetricsAggregator {
    /// Create aggregator with the default estimators for a configuration
    pub fn new(config: &AnalyticsConfig) -> Self {
        let load_model: Arc<dyn LoadModel> = match config.load_model {
            LoadModelKind::Proxy => Arc::new(ProxyLoadModel),
            LoadModelKind::Rolling => Arc::new(RollingLoadModel::from_windows(&config.windows)),
        };

        SessionMetricsAggregator {
            thresholds: config.thresholds.clone(),
            grid: FieldGrid::new(&config.field),
            performance_estimator: Arc::new(PlaceholderPerformanceEstimator),
            field_projection: Arc::new(LinearFieldProjection::new(config.field.projection_scale)),
            positional_model: Arc::new(PlaceholderPositionalModel),
            load_model,
        }
    }

    pub fn with_performance_estimator(mut self, estimator: Arc<dyn PerformanceEstimator>) -> Self {
        self.performance_estimator = estimator;
        self
    }

    pub fn with_field_projection(mut self, projection: Arc<dyn FieldProjection>) -> Self {
        self.field_projection = projection;
        self
    }

    pub fn with_positional_model(mut self, model: Arc<dyn PositionalModel>) -> Self {
        self.positional_model = model;
        self
    }

    pub fn with_load_model(mut self, model: Arc<dyn LoadModel>) -> Self {
        self.load_model = model;
        self
    }

    pub fn field_projection(&self) -> Arc<dyn FieldProjection> {
        Arc::clone(&self.field_projection)
    }

    pub fn grid(&self) -> FieldGrid {
        self.grid
    }

    /// Days of metrics history the load model needs
    pub fn load_history_days(&self) -> i64 {
        self.load_model.history_days()
    }

    /// Build session metrics from samples
    ///
    /// Samples are sorted by timestamp (stable, so ties keep arrival order)
    /// before the window is selected. The trailing window is anchored at
    /// `as_of`, which also stamps `calculated_at`. Returns `None` when the
    /// window holds fewer than two samples.
    #[instrument(skip(self, samples, history), fields(samples = samples.len()))]
    pub fn aggregate(
        &self,
        player_id: &str,
        session_id: &str,
        mut samples: Vec<Sample>,
        policy: WindowPolicy,
        history: &[SessionMetrics],
        as_of: DateTime<Utc>,
    ) -> Option<SessionMetrics> {
        sort_samples(&mut samples);
        let window = policy.select(&samples, as_of);

        let movement =
            MovementMetricsCalculator::with_config(self.thresholds.clone()).calculate(window)?;
        let performance =
            PerformanceMetricsCalculator::new(self.performance_estimator.as_ref()).calculate(window);
        let tactical = TacticalMetricsCalculator::new(
            self.field_projection.as_ref(),
            self.positional_model.as_ref(),
            self.grid,
        )
        .calculate(window);
        let load = self.load_model.calculate(window, history, as_of);

        Some(SessionMetrics {
            player_id: player_id.to_string(),
            session_id: session_id.to_string(),
            calculated_at: as_of,
            movement,
            performance,
            tactical,
            load,
        })
    }
}

impl Default for SessionMetricsAggregator {
    fn default() -> Self {
        SessionMetricsAggregator::new(&AnalyticsConfig::default())
    }
}
