// Library interface for pitchrs modules
// This allows integration tests and the CLI to access the core functionality

pub mod aggregator;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod import;
pub mod kinematics;
pub mod load;
pub mod logging;
pub mod models;
pub mod movement;
pub mod performance;
pub mod risk;
pub mod store;
pub mod tactical;
pub mod zones;

// Re-export commonly used types for convenience
pub use models::*;
pub use aggregator::{SessionMetricsAggregator, WindowPolicy};
pub use config::AnalyticsConfig;
pub use database::SqliteStore;
pub use engine::{AnalyticsEngine, IncrementalOutcome};
pub use error::{PitchRsError, Result, StoreError};
pub use import::ImportManager;
pub use logging::{LogConfig, LogLevel};
pub use store::{InMemoryStore, MetricsStore, PlayerRegistry, PredictionStore, SampleStore};
pub use zones::{FieldGrid, SpeedZoneCalculator};
