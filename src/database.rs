use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::models::{Player, Prediction, PredictionType, Sample, SessionMetrics};
use crate::store::{MetricsStore, PlayerRegistry, PredictionStore, SampleStore};

type StoreResult<T> = std::result::Result<T, StoreError>;

/// Fixed-width UTC timestamp so text ordering matches time ordering
fn timestamp_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(payload: &str) -> StoreResult<T> {
    serde_json::from_str(payload).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// SQLite-backed store
///
/// Records are kept as JSON payload columns next to the indexed lookup keys.
/// The connection sits behind a mutex so the store can be shared across
/// threads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(StoreError::from)?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize database schema with tables and indexes
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS samples (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_metrics (
                player_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                calculated_at TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (player_id, session_id)
            );

            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS predictions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                player_id TEXT,
                session_id TEXT,
                prediction_type TEXT NOT NULL,
                predicted_at TEXT NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_samples_player_session
                ON samples (player_id, session_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_samples_session
                ON samples (session_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_metrics_player_time
                ON session_metrics (player_id, calculated_at);
            CREATE INDEX IF NOT EXISTS idx_metrics_session
                ON session_metrics (session_id);
            CREATE INDEX IF NOT EXISTS idx_predictions_player_type
                ON predictions (player_id, prediction_type, predicted_at);
            CREATE INDEX IF NOT EXISTS idx_predictions_session
                ON predictions (session_id);
            CREATE INDEX IF NOT EXISTS idx_predictions_time
                ON predictions (predicted_at);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned("sqlite connection".to_string()))
    }

    /// Run a query whose single column is a JSON payload and decode every row
    fn query_payloads<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let payloads = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        payloads.iter().map(|p| from_json(p)).collect()
    }

    fn query_payload<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Option<T>> {
        let conn = self.conn()?;
        let payload: Option<String> = conn
            .query_row(sql, params, |row| row.get(0))
            .optional()?;

        payload.as_deref().map(from_json).transpose()
    }
}

impl SampleStore for SqliteStore {
    fn append(&self, sample: Sample) -> Result<()> {
        let payload = to_json(&sample)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO samples (player_id, session_id, timestamp, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                sample.player_id,
                sample.session_id,
                timestamp_key(&sample.timestamp),
                payload
            ],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn samples_for(&self, player_id: &str, session_id: &str) -> Result<Vec<Sample>> {
        Ok(self.query_payloads(
            "SELECT payload FROM samples WHERE player_id = ?1 AND session_id = ?2 \
             ORDER BY timestamp, seq",
            params![player_id, session_id],
        )?)
    }

    fn samples_since(
        &self,
        player_id: &str,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        Ok(self.query_payloads(
            "SELECT payload FROM samples WHERE player_id = ?1 AND session_id = ?2 \
             AND timestamp >= ?3 ORDER BY timestamp, seq",
            params![player_id, session_id, timestamp_key(&since)],
        )?)
    }

    fn samples_for_session(&self, session_id: &str) -> Result<Vec<Sample>> {
        Ok(self.query_payloads(
            "SELECT payload FROM samples WHERE session_id = ?1 \
             ORDER BY timestamp, player_id, seq",
            params![session_id],
        )?)
    }
}

impl MetricsStore for SqliteStore {
    fn save_metrics(&self, metrics: &SessionMetrics) -> Result<()> {
        let payload = to_json(metrics)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO session_metrics (player_id, session_id, calculated_at, payload) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                metrics.player_id,
                metrics.session_id,
                timestamp_key(&metrics.calculated_at),
                payload
            ],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn metrics_for(&self, player_id: &str, session_id: &str) -> Result<Option<SessionMetrics>> {
        Ok(self.query_payload(
            "SELECT payload FROM session_metrics WHERE player_id = ?1 AND session_id = ?2",
            params![player_id, session_id],
        )?)
    }

    fn metrics_in_range(
        &self,
        player_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionMetrics>> {
        Ok(self.query_payloads(
            "SELECT payload FROM session_metrics WHERE player_id = ?1 \
             AND calculated_at >= ?2 AND calculated_at <= ?3 ORDER BY calculated_at",
            params![player_id, timestamp_key(&from), timestamp_key(&to)],
        )?)
    }

    fn metrics_for_session(&self, session_id: &str) -> Result<Vec<SessionMetrics>> {
        Ok(self.query_payloads(
            "SELECT payload FROM session_metrics WHERE session_id = ?1 ORDER BY player_id",
            params![session_id],
        )?)
    }
}

impl PlayerRegistry for SqliteStore {
    fn player(&self, player_id: &str) -> Result<Option<Player>> {
        Ok(self.query_payload(
            "SELECT payload FROM players WHERE id = ?1",
            params![player_id],
        )?)
    }

    fn register_player(&self, player: Player) -> Result<()> {
        let payload = to_json(&player)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO players (id, payload) VALUES (?1, ?2)",
            params![player.id, payload],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }
}

impl PredictionStore for SqliteStore {
    fn append_prediction(&self, prediction: &Prediction) -> Result<()> {
        let payload = to_json(prediction)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO predictions (id, player_id, session_id, prediction_type, predicted_at, payload) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                prediction.id.to_string(),
                prediction.player_id,
                prediction.session_id,
                prediction.prediction_type.as_str(),
                timestamp_key(&prediction.predicted_at),
                payload
            ],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn predictions_for_player(&self, player_id: &str) -> Result<Vec<Prediction>> {
        Ok(self.query_payloads(
            "SELECT payload FROM predictions WHERE player_id = ?1 ORDER BY seq",
            params![player_id],
        )?)
    }

    fn predictions_for_session(&self, session_id: &str) -> Result<Vec<Prediction>> {
        Ok(self.query_payloads(
            "SELECT payload FROM predictions WHERE session_id = ?1 ORDER BY seq",
            params![session_id],
        )?)
    }

    fn predictions_by_type(&self, prediction_type: PredictionType) -> Result<Vec<Prediction>> {
        Ok(self.query_payloads(
            "SELECT payload FROM predictions WHERE prediction_type = ?1 ORDER BY seq",
            params![prediction_type.as_str()],
        )?)
    }

    fn latest_prediction(
        &self,
        player_id: &str,
        prediction_type: PredictionType,
    ) -> Result<Option<Prediction>> {
        Ok(self.query_payload(
            "SELECT payload FROM predictions WHERE player_id = ?1 AND prediction_type = ?2 \
             ORDER BY predicted_at DESC, seq DESC LIMIT 1",
            params![player_id, prediction_type.as_str()],
        )?)
    }

    fn recent_predictions(&self, since: DateTime<Utc>) -> Result<Vec<Prediction>> {
        Ok(self.query_payloads(
            "SELECT payload FROM predictions WHERE predicted_at >= ?1 \
             ORDER BY predicted_at DESC, seq DESC",
            params![timestamp_key(&since)],
        )?)
    }
}
