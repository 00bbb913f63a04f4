//! SQLite persistence for the prediction log.
//!
//! Records are append-only. The only mutation is `set_actual`, which fills the
//! verification columns exactly once.

use crate::error::{AppError, Result};
use crate::types::{
    Decision, NewPrediction, PredictionRecord, PredictionStatus, Timeframe, Vote, WeightTable,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "SELECT id, symbol, timestamp, reference_price, decision, votes,
    timeframe, weights, actual, verified_price, verified_at FROM predictions";

/// Optional narrowing for verified-record queries.
#[derive(Debug, Clone, Default)]
pub struct PredictionFilter {
    pub symbol: Option<String>,
    pub timeframe: Option<Timeframe>,
    /// Inclusive lower bound on the creation time.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the creation time.
    pub until: Option<DateTime<Utc>>,
}

/// Timestamps are stored as fixed-width RFC 3339 strings so they sort lexically.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_error(col: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, msg.into())
}

fn parse_ts(col: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_decision(col: usize, raw: &str) -> rusqlite::Result<Decision> {
    Decision::from_str(raw).ok_or_else(|| conversion_error(col, format!("bad decision '{}'", raw)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PredictionRecord> {
    let timestamp: String = row.get(2)?;
    let decision: String = row.get(4)?;
    let votes_json: String = row.get(5)?;
    let timeframe: String = row.get(6)?;
    let weights_json: Option<String> = row.get(7)?;
    let actual: Option<String> = row.get(8)?;
    let verified_at: Option<String> = row.get(10)?;

    let votes: Vec<Vote> = serde_json::from_str(&votes_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let weights: Option<WeightTable> = weights_json
        .map(|w| serde_json::from_str(&w))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(PredictionRecord {
        id: row.get(0)?,
        symbol: row.get(1)?,
        timestamp: parse_ts(2, &timestamp)?,
        reference_price: row.get(3)?,
        decision: parse_decision(4, &decision)?,
        votes,
        timeframe: Timeframe::from_str(&timeframe)
            .ok_or_else(|| conversion_error(6, format!("bad timeframe '{}'", timeframe)))?,
        weights,
        actual: actual.map(|a| parse_decision(8, &a)).transpose()?,
        verified_price: row.get(9)?,
        verified_at: verified_at.map(|v| parse_ts(10, &v)).transpose()?,
    })
}

/// SQLite store for prediction records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::StorageUnavailable("connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                reference_price REAL NOT NULL,
                decision TEXT NOT NULL,
                votes TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                weights TEXT,
                actual TEXT,
                verified_price REAL,
                verified_at TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_predictions_actual ON predictions(actual)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_predictions_timestamp ON predictions(timestamp)",
            [],
        )?;

        Ok(())
    }

    /// Run a store operation on the blocking pool.
    pub async fn run_blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&SqliteStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| AppError::StorageUnavailable(format!("storage task failed: {}", e)))?
    }

    /// Append a prediction and return its id.
    pub fn append(&self, prediction: &NewPrediction) -> Result<i64> {
        let votes = serde_json::to_string(&prediction.votes)?;
        let weights = prediction
            .weights
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO predictions (symbol, timestamp, reference_price, decision, votes, timeframe, weights)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                prediction.symbol,
                format_ts(&prediction.timestamp),
                prediction.reference_price,
                prediction.decision.as_str(),
                votes,
                prediction.timeframe.as_str(),
                weights,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(
            "Stored prediction {} for {}: {}",
            id, prediction.symbol, prediction.decision
        );
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<PredictionRecord>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
    }

    /// Records still waiting for verification, in insertion order.
    pub fn list_unverified(&self) -> Result<Vec<PredictionRecord>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE actual IS NULL ORDER BY id ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Verified records matching the filter, in insertion order.
    pub fn list_verified(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>> {
        let mut clauses = vec!["actual IS NOT NULL".to_string()];
        let mut values: Vec<String> = Vec::new();

        if let Some(ref symbol) = filter.symbol {
            values.push(symbol.to_uppercase());
            clauses.push(format!("symbol = ?{}", values.len()));
        }
        if let Some(timeframe) = filter.timeframe {
            values.push(timeframe.as_str().to_string());
            clauses.push(format!("timeframe = ?{}", values.len()));
        }
        if let Some(ref since) = filter.since {
            values.push(format_ts(since));
            clauses.push(format!("timestamp >= ?{}", values.len()));
        }
        if let Some(ref until) = filter.until {
            values.push(format_ts(until));
            clauses.push(format!("timestamp < ?{}", values.len()));
        }

        let sql = format!(
            "{} WHERE {} ORDER BY id ASC",
            SELECT_COLUMNS,
            clauses.join(" AND ")
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Most recent records first, optionally by verification status.
    pub fn list_recent(
        &self,
        status: Option<PredictionStatus>,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>> {
        let clause = match status {
            Some(PredictionStatus::Pending) => "WHERE actual IS NULL",
            Some(PredictionStatus::Verified) => "WHERE actual IS NOT NULL",
            None => "",
        };
        let sql = format!("{} {} ORDER BY id DESC LIMIT ?1", SELECT_COLUMNS, clause);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Record the realized direction. Fails with `AlreadyVerified` if it was set before.
    pub fn set_actual(
        &self,
        id: i64,
        actual: Decision,
        verified_price: f64,
        verified_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE predictions SET actual = ?1, verified_price = ?2, verified_at = ?3
             WHERE id = ?4 AND actual IS NULL",
            params![actual.as_str(), verified_price, format_ts(&verified_at), id],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let exists = conn
            .query_row("SELECT 1 FROM predictions WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            Err(AppError::AlreadyVerified(id))
        } else {
            Err(AppError::NotFound(format!("prediction {}", id)))
        }
    }

    /// Total stored records.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
