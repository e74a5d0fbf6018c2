//! SQLite decision store

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, params};

use super::DecisionStore;
use crate::error::{AdvisorError, Result};
use crate::model::{Decision, DecisionRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS decisions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts_utc TEXT NOT NULL,
        ticker TEXT NOT NULL,
        decision_json TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_decisions_ticker_id ON decisions(ticker, id);
";

/// Decision memory backed by one SQLite connection
///
/// Uses interior mutability (Mutex) because `DecisionStore` takes `&self`.
pub struct SqliteDecisionStore {
    conn: Mutex<Connection>,
    path: String,
    busy_timeout: Duration,
}

impl SqliteDecisionStore {
    /// Open (or create) the database at `path`; `:memory:` opens a private in-memory store
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&path)
        }
        .map_err(|e| AdvisorError::Persistence(format!("failed to open {path}: {e}")))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| AdvisorError::Persistence(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            busy_timeout,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:", Duration::from_secs(5))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Busy or locked databases surface as timeouts
    fn storage_error(&self, err: rusqlite::Error) -> AdvisorError {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => AdvisorError::Timeout {
                stage: "persistence",
                after: self.busy_timeout,
            },
            _ => AdvisorError::Persistence(err.to_string()),
        }
    }
}

impl DecisionStore for SqliteDecisionStore {
    fn init(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(SCHEMA)
            .map_err(|e| self.storage_error(e))
    }

    fn save_decision(&self, ticker: &str, decision: &Decision) -> Result<DecisionRecord> {
        let payload = serde_json::to_string(decision)?;
        let ts_utc = Utc::now().trunc_subsecs(6);

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| self.storage_error(e))?;
        tx.execute(
            "INSERT INTO decisions (ts_utc, ticker, decision_json) VALUES (?1, ?2, ?3)",
            params![ts_utc.to_rfc3339_opts(SecondsFormat::Micros, false), ticker, payload],
        )
        .map_err(|e| self.storage_error(e))?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(|e| self.storage_error(e))?;

        tracing::debug!(id, ticker, "Decision persisted");
        Ok(DecisionRecord {
            id,
            ts_utc,
            ticker: ticker.to_string(),
            decision: decision.clone(),
        })
    }

    fn recent_decisions(&self, ticker: &str, limit: usize) -> Result<Vec<DecisionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, ts_utc, ticker, decision_json
                 FROM decisions
                 WHERE ticker = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| self.storage_error(e))?;

        let rows = stmt
            .query_map(params![ticker, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| self.storage_error(e))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, ts_utc, ticker, decision_json) = row.map_err(|e| self.storage_error(e))?;
            let ts_utc = DateTime::parse_from_rfc3339(&ts_utc)
                .map_err(|e| AdvisorError::Persistence(format!("record {id} has a bad timestamp: {e}")))?
                .with_timezone(&Utc);
            records.push(DecisionRecord {
                id,
                ts_utc,
                ticker,
                decision: serde_json::from_str::<Decision>(&decision_json)?,
            });
        }
        Ok(records)
    }

    fn name(&self) -> &str {
        "SQLite"
    }
}
