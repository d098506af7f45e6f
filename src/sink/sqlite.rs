//! SQLite sink implementation
//!
//! This module provides SQLite-backed implementations of `TabularSink` and
//! `RunLog`. Every sink is a slice of the shared `records` table selected by
//! its name.

use crate::sink::schema::initialize_schema;
use crate::sink::traits::{RunLog, SinkError, SinkResult, TabularSink};
use crate::sink::{HarvestRecord, RunRecord, RunStatus, SkipRow};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Opens (or creates) the harvest database with durable settings
///
/// `synchronous = FULL` makes every committed row survive a crash, which is
/// what the completion ledger relies on.
pub fn open_connection(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = FULL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

fn open_in_memory() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// One named sink inside the harvest database
pub struct SqliteSink {
    conn: Connection,
    sink: String,
}

impl SqliteSink {
    /// Opens the sink `name` in the database at `path`
    pub fn open(path: &Path, name: &str) -> SinkResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
            sink: name.to_string(),
        })
    }

    /// Creates a sink backed by a private in-memory database
    pub fn in_memory(name: &str) -> SinkResult<Self> {
        Ok(Self {
            conn: open_in_memory()?,
            sink: name.to_string(),
        })
    }

    fn insert(conn: &Connection, sink: &str, record: &HarvestRecord) -> SinkResult<()> {
        let payload = if record.is_marker() {
            None
        } else {
            Some(serde_json::to_string(&record.payload)?)
        };
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO records (sink, identifier, item_id, payload, written_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![sink, record.identifier, record.item_id, payload, now],
        )?;
        Ok(())
    }
}

impl TabularSink for SqliteSink {
    fn name(&self) -> &str {
        &self.sink
    }

    fn create(&mut self) -> SinkResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    fn truncate(&mut self) -> SinkResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM records WHERE sink = ?1", params![self.sink])?;
        tracing::info!("Truncated sink '{}' ({} rows removed)", self.sink, removed);
        Ok(())
    }

    fn read_identifiers(&self) -> SinkResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT identifier FROM records WHERE sink = ?1")?;

        let identifiers = stmt
            .query_map(params![self.sink], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(identifiers)
    }

    fn append_row(&mut self, record: &HarvestRecord) -> SinkResult<()> {
        Self::insert(&self.conn, &self.sink, record)
    }

    fn append_rows(&mut self, records: &[HarvestRecord]) -> SinkResult<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            Self::insert(&tx, &self.sink, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_payloads(&self, identifier: &str) -> SinkResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM records
             WHERE sink = ?1 AND identifier = ?2 AND payload IS NOT NULL
             ORDER BY id",
        )?;

        let raw = stmt
            .query_map(params![self.sink, identifier], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let payloads = raw
            .iter()
            .map(|text| serde_json::from_str(text))
            .collect::<Result<Vec<Value>, _>>()?;

        Ok(payloads)
    }

    fn count_rows(&self) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE sink = ?1",
            params![self.sink],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Run bookkeeping in the harvest database
pub struct SqliteRunLog {
    conn: Connection,
}

impl SqliteRunLog {
    pub fn open(path: &Path) -> SinkResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    pub fn in_memory() -> SinkResult<Self> {
        Ok(Self {
            conn: open_in_memory()?,
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        resource: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
    })
}

impl RunLog for SqliteRunLog {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, resource: &str) -> SinkResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, resource, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, resource, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> SinkResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, resource, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(SinkError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> SinkResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, resource, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> SinkResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(SinkError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Skips =====

    fn record_skip(
        &mut self,
        run_id: i64,
        sink: &str,
        identifier: &str,
        reason: &str,
    ) -> SinkResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO skips (run_id, sink, identifier, reason, skipped_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, sink, identifier, reason, now],
        )?;
        Ok(())
    }

    fn get_skips(&self, run_id: i64) -> SinkResult<Vec<SkipRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, sink, identifier, reason, skipped_at
             FROM skips WHERE run_id = ?1 ORDER BY id",
        )?;

        let skips = stmt
            .query_map(params![run_id], |row| {
                Ok(SkipRow {
                    run_id: row.get(0)?,
                    sink: row.get(1)?,
                    identifier: row.get(2)?,
                    reason: row.get(3)?,
                    skipped_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(skips)
    }

    // ===== Statistics =====

    fn sink_names(&self) -> SinkResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT sink FROM records ORDER BY sink")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn count_records(&self, sink: &str) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE sink = ?1",
            params![sink],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_identifiers(&self, sink: &str) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT identifier) FROM records WHERE sink = ?1",
            params![sink],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
