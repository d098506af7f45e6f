//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    resource TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Harvested rows for every sink; payload is JSON text, NULL for markers
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sink TEXT NOT NULL,
    identifier TEXT NOT NULL,
    item_id TEXT,
    payload TEXT,
    written_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_sink_identifier ON records(sink, identifier);

-- Child items skipped without aborting the run
CREATE TABLE IF NOT EXISTS skips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    sink TEXT NOT NULL,
    identifier TEXT NOT NULL,
    reason TEXT NOT NULL,
    skipped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_skips_run ON skips(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
