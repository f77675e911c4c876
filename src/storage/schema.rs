//! Database schema definitions for the checkpoint store

/// SQL schema for the checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- Crawl identity and lifecycle (fingerprint, status, timestamps, query label)
CREATE TABLE IF NOT EXISTS checkpoint_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Partition list in draining order
CREATE TABLE IF NOT EXISTS windows (
    position INTEGER PRIMARY KEY,
    start_at TEXT,
    end_at TEXT,
    estimated_count INTEGER,
    possibly_truncated INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_windows_status ON windows(status);

-- Every record id forwarded to the records file
CREATE TABLE IF NOT EXISTS seen_records (
    id TEXT PRIMARY KEY,
    emitted_at TEXT NOT NULL
);
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
