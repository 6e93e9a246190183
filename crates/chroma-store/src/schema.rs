use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // In-memory and fresh databases legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS epochs (
            id      INTEGER PRIMARY KEY,
            dropped INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS novel_colors (
            epoch_id INTEGER NOT NULL REFERENCES epochs(id),
            color    INTEGER NOT NULL,
            PRIMARY KEY (epoch_id, color)
        );

        CREATE TABLE IF NOT EXISTS population (
            color  INTEGER PRIMARY KEY,
            weight INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS solutions (
            epoch_id     INTEGER NOT NULL REFERENCES epochs(id),
            k            INTEGER NOT NULL,
            centroids    TEXT NOT NULL,
            counts       TEXT NOT NULL,
            total_colors INTEGER NOT NULL,
            PRIMARY KEY (epoch_id, k)
        );

        CREATE TABLE IF NOT EXISTS warm_start (
            k   INTEGER NOT NULL,
            idx INTEGER NOT NULL,
            c0  REAL NOT NULL,
            c1  REAL NOT NULL,
            c2  REAL NOT NULL,
            PRIMARY KEY (k, idx)
        );

        CREATE INDEX IF NOT EXISTS idx_novel_color ON novel_colors(color);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
