//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use tc_core::{Error, Result};

/// V1: the cache ledger.
///
/// One row per `(file_name, kind)` natural key. `modified_ms` and
/// `size_bytes` are the freshness half of the fingerprint; a mismatch on
/// lookup means the source changed and the row must be replaced. The old
/// artifact is orphaned on disk when that happens — there is no sweeper.
const V1_LEDGER: &str = r#"
CREATE TABLE cache_entries (
    file_name   TEXT    NOT NULL,
    kind        TEXT    NOT NULL,
    modified_ms INTEGER NOT NULL,
    size_bytes  INTEGER NOT NULL,
    artifact_id TEXT    NOT NULL UNIQUE,
    completed   INTEGER NOT NULL DEFAULT 0,
    animated    INTEGER,
    created_at  TEXT    NOT NULL,
    PRIMARY KEY (file_name, kind)
);

CREATE INDEX idx_cache_entries_artifact ON cache_entries(artifact_id);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_LEDGER)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn ledger_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO cache_entries
             (file_name, kind, modified_ms, size_bytes, artifact_id, completed, created_at)
             VALUES ('a.mkv', 'hls', 1, 2, 'x', 0, datetime('now'))",
            [],
        )
        .unwrap();
    }

    #[test]
    fn natural_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO cache_entries
             (file_name, kind, modified_ms, size_bytes, artifact_id, completed, created_at)
             VALUES ('a.mkv', 'hls', 1, 2, 'x', 0, datetime('now'))",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO cache_entries
             (file_name, kind, modified_ms, size_bytes, artifact_id, completed, created_at)
             VALUES ('a.mkv', 'hls', 3, 4, 'y', 0, datetime('now'))",
            [],
        );
        assert!(dup.is_err());
    }
}
