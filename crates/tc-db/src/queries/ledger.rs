//! Cache ledger operations.
//!
//! The ledger is keyed by the `(file_name, kind)` natural key. Upserting a
//! row for a key that already exists replaces it wholesale — the previous
//! artifact id is simply forgotten, leaving its files orphaned on disk.

use chrono::Utc;
use rusqlite::Connection;
use tc_core::{ArtifactId, ArtifactKind, Error, Result};

use crate::models::CacheRow;

const COLS: &str =
    "file_name, kind, modified_ms, size_bytes, artifact_id, completed, animated, created_at";

/// Fetch the ledger row for a natural key, if any.
pub fn get(conn: &Connection, file_name: &str, kind: ArtifactKind) -> Result<Option<CacheRow>> {
    let q = format!("SELECT {COLS} FROM cache_entries WHERE file_name = ?1 AND kind = ?2");
    let result = conn.query_row(&q, rusqlite::params![file_name, kind.as_str()], CacheRow::from_row);
    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert or replace the ledger row for a natural key.
pub fn upsert(
    conn: &Connection,
    file_name: &str,
    kind: ArtifactKind,
    modified_ms: i64,
    size_bytes: i64,
    artifact_id: ArtifactId,
    completed: bool,
    animated: Option<bool>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cache_entries
         (file_name, kind, modified_ms, size_bytes, artifact_id, completed, animated, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(file_name, kind)
         DO UPDATE SET modified_ms = excluded.modified_ms,
                       size_bytes  = excluded.size_bytes,
                       artifact_id = excluded.artifact_id,
                       completed   = excluded.completed,
                       animated    = excluded.animated,
                       created_at  = excluded.created_at",
        rusqlite::params![
            file_name,
            kind.as_str(),
            modified_ms,
            size_bytes,
            artifact_id.to_string(),
            completed,
            animated,
            now,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Mark an artifact as fully generated.
///
/// This is the single authoritative "fully cached" signal: it is only set
/// after the segment generator has re-counted expected vs present files.
pub fn mark_completed(conn: &Connection, artifact_id: ArtifactId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE cache_entries SET completed = 1 WHERE artifact_id = ?1",
            [artifact_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete the ledger row for a natural key.
pub fn delete(conn: &Connection, file_name: &str, kind: ArtifactKind) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM cache_entries WHERE file_name = ?1 AND kind = ?2",
            rusqlite::params![file_name, kind.as_str()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    fn conn() -> crate::pool::PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    #[test]
    fn upsert_and_get() {
        let conn = conn();
        let id = ArtifactId::new();
        upsert(&conn, "movies/a.mkv", ArtifactKind::Hls, 1000, 42, id, false, None).unwrap();

        let row = get(&conn, "movies/a.mkv", ArtifactKind::Hls).unwrap().unwrap();
        assert_eq!(row.artifact_id, id);
        assert_eq!(row.modified_ms, 1000);
        assert_eq!(row.size_bytes, 42);
        assert!(!row.completed);
        assert!(row.animated.is_none());
    }

    #[test]
    fn missing_key_returns_none() {
        let conn = conn();
        assert!(get(&conn, "nope.mkv", ArtifactKind::Hls).unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_row() {
        let conn = conn();
        let first = ArtifactId::new();
        let second = ArtifactId::new();
        upsert(&conn, "a.mkv", ArtifactKind::Hls, 1, 1, first, true, None).unwrap();
        upsert(&conn, "a.mkv", ArtifactKind::Hls, 2, 2, second, false, None).unwrap();

        let row = get(&conn, "a.mkv", ArtifactKind::Hls).unwrap().unwrap();
        assert_eq!(row.artifact_id, second);
        assert_eq!(row.modified_ms, 2);
        assert!(!row.completed);
    }

    #[test]
    fn kinds_do_not_collide() {
        let conn = conn();
        let hls = ArtifactId::new();
        let thumb = ArtifactId::new();
        upsert(&conn, "a.mkv", ArtifactKind::Hls, 1, 1, hls, false, None).unwrap();
        upsert(&conn, "a.mkv", ArtifactKind::Thumbnail, 1, 1, thumb, true, Some(false)).unwrap();

        let h = get(&conn, "a.mkv", ArtifactKind::Hls).unwrap().unwrap();
        let t = get(&conn, "a.mkv", ArtifactKind::Thumbnail).unwrap().unwrap();
        assert_eq!(h.artifact_id, hls);
        assert_eq!(t.artifact_id, thumb);
        assert_eq!(t.animated, Some(false));
    }

    #[test]
    fn mark_completed_sets_flag() {
        let conn = conn();
        let id = ArtifactId::new();
        upsert(&conn, "a.mkv", ArtifactKind::Hls, 1, 1, id, false, None).unwrap();

        assert!(mark_completed(&conn, id).unwrap());
        let row = get(&conn, "a.mkv", ArtifactKind::Hls).unwrap().unwrap();
        assert!(row.completed);

        assert!(!mark_completed(&conn, ArtifactId::new()).unwrap());
    }

    #[test]
    fn delete_row() {
        let conn = conn();
        let id = ArtifactId::new();
        upsert(&conn, "a.mkv", ArtifactKind::Thumbnail, 1, 1, id, true, Some(true)).unwrap();
        assert!(delete(&conn, "a.mkv", ArtifactKind::Thumbnail).unwrap());
        assert!(get(&conn, "a.mkv", ArtifactKind::Thumbnail).unwrap().is_none());
    }
}
