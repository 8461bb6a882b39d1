//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use tc_core::{ArtifactId, ArtifactKind};
use uuid::Uuid;

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

/// One ledger row: a source fingerprint bound to its cached artifact.
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub modified_ms: i64,
    pub size_bytes: i64,
    pub artifact_id: ArtifactId,
    pub completed: bool,
    /// Thumbnail artifacts only: whether the stored image is animated.
    pub animated: Option<bool>,
    pub created_at: String,
}

impl CacheRow {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let kind: String = row.get(1)?;
        let kind = kind.parse::<ArtifactKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        let animated: Option<i64> = row.get(6)?;
        Ok(Self {
            file_name: row.get(0)?,
            kind,
            modified_ms: row.get(2)?,
            size_bytes: row.get(3)?,
            artifact_id: parse_id(row, 4)?,
            completed: row.get::<_, i64>(5)? != 0,
            animated: animated.map(|v| v != 0),
            created_at: row.get(7)?,
        })
    }
}
