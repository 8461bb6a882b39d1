//! The cache index: ledger rows combined with disk reality.
//!
//! A ledger row is never trusted blindly. `lookup_*` checks that the
//! fingerprint still matches the source and that the artifact actually
//! exists (and is non-empty) on disk before declaring a cache hit; anything
//! less forces regeneration. A changed fingerprint allocates a *new*
//! artifact id and the upsert replaces the old row — the previous artifact's
//! files are orphaned on disk (no sweeper exists).

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tc_core::{ArtifactId, ArtifactKind, Result, SourceIdentity};
use tc_db::queries::ledger;
use tc_db::DbPool;

/// Outcome of a ledger lookup.
#[derive(Debug, Clone, Copy)]
pub struct CacheDecision {
    /// The artifact to serve from or generate into.
    pub artifact_id: ArtifactId,
    /// Whether generation work is needed before the artifact can be trusted.
    pub regenerate: bool,
}

/// Owns the ledger handle and the cache-root layout.
pub struct CacheIndex {
    db: DbPool,
    cache_root: PathBuf,
}

impl CacheIndex {
    pub fn new(db: DbPool, cache_root: PathBuf) -> Self {
        Self { db, cache_root }
    }

    // -- paths ------------------------------------------------------------

    /// Directory holding one HLS artifact's playlists and segments.
    pub fn hls_dir(&self, id: ArtifactId) -> PathBuf {
        self.cache_root.join("hls").join(id.to_string())
    }

    /// File path of one preview artifact.
    pub fn preview_path(&self, id: ArtifactId) -> PathBuf {
        self.cache_root.join("previews").join(format!("{id}.img"))
    }

    /// Scratch directory for one live session.
    pub fn live_dir(&self, id: tc_core::LiveSessionId) -> PathBuf {
        self.cache_root.join("live").join(id.to_string())
    }

    // -- fingerprinting ---------------------------------------------------

    /// Build a source's content fingerprint from its on-disk metadata.
    ///
    /// For archive entries `fp_path` is the archive itself: touching the
    /// archive invalidates everything cached from inside it.
    pub fn fingerprint(
        &self,
        virtual_path: &str,
        kind: ArtifactKind,
        fp_path: &Path,
    ) -> Result<SourceIdentity> {
        let meta = std::fs::metadata(fp_path)?;
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(SourceIdentity {
            file_name: virtual_path.to_string(),
            kind,
            modified_ms,
            size_bytes: meta.len() as i64,
        })
    }

    // -- lookups ----------------------------------------------------------

    /// Decide whether an HLS artifact can be served as-is.
    ///
    /// The master playlist on disk is the artifact's health proxy; segments
    /// are lazy, so their absence does not force regeneration, but an
    /// incomplete row keeps `regenerate = true` so the generation pipeline
    /// re-enters (and eventually flips `completed`).
    pub fn lookup_hls(&self, identity: &SourceIdentity) -> Result<CacheDecision> {
        let conn = tc_db::get_conn(&self.db)?;
        let row = ledger::get(&conn, &identity.file_name, identity.kind)?;

        let Some(row) = row else {
            return Ok(CacheDecision {
                artifact_id: ArtifactId::new(),
                regenerate: true,
            });
        };

        if !identity.is_fresh(row.modified_ms, row.size_bytes) {
            // Source changed: the old artifact is dead weight from here on.
            return Ok(CacheDecision {
                artifact_id: ArtifactId::new(),
                regenerate: true,
            });
        }

        let master = self.hls_dir(row.artifact_id).join("index.m3u8");
        let usable = file_nonempty(&master);

        Ok(CacheDecision {
            artifact_id: row.artifact_id,
            regenerate: !usable || !row.completed,
        })
    }

    /// Decide whether a preview artifact can be served as-is.
    ///
    /// Beyond freshness and disk presence, the stored `animated` flag must
    /// agree with the request; a mismatch allocates a new artifact id.
    pub fn lookup_preview(
        &self,
        identity: &SourceIdentity,
        animated: bool,
    ) -> Result<CacheDecision> {
        let conn = tc_db::get_conn(&self.db)?;
        let row = ledger::get(&conn, &identity.file_name, identity.kind)?;

        let Some(row) = row else {
            return Ok(CacheDecision {
                artifact_id: ArtifactId::new(),
                regenerate: true,
            });
        };

        if !identity.is_fresh(row.modified_ms, row.size_bytes)
            || row.animated != Some(animated)
        {
            return Ok(CacheDecision {
                artifact_id: ArtifactId::new(),
                regenerate: true,
            });
        }

        let usable = row.completed && file_nonempty(&self.preview_path(row.artifact_id));

        Ok(CacheDecision {
            artifact_id: row.artifact_id,
            regenerate: !usable,
        })
    }

    // -- writes -----------------------------------------------------------

    /// Record (or replace) the ledger row for a fingerprint.
    pub fn record(
        &self,
        identity: &SourceIdentity,
        artifact_id: ArtifactId,
        completed: bool,
        animated: Option<bool>,
    ) -> Result<()> {
        let conn = tc_db::get_conn(&self.db)?;
        ledger::upsert(
            &conn,
            &identity.file_name,
            identity.kind,
            identity.modified_ms,
            identity.size_bytes,
            artifact_id,
            completed,
            animated,
        )
    }

    /// Flip an artifact's row to completed.
    pub fn mark_completed(&self, artifact_id: ArtifactId) -> Result<bool> {
        let conn = tc_db::get_conn(&self.db)?;
        ledger::mark_completed(&conn, artifact_id)
    }
}

/// A file that exists and has bytes in it.
pub fn file_nonempty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
