//! VOD playback routes: master playlist, child playlists, and segments.
//!
//! One wildcard route carries all of them because the virtual path may
//! itself contain slashes (including archive-internal paths); the trailing
//! component decides what is being asked for.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use tc_media::{ChildPlaylist, SegmentKey};

use crate::context::AppContext;
use crate::error::AppError;
use crate::hls::{manifest, segment};
use crate::routes::{serve_file, split_tail};

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
/// Playlists may be replaced when a source changes; segments are content-
/// addressed by artifact id and never change once written.
const PLAYLIST_CACHE: &str = "max-age=60";
const SEGMENT_CACHE: &str = "max-age=31536000, immutable";

#[derive(Debug, Deserialize)]
pub struct PlayParams {
    /// Archive password, forwarded to the extractor.
    pub password: Option<String>,
}

/// GET /play/{*tail}
pub async fn play(
    State(ctx): State<AppContext>,
    Path(tail): Path<String>,
    Query(params): Query<PlayParams>,
) -> Result<Response, AppError> {
    let (virtual_path, artifact_name) = split_tail(&tail)?;
    let password = params.password.as_deref();

    if artifact_name == "index.m3u8" {
        let (_, dir) = manifest::ensure_hls(&ctx, virtual_path, password).await?;
        return Ok(serve_file(&dir.join("index.m3u8"), PLAYLIST_CONTENT_TYPE, PLAYLIST_CACHE).await?);
    }

    if ChildPlaylist::parse(artifact_name).is_some() {
        let (_, dir) = manifest::ensure_hls(&ctx, virtual_path, password).await?;
        // Child playlists were synthesized with the master; a name the
        // build never produced 404s here.
        return Ok(serve_file(&dir.join(artifact_name), PLAYLIST_CONTENT_TYPE, PLAYLIST_CACHE).await?);
    }

    if let Some(key) = SegmentKey::parse(artifact_name) {
        let (artifact_id, dir) = manifest::ensure_hls(&ctx, virtual_path, password).await?;
        let path = segment::ensure_segment(&ctx, artifact_id, &dir, &key, password).await?;
        return Ok(serve_file(&path, key.content_type(), SEGMENT_CACHE).await?);
    }

    Err(tc_core::Error::not_found("artifact", artifact_name).into())
}
