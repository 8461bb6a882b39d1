//! Route handlers and shared serving helpers.

pub mod live;
pub mod play;
pub mod preview;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use std::path::Path;
use tokio_util::io::ReaderStream;

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}

/// Serve a file from disk as a chunked stream.
///
/// Reads go through `ReaderStream` so memory stays bounded regardless of
/// segment size.
pub async fn serve_file(
    path: &Path,
    content_type: &str,
    cache_control: &'static str,
) -> tc_core::Result<Response> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|_| tc_core::Error::not_found("file", path.display()))?;
    let len = file
        .metadata()
        .await
        .map(|m| m.len())
        .map_err(|e| tc_core::Error::Internal(format!("stat failed: {e}")))?;

    let stream = ReaderStream::new(file);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len.to_string())
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from_stream(stream))
        .unwrap())
}

/// Split a `/play/{*tail}` wildcard into `(virtual_path, artifact_name)`.
///
/// The last component is the requested playlist or segment file; everything
/// before it is the virtual source path.
pub fn split_tail(tail: &str) -> tc_core::Result<(&str, &str)> {
    let tail = tail.trim_matches('/');
    tail.rsplit_once('/')
        .filter(|(path, name)| !path.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            tc_core::Error::Validation(format!("expected <path>/<artifact>, got: {tail}"))
        })
}
