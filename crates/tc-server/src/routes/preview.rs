//! Preview route: cached single-image artifacts.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::preview::{ensure_preview, preview_content_type};
use crate::routes::serve_file;

const PREVIEW_CACHE: &str = "max-age=3600";

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    /// Request an animated preview instead of a still frame.
    #[serde(default)]
    pub animated: bool,
    /// Archive password, forwarded to the extractor.
    pub password: Option<String>,
}

/// GET /preview/{*tail} where the tail is `<virtual_path>.img`
pub async fn preview(
    State(ctx): State<AppContext>,
    Path(tail): Path<String>,
    Query(params): Query<PreviewParams>,
) -> Result<Response, AppError> {
    let tail = tail.trim_matches('/');
    let virtual_path = tail
        .strip_suffix(".img")
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            tc_core::Error::Validation(format!("expected <path>.img, got: {tail}"))
        })?;

    let (path, animated) = ensure_preview(
        &ctx,
        virtual_path,
        params.animated,
        params.password.as_deref(),
    )
    .await?;

    Ok(serve_file(&path, preview_content_type(animated), PREVIEW_CACHE).await?)
}
