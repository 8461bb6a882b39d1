//! Single-image preview cache.
//!
//! The same ledger contract as HLS at thumbnail scale: one artifact file per
//! fingerprint, regenerated when the fingerprint or the requested `animated`
//! flag disagrees with the stored row. The artifact is small, but a
//! concurrent reader must never see a half-written image, so writes still go
//! tmp-then-rename and concurrent misses coalesce like segments do.

use std::path::PathBuf;

use tc_av::{Resolved, ThumbnailSpec};
use tc_core::ArtifactKind;

use crate::cache::file_nonempty;
use crate::context::AppContext;
use crate::hls::coalesce;

/// Preview output width in pixels; height follows the aspect ratio.
const PREVIEW_WIDTH: u32 = 480;

/// Ensure the preview artifact for `virtual_path` exists, returning its
/// path and whether it is animated.
pub async fn ensure_preview(
    ctx: &AppContext,
    virtual_path: &str,
    animated: bool,
    password: Option<&str>,
) -> tc_core::Result<(PathBuf, bool)> {
    let resolved = ctx.resolver.resolve(virtual_path).await?;
    let identity = ctx.cache.fingerprint(
        virtual_path,
        ArtifactKind::Thumbnail,
        resolved.fingerprint_path(),
    )?;
    let decision = ctx.cache.lookup_preview(&identity, animated)?;
    let path = ctx.cache.preview_path(decision.artifact_id);

    if !decision.regenerate {
        return Ok((path, animated));
    }

    // Readiness is the ledger's call, not mere file presence: a leftover
    // file whose row was never completed still needs a re-encode.
    let ready = || {
        ctx.cache
            .lookup_preview(&identity, animated)
            .ok()
            .filter(|d| !d.regenerate)
            .map(|d| ctx.cache.preview_path(d.artifact_id))
    };

    let generated = coalesce(
        &ctx.inflight,
        &path,
        ready,
        || async {
            let input = match &resolved {
                Resolved::Direct { path } => path.clone(),
                Resolved::Archive { archive, entry } => {
                    // Extract next to the preview, then discard: previews do
                    // not keep source copies around.
                    let scratch = path.with_extension("src");
                    let extracted = ctx
                        .resolver
                        .extract(archive, entry, &scratch, password)
                        .await;
                    match extracted {
                        Ok(p) => p,
                        Err(e) => {
                            let _ = std::fs::remove_dir_all(&scratch);
                            return Err(e);
                        }
                    }
                }
            };

            let tmp = path.with_extension("img.tmp");
            let result = ctx
                .encoder
                .encode_thumbnail(&ThumbnailSpec {
                    input: input.clone(),
                    start: 0.0,
                    animated,
                    width: PREVIEW_WIDTH,
                    output: tmp.clone(),
                })
                .await;

            if matches!(resolved, Resolved::Archive { .. }) {
                let _ = std::fs::remove_dir_all(path.with_extension("src"));
            }

            if let Err(e) = result {
                let _ = std::fs::remove_file(&tmp);
                return Err(e);
            }
            if !file_nonempty(&tmp) {
                let _ = std::fs::remove_file(&tmp);
                return Err(tc_core::Error::encoder(
                    "thumbnail",
                    format!("{virtual_path}: encoder produced no output"),
                ));
            }

            std::fs::rename(&tmp, &path)?;
            ctx.cache
                .record(&identity, decision.artifact_id, true, Some(animated))?;

            tracing::debug!(virtual_path, animated, "Preview generated");
            ctx.events
                .broadcast(tc_core::events::EventPayload::PreviewGenerated {
                    virtual_path: virtual_path.to_string(),
                    animated,
                });
            Ok(path.clone())
        },
    )
    .await?;

    Ok((generated, animated))
}

/// MIME type of a preview artifact.
pub fn preview_content_type(animated: bool) -> &'static str {
    if animated {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
