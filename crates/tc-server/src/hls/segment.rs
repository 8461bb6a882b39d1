//! The per-segment lazy-producer state machine.
//!
//! Lifecycle per segment key: Absent → Generating (`.tmp` on disk) → Ready
//! (final file, non-zero size). Within this process, concurrent requests for
//! the same key coalesce on a shared notify so the encoder runs once. A
//! `.tmp` left by another process (or a crash) is handled by the bounded
//! poll loop: wait for the final file, give up with `Unready` when the
//! attempt budget runs out — never retry forever.
//!
//! After any successful generation the expected-vs-present count for that
//! key's child playlist is re-taken; a full match flips the ledger row to
//! completed and reclaims the extracted archive copy. That flip is the
//! single authoritative "fully cached" signal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tc_av::{SegmentSpec, SegmentStream};
use tc_core::ArtifactId;
use tc_media::{index_width, segment_count, segment_duration, SegmentKey};

use crate::cache::file_nonempty;
use crate::context::AppContext;
use crate::hls::{coalesce, ArtifactManifest};

/// Ensure the segment for `key` exists in `dir`, returning its path.
pub async fn ensure_segment(
    ctx: &AppContext,
    artifact_id: ArtifactId,
    dir: &Path,
    key: &SegmentKey,
    password: Option<&str>,
) -> tc_core::Result<PathBuf> {
    let manifest = ArtifactManifest::load(dir)?;
    validate_key(&manifest, key)?;

    let count = segment_count(manifest.profile.duration_seconds, manifest.segment_seconds);
    if key.index() >= count {
        return Err(tc_core::Error::not_found("segment", key));
    }

    let pad = index_width(count);
    let final_path = dir.join(key.file_name(pad));
    if file_nonempty(&final_path) {
        return Ok(final_path);
    }

    coalesce(
        &ctx.inflight,
        &final_path,
        || file_nonempty(&final_path).then(|| final_path.clone()),
        || generate(ctx, artifact_id, dir, &manifest, key, &final_path, password),
    )
    .await
}

/// Reject keys the playlists never referenced: unknown renditions, wrong
/// mux layout for the source's audio count, out-of-range track indexes.
fn validate_key(manifest: &ArtifactManifest, key: &SegmentKey) -> tc_core::Result<()> {
    let multi_audio = manifest.profile.multi_audio();
    let ok = match key {
        SegmentKey::Combined { rendition, .. } => {
            !multi_audio && manifest.plan.iter().any(|r| &r.name == rendition)
        }
        SegmentKey::Video { rendition, .. } => {
            multi_audio && manifest.plan.iter().any(|r| &r.name == rendition)
        }
        SegmentKey::Audio { track, .. } => {
            (multi_audio || manifest.plan.is_empty()) && *track < manifest.profile.audio.len()
        }
        SegmentKey::Subtitle { track, .. } => *track < manifest.profile.subtitles.len(),
    };

    if ok {
        Ok(())
    } else {
        Err(tc_core::Error::not_found("segment", key))
    }
}

/// One generation attempt, running as the coalesced worker.
async fn generate(
    ctx: &AppContext,
    artifact_id: ArtifactId,
    dir: &Path,
    manifest: &ArtifactManifest,
    key: &SegmentKey,
    final_path: &Path,
    password: Option<&str>,
) -> tc_core::Result<PathBuf> {
    let tmp_path = tmp_sibling(final_path);

    // A `.tmp` we did not create means another writer may be active —
    // possibly in another process, so the in-process notify cannot cover it.
    if tmp_path.exists() {
        return wait_for_ready(ctx, final_path, key).await;
    }

    let input = local_source(ctx, dir, manifest, password).await?;
    let spec = segment_spec(manifest, key, &input, tmp_path.clone())?;

    if let Err(e) = ctx.encoder.encode_segment(&spec).await {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(annotate(e, manifest, key));
    }

    if !file_nonempty(&tmp_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(tc_core::Error::encoder(
            key.to_string(),
            format!("{}: encoder produced no output", manifest.virtual_path),
        ));
    }

    std::fs::rename(&tmp_path, final_path)?;
    tracing::debug!(
        segment = %key,
        artifact_id = %artifact_id,
        "Segment generated"
    );
    ctx.events
        .broadcast(tc_core::events::EventPayload::SegmentGenerated {
            artifact_id,
            segment: key.to_string(),
        });

    check_completion(ctx, artifact_id, dir, manifest, key);

    Ok(final_path.to_path_buf())
}

/// Poll for a segment another writer owns, within the configured budget.
async fn wait_for_ready(
    ctx: &AppContext,
    final_path: &Path,
    key: &SegmentKey,
) -> tc_core::Result<PathBuf> {
    let attempts = ctx.config.transcode.segment_wait_attempts.max(1);
    let interval = Duration::from_secs(ctx.config.transcode.segment_wait_secs);

    for _ in 0..attempts {
        tokio::time::sleep(interval).await;
        if file_nonempty(final_path) {
            return Ok(final_path.to_path_buf());
        }
    }

    Err(tc_core::Error::Unready(format!(
        "{key} is still generating; retry later"
    )))
}

/// Locate the local media bytes, re-extracting the archive entry if the
/// copy was reclaimed after a completed child playlist.
async fn local_source(
    ctx: &AppContext,
    dir: &Path,
    manifest: &ArtifactManifest,
    password: Option<&str>,
) -> tc_core::Result<PathBuf> {
    let local = manifest.local_source(dir);
    if local.is_file() {
        return Ok(local);
    }

    match &manifest.archive_entry {
        Some(entry) => {
            ctx.resolver
                .extract(&manifest.source_path, entry, &dir.join("source"), password)
                .await
        }
        None => Err(tc_core::Error::not_found(
            "source",
            manifest.source_path.display(),
        )),
    }
}

/// Build the encode job for one segment key.
fn segment_spec(
    manifest: &ArtifactManifest,
    key: &SegmentKey,
    input: &Path,
    output: PathBuf,
) -> tc_core::Result<SegmentSpec> {
    let target = manifest.segment_seconds;
    let start = key.index() as f64 * target;
    let duration = segment_duration(key.index(), manifest.profile.duration_seconds, target);

    let (stream, dims) = match key {
        SegmentKey::Combined { rendition, .. } => {
            (SegmentStream::Combined, rendition_dims(manifest, rendition)?)
        }
        SegmentKey::Video { rendition, .. } => {
            (SegmentStream::VideoOnly, rendition_dims(manifest, rendition)?)
        }
        SegmentKey::Audio { track, .. } => (SegmentStream::AudioTrack(*track), (0, 0)),
        SegmentKey::Subtitle { track, .. } => (SegmentStream::SubtitleTrack(*track), (0, 0)),
    };

    Ok(SegmentSpec {
        input: input.to_path_buf(),
        start,
        duration,
        stream,
        width: dims.0,
        height: dims.1,
        output,
    })
}

fn rendition_dims(manifest: &ArtifactManifest, name: &str) -> tc_core::Result<(u32, u32)> {
    manifest
        .plan
        .iter()
        .find(|r| r.name == name)
        .map(|r| (r.width, r.height))
        .ok_or_else(|| tc_core::Error::not_found("rendition", name))
}

/// Re-count expected vs present files for this key's child playlist; a full
/// match marks the ledger completed and reclaims the extracted copy.
fn check_completion(
    ctx: &AppContext,
    artifact_id: ArtifactId,
    dir: &Path,
    manifest: &ArtifactManifest,
    key: &SegmentKey,
) {
    let count = segment_count(manifest.profile.duration_seconds, manifest.segment_seconds);
    let pad = index_width(count);

    let all_present = (0..count).all(|index| {
        let sibling = with_index(key, index);
        file_nonempty(&dir.join(sibling.file_name(pad)))
    });
    if !all_present {
        return;
    }

    match ctx.cache.mark_completed(artifact_id) {
        Ok(_) => {
            tracing::info!(
                artifact_id = %artifact_id,
                virtual_path = %manifest.virtual_path,
                "Artifact fully cached"
            );
            ctx.events
                .broadcast(tc_core::events::EventPayload::ArtifactCompleted {
                    artifact_id,
                    virtual_path: manifest.virtual_path.clone(),
                });
        }
        Err(e) => {
            tracing::warn!(artifact_id = %artifact_id, "Failed to mark completion: {e}");
            return;
        }
    }

    if manifest.archive_entry.is_some() {
        let source_dir = dir.join("source");
        if let Err(e) = std::fs::remove_dir_all(&source_dir) {
            if source_dir.exists() {
                tracing::warn!("Failed to reclaim extracted copy: {e}");
            }
        }
    }
}

/// The same track at a different sequence index.
fn with_index(key: &SegmentKey, index: u64) -> SegmentKey {
    match key {
        SegmentKey::Combined { rendition, .. } => SegmentKey::Combined {
            rendition: rendition.clone(),
            index,
        },
        SegmentKey::Video { rendition, .. } => SegmentKey::Video {
            rendition: rendition.clone(),
            index,
        },
        SegmentKey::Audio { track, .. } => SegmentKey::Audio {
            track: *track,
            index,
        },
        SegmentKey::Subtitle { track, .. } => SegmentKey::Subtitle {
            track: *track,
            index,
        },
    }
}

fn tmp_sibling(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".tmp");
    final_path.with_file_name(name)
}

fn annotate(e: tc_core::Error, manifest: &ArtifactManifest, key: &SegmentKey) -> tc_core::Error {
    match e {
        tc_core::Error::Encoder { message, .. } => tc_core::Error::encoder(
            key.to_string(),
            format!("{}: {message}", manifest.virtual_path),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::{AudioTrack, MediaProfile, VideoTrack};
    use tc_media::Rendition;

    fn manifest(audio: usize) -> ArtifactManifest {
        ArtifactManifest {
            virtual_path: "a.mkv".into(),
            source_path: "/media/a.mkv".into(),
            archive_entry: None,
            profile: MediaProfile {
                duration_seconds: 13.2,
                video: vec![VideoTrack {
                    width: 1280,
                    height: 720,
                    frame_rate: Some(24.0),
                    color_transfer: None,
                    language: None,
                }],
                audio: (0..audio)
                    .map(|n| AudioTrack {
                        codec: Some("aac".into()),
                        language: None,
                        default: n == 0,
                    })
                    .collect(),
                subtitles: vec![],
            },
            plan: vec![Rendition {
                name: "720p".into(),
                width: 1280,
                height: 720,
            }],
            segment_seconds: 6.0,
        }
    }

    #[test]
    fn validate_rejects_wrong_layout() {
        let single = manifest(1);
        let multi = manifest(2);

        let combined = SegmentKey::Combined {
            rendition: "720p".into(),
            index: 0,
        };
        assert!(validate_key(&single, &combined).is_ok());
        assert!(validate_key(&multi, &combined).is_err());

        let video = SegmentKey::Video {
            rendition: "720p".into(),
            index: 0,
        };
        assert!(validate_key(&single, &video).is_err());
        assert!(validate_key(&multi, &video).is_ok());

        let audio = SegmentKey::Audio { track: 1, index: 0 };
        assert!(validate_key(&multi, &audio).is_ok());
        assert!(validate_key(&single, &audio).is_err());

        let unknown = SegmentKey::Combined {
            rendition: "480p".into(),
            index: 0,
        };
        assert!(validate_key(&single, &unknown).is_err());
    }

    #[test]
    fn spec_covers_tail_segment() {
        let m = manifest(1);
        let key = SegmentKey::Combined {
            rendition: "720p".into(),
            index: 2,
        };
        let spec = segment_spec(&m, &key, Path::new("/media/a.mkv"), "/t/x.tmp".into()).unwrap();
        assert!((spec.start - 12.0).abs() < 1e-9);
        assert!((spec.duration - 1.2).abs() < 1e-9);
        assert_eq!(spec.stream, SegmentStream::Combined);
        assert_eq!((spec.width, spec.height), (1280, 720));
    }

    #[test]
    fn audio_spec_carries_track() {
        let m = manifest(2);
        let key = SegmentKey::Audio { track: 1, index: 0 };
        let spec = segment_spec(&m, &key, Path::new("/media/a.mkv"), "/t/x.tmp".into()).unwrap();
        assert_eq!(spec.stream, SegmentStream::AudioTrack(1));
    }

    #[test]
    fn tmp_sibling_appends_suffix() {
        assert_eq!(
            tmp_sibling(Path::new("/x/segment_720p_0.ts")),
            PathBuf::from("/x/segment_720p_0.ts.tmp")
        );
    }

    #[test]
    fn with_index_preserves_track() {
        let key = SegmentKey::Audio { track: 3, index: 9 };
        assert_eq!(with_index(&key, 0), SegmentKey::Audio { track: 3, index: 0 });
    }
}
