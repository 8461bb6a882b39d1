//! The coarse manifest state machine.
//!
//! A usable master playlist on disk means the whole playlist set is Ready
//! and served as-is — no recomputation, no second probe. Otherwise the
//! source is resolved (extracting archive entries on demand), probed once,
//! and *all* playlists are synthesized eagerly; only segments stay lazy.

use std::path::{Path, PathBuf};

use tc_av::Resolved;
use tc_core::{ArtifactId, ArtifactKind, SourceIdentity};
use tc_media::{
    audio_playlist, master_playlist, subtitle_playlist, video_playlist, ChildPlaylist,
};

use crate::cache::file_nonempty;
use crate::context::AppContext;
use crate::hls::{coalesce, ArtifactManifest};

/// Ensure the HLS artifact for `virtual_path` has its playlist set on disk,
/// returning the artifact id and directory.
///
/// Concurrent first requests coalesce on the master playlist path, so the
/// prober runs once per artifact.
pub async fn ensure_hls(
    ctx: &AppContext,
    virtual_path: &str,
    password: Option<&str>,
) -> tc_core::Result<(ArtifactId, PathBuf)> {
    let resolved = ctx.resolver.resolve(virtual_path).await?;
    let identity =
        ctx.cache
            .fingerprint(virtual_path, ArtifactKind::Hls, resolved.fingerprint_path())?;
    let decision = ctx.cache.lookup_hls(&identity)?;
    let dir = ctx.cache.hls_dir(decision.artifact_id);

    if !decision.regenerate {
        return Ok((decision.artifact_id, dir));
    }

    let master = dir.join("index.m3u8");
    let dir_ready = coalesce(
        &ctx.inflight,
        &master,
        || file_nonempty(&master).then(|| dir.clone()),
        || {
            build_artifact(
                ctx,
                &resolved,
                &identity,
                decision.artifact_id,
                &dir,
                virtual_path,
                password,
            )
        },
    )
    .await?;

    Ok((decision.artifact_id, dir_ready))
}

/// Resolve, probe, and write the full playlist set plus the sidecar.
async fn build_artifact(
    ctx: &AppContext,
    resolved: &Resolved,
    identity: &SourceIdentity,
    artifact_id: ArtifactId,
    dir: &Path,
    virtual_path: &str,
    password: Option<&str>,
) -> tc_core::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let (source_path, archive_entry, local) = match resolved {
        Resolved::Direct { path } => (path.clone(), None, path.clone()),
        Resolved::Archive { archive, entry } => {
            let extracted = ctx
                .resolver
                .extract(archive, entry, &dir.join("source"), password)
                .await?;
            (archive.clone(), Some(entry.clone()), extracted)
        }
    };

    let profile = ctx.prober.probe(&local).await?;
    if profile.video.is_empty() && profile.audio.is_empty() {
        return Err(tc_core::Error::Probe(format!(
            "no playable streams in {virtual_path}"
        )));
    }

    let plan = profile
        .primary_video()
        .map(|v| tc_media::plan_renditions(v.width, v.height))
        .unwrap_or_default();

    let manifest = ArtifactManifest {
        virtual_path: virtual_path.to_string(),
        source_path,
        archive_entry,
        profile,
        plan,
        segment_seconds: ctx.segment_seconds(),
    };

    manifest.save(dir)?;
    write_playlists(dir, &manifest)?;
    ctx.cache.record(identity, artifact_id, false, None)?;

    tracing::info!(
        virtual_path,
        artifact_id = %artifact_id,
        renditions = manifest.plan.len(),
        duration = manifest.profile.duration_seconds,
        "HLS artifact synthesized"
    );
    ctx.events
        .broadcast(tc_core::events::EventPayload::ManifestSynthesized {
            artifact_id,
            virtual_path: virtual_path.to_string(),
            renditions: manifest.plan.len(),
        });

    Ok(dir.to_path_buf())
}

/// Write every child playlist, then the master.
///
/// The master's presence is the artifact's Ready signal, so it must land
/// after everything it references.
pub fn write_playlists(dir: &Path, m: &ArtifactManifest) -> tc_core::Result<()> {
    let duration = m.profile.duration_seconds;
    let target = m.segment_seconds;
    let multi_audio = m.profile.multi_audio();

    for rendition in &m.plan {
        let name = ChildPlaylist::Video {
            rendition: rendition.name.clone(),
        }
        .file_name();
        std::fs::write(
            dir.join(name),
            video_playlist(&rendition.name, duration, target, multi_audio),
        )?;
    }

    if multi_audio || m.plan.is_empty() {
        for track in 0..m.profile.audio.len() {
            let name = ChildPlaylist::Audio { track }.file_name();
            std::fs::write(dir.join(name), audio_playlist(track, duration, target))?;
        }
    }

    for track in 0..m.profile.subtitles.len() {
        let name = ChildPlaylist::Subtitle { track }.file_name();
        std::fs::write(dir.join(name), subtitle_playlist(track, duration, target))?;
    }

    std::fs::write(dir.join("index.m3u8"), master_playlist(&m.profile, &m.plan))?;

    Ok(())
}
