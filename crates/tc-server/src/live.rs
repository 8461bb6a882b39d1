//! Live session management.
//!
//! The alternate, non-cached path: one long-lived encoder per connection,
//! writing a rolling playlist into a private scratch directory. Nothing is
//! shared between sessions and nothing survives the connection — teardown
//! kills the process and deletes the scratch directory synchronously, so a
//! closed session leaves no trace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tc_av::{LiveHandle, LiveSpec, Resolved};
use tc_core::LiveSessionId;
use tokio::sync::Mutex;

use crate::context::AppContext;

/// One active live transcoding session.
pub struct LiveSession {
    pub id: LiveSessionId,
    /// Private scratch directory holding the rolling playlist and segments.
    pub scratch: PathBuf,
    /// Local media path the encoder reads from.
    pub input: PathBuf,
    /// Output dimensions; zero for audio-only sources.
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    /// The running encoder; seek swaps the process under this lock.
    pub handle: Mutex<LiveHandle>,
}

/// Session metadata reported back over the live channel.
#[derive(Debug, Clone)]
pub struct LiveStart {
    pub id: LiveSessionId,
    pub src_url: String,
    pub duration: f64,
    pub audio_tracks: Vec<String>,
    pub subtitle_tracks: Vec<String>,
    pub video_renditions: Vec<String>,
}

fn track_label(language: Option<&str>, fallback: &str, n: usize) -> String {
    language
        .map(str::to_string)
        .unwrap_or_else(|| format!("{fallback} {}", n + 1))
}

/// Start a live session for `url_path`: resolve, probe, pick an output
/// size, spawn the encoder, and register the session.
pub async fn start_session(
    ctx: &AppContext,
    url_path: &str,
    password: Option<&str>,
) -> tc_core::Result<LiveStart> {
    let id = LiveSessionId::new();
    let scratch = ctx.cache.live_dir(id);
    tokio::fs::create_dir_all(&scratch).await?;

    let result = prepare_and_spawn(ctx, id, &scratch, url_path, password).await;
    if result.is_err() {
        let _ = std::fs::remove_dir_all(&scratch);
    }
    result
}

async fn prepare_and_spawn(
    ctx: &AppContext,
    id: LiveSessionId,
    scratch: &Path,
    url_path: &str,
    password: Option<&str>,
) -> tc_core::Result<LiveStart> {
    let resolved = ctx.resolver.resolve(url_path).await?;
    let input = match &resolved {
        Resolved::Direct { path } => path.clone(),
        Resolved::Archive { archive, entry } => {
            ctx.resolver
                .extract(archive, entry, &scratch.join("source"), password)
                .await?
        }
    };

    let profile = ctx.prober.probe(&input).await?;
    if profile.video.is_empty() && profile.audio.is_empty() {
        return Err(tc_core::Error::Probe(format!(
            "no playable streams in {url_path}"
        )));
    }

    let plan = profile
        .primary_video()
        .map(|v| tc_media::plan_renditions(v.width, v.height))
        .unwrap_or_default();

    // One process means one output size: the topmost ladder entry that
    // still transcodes in real time on modest hardware.
    let (width, height) = plan
        .iter()
        .rev()
        .find(|r| r.width.max(r.height) <= 720)
        .or_else(|| plan.first())
        .map(|r| (r.width, r.height))
        .unwrap_or((0, 0));

    let handle = ctx
        .encoder
        .start_live(&LiveSpec {
            input: input.clone(),
            start: 0.0,
            width,
            height,
            out_dir: scratch.to_path_buf(),
            segment_seconds: ctx.segment_seconds(),
        })
        .await?;

    let session = Arc::new(LiveSession {
        id,
        scratch: scratch.to_path_buf(),
        input,
        width,
        height,
        duration: profile.duration_seconds,
        handle: Mutex::new(handle),
    });
    ctx.sessions.insert(id, session);

    tracing::info!(
        session_id = %id,
        url_path,
        width,
        height,
        "Live session started"
    );
    ctx.events
        .broadcast(tc_core::events::EventPayload::LiveSessionStarted { session_id: id });

    Ok(LiveStart {
        id,
        src_url: format!("/live/{id}/index.m3u8"),
        duration: profile.duration_seconds,
        audio_tracks: profile
            .audio
            .iter()
            .enumerate()
            .map(|(n, t)| track_label(t.language.as_deref(), "Audio", n))
            .collect(),
        subtitle_tracks: profile
            .subtitles
            .iter()
            .enumerate()
            .map(|(n, t)| track_label(t.language.as_deref(), "Subtitle", n))
            .collect(),
        video_renditions: plan.iter().map(|r| r.name.clone()).collect(),
    })
}

/// Seek: kill the running encoder and restart it at `offset`, reusing the
/// scratch directory.
pub async fn seek_session(
    ctx: &AppContext,
    id: LiveSessionId,
    offset: f64,
) -> tc_core::Result<()> {
    let session = ctx
        .sessions
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| tc_core::Error::not_found("session", id))?;

    let offset = offset.clamp(0.0, session.duration.max(0.0));

    let mut handle = session.handle.lock().await;
    handle.kill().await;

    *handle = ctx
        .encoder
        .start_live(&LiveSpec {
            input: session.input.clone(),
            start: offset,
            width: session.width,
            height: session.height,
            out_dir: session.scratch.clone(),
            segment_seconds: ctx.segment_seconds(),
        })
        .await?;

    tracing::info!(session_id = %id, offset, "Live session seeked");
    ctx.events
        .broadcast(tc_core::events::EventPayload::LiveSessionSeeked {
            session_id: id,
            offset,
        });
    Ok(())
}

/// Tear a session down: kill the encoder and delete the scratch directory.
/// Both effects are observable as soon as this returns.
pub async fn stop_session(ctx: &AppContext, id: LiveSessionId) {
    let Some((_, session)) = ctx.sessions.remove(&id) else {
        return;
    };

    session.handle.lock().await.kill().await;

    if let Err(e) = std::fs::remove_dir_all(&session.scratch) {
        if session.scratch.exists() {
            tracing::warn!(session_id = %id, "Failed to remove scratch dir: {e}");
        }
    }

    tracing::info!(session_id = %id, "Live session stopped");
    ctx.events
        .broadcast(tc_core::events::EventPayload::LiveSessionStopped { session_id: id });
}

/// Tear down every active session (shutdown path).
pub async fn stop_all(ctx: &AppContext) {
    let ids: Vec<LiveSessionId> = ctx.sessions.iter().map(|e| *e.key()).collect();
    for id in ids {
        stop_session(ctx, id).await;
    }
}
