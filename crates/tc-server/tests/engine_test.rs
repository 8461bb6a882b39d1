//! End-to-end engine tests: router + cache index + segment generator with
//! mock collaborators standing in for ffprobe/ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use dashmap::DashMap;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use tc_av::{
    Encoder, FsResolver, LiveHandle, LiveSpec, Prober, SegmentSpec, ThumbnailSpec,
};
use tc_core::config::Config;
use tc_core::{AudioTrack, MediaProfile, VideoTrack};
use tc_server::cache::CacheIndex;
use tc_server::context::AppContext;
use tc_server::{live, router};

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

struct MockProber {
    calls: AtomicUsize,
    profile: MediaProfile,
}

impl MockProber {
    fn new(profile: MediaProfile) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            profile,
        })
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, _path: &Path) -> tc_core::Result<MediaProfile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.profile.clone())
    }
}

struct MockEncoder {
    segment_calls: AtomicUsize,
    thumbnail_calls: AtomicUsize,
    segment_delay: Duration,
}

impl MockEncoder {
    fn new(segment_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            segment_calls: AtomicUsize::new(0),
            thumbnail_calls: AtomicUsize::new(0),
            segment_delay,
        })
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    async fn encode_segment(&self, spec: &SegmentSpec) -> tc_core::Result<()> {
        self.segment_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.segment_delay).await;
        std::fs::write(&spec.output, b"segment-bytes")?;
        Ok(())
    }

    async fn start_live(&self, _spec: &LiveSpec) -> tc_core::Result<LiveHandle> {
        let child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| tc_core::Error::encoder("live", e.to_string()))?;
        Ok(LiveHandle::new(child))
    }

    async fn encode_thumbnail(&self, spec: &ThumbnailSpec) -> tc_core::Result<()> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(&spec.output, b"image-bytes")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn hd_profile() -> MediaProfile {
    MediaProfile {
        duration_seconds: 13.2,
        video: vec![VideoTrack {
            width: 1280,
            height: 720,
            frame_rate: Some(24.0),
            color_transfer: None,
            language: None,
        }],
        audio: vec![AudioTrack {
            codec: Some("aac".into()),
            language: Some("eng".into()),
            default: true,
        }],
        subtitles: vec![],
    }
}

struct Harness {
    ctx: AppContext,
    prober: Arc<MockProber>,
    encoder: Arc<MockEncoder>,
    media_root: PathBuf,
    cache_root: PathBuf,
    _tmp: tempfile::TempDir,
}

fn harness(profile: MediaProfile, segment_delay: Duration) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let media_root = tmp.path().join("media");
    let cache_root = tmp.path().join("cache");
    for sub in ["hls", "previews", "live"] {
        std::fs::create_dir_all(cache_root.join(sub)).unwrap();
    }
    std::fs::create_dir_all(&media_root).unwrap();

    let mut config = Config::default();
    config.cache.media_root = media_root.clone();
    config.cache.cache_root = cache_root.clone();
    config.transcode.segment_wait_secs = 0;
    config.transcode.segment_wait_attempts = 2;

    let prober = MockProber::new(profile);
    let encoder = MockEncoder::new(segment_delay);

    let ctx = AppContext {
        cache: Arc::new(CacheIndex::new(
            tc_db::pool::init_memory_pool().unwrap(),
            cache_root.clone(),
        )),
        config: Arc::new(config),
        prober: prober.clone(),
        resolver: Arc::new(FsResolver::new(media_root.clone(), None)),
        encoder: encoder.clone(),
        events: Arc::new(tc_core::events::EventBus::default()),
        sessions: Arc::new(DashMap::new()),
        inflight: Arc::new(DashMap::new()),
    };

    Harness {
        ctx,
        prober,
        encoder,
        media_root,
        cache_root,
        _tmp: tmp,
    }
}

async fn get(h: &Harness, uri: &str) -> (StatusCode, Vec<u8>) {
    let app = router::build_router(h.ctx.clone());
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn master_manifest_is_stable_and_probes_once() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    let (status, first) = get(&h, "/play/a.mkv/index.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(first.clone()).unwrap();
    assert!(text.starts_with("#EXTM3U"));
    assert!(text.contains("index_720p.m3u8"));
    assert!(text.contains("RESOLUTION=1280x720"));

    let (status, second) = get(&h, "/play/a.mkv/index.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second, "master manifest must be byte-identical");
    assert_eq!(h.prober.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn child_playlist_matches_duration_math() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    let (status, body) = get(&h, "/play/a.mkv/index_720p.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();

    // 13.2s at 6s target: three segments, single-digit indexes, 1.2s tail.
    assert_eq!(text.matches("#EXTINF:").count(), 3);
    assert!(text.contains("segment_720p_0.ts"));
    assert!(text.contains("segment_720p_2.ts"));
    assert!(text.contains("#EXTINF:1.200000,"));
    assert_eq!(text.matches("#EXT-X-ENDLIST").count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_segment_requests_converge_on_one_encode() {
    let h = harness(hd_profile(), Duration::from_millis(150));
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();
    let _ = get(&h, "/play/a.mkv/index.m3u8").await;

    // The `.tmp`-presence check alone is racy under true concurrency; the
    // in-process per-key coalescing map is what makes this deterministic.
    let (a, b) = tokio::join!(
        get(&h, "/play/a.mkv/segment_720p_0.ts"),
        get(&h, "/play/a.mkv/segment_720p_0.ts"),
    );

    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(a.1, b"segment-bytes");
    assert_eq!(b.1, b"segment-bytes");
    assert_eq!(h.encoder.segment_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_segment_request_serves_from_disk() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();
    let _ = get(&h, "/play/a.mkv/index.m3u8").await;

    let (status, _) = get(&h, "/play/a.mkv/segment_720p_1.ts").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&h, "/play/a.mkv/segment_720p_1.ts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.encoder.segment_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changed_fingerprint_rebuilds_into_new_artifact() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();
    let _ = get(&h, "/play/a.mkv/index.m3u8").await;
    assert_eq!(h.prober.calls.load(Ordering::SeqCst), 1);

    // Same name, different size: a new fingerprint.
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data, longer cut").unwrap();
    let (status, _) = get(&h, "/play/a.mkv/index.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.prober.calls.load(Ordering::SeqCst), 2);

    // The old artifact directory is orphaned, not reused.
    let artifacts = std::fs::read_dir(h.cache_root.join("hls")).unwrap().count();
    assert_eq!(artifacts, 2);
}

#[tokio::test]
async fn unknown_artifacts_are_not_found() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    // Rendition never planned.
    let (status, _) = get(&h, "/play/a.mkv/segment_999p_0.ts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Index beyond the playlist.
    let (status, _) = get(&h, "/play/a.mkv/segment_720p_9.ts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Source that does not exist.
    let (status, _) = get(&h, "/play/missing.mkv/index.m3u8").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Garbage artifact name.
    let (status, _) = get(&h, "/play/a.mkv/banner.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_tmp_from_another_writer_exhausts_wait_budget() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();
    let _ = get(&h, "/play/a.mkv/index.m3u8").await;

    // Plant a `.tmp` as if another process were mid-encode, then never
    // finish it: the bounded poll must give up with 503, not spin forever.
    let artifact_dir = std::fs::read_dir(h.cache_root.join("hls"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    std::fs::write(artifact_dir.join("segment_720p_1.ts.tmp"), b"partial").unwrap();

    let (status, _) = get(&h, "/play/a.mkv/segment_720p_1.ts").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(h.encoder.segment_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completing_a_rendition_marks_the_ledger() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();
    let _ = get(&h, "/play/a.mkv/index.m3u8").await;

    for i in 0..3 {
        let (status, _) = get(&h, &format!("/play/a.mkv/segment_720p_{i}.ts")).await;
        assert_eq!(status, StatusCode::OK);
    }

    // All three segments of the 720p playlist are present, so the next
    // lookup must trust the artifact without regenerating.
    let resolved_path = h.media_root.join("a.mkv");
    let identity = h
        .ctx
        .cache
        .fingerprint("a.mkv", tc_core::ArtifactKind::Hls, &resolved_path)
        .unwrap();
    let decision = h.ctx.cache.lookup_hls(&identity).unwrap();
    assert!(!decision.regenerate);

    // The completion event went out on the bus.
    let completed = h.ctx.events.recent_events(100).into_iter().any(|e| {
        matches!(
            e.payload,
            tc_core::events::EventPayload::ArtifactCompleted { .. }
        )
    });
    assert!(completed);
}

#[tokio::test]
async fn preview_is_cached_per_animated_flag() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    let (status, body) = get(&h, "/preview/a.mkv.img").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"image-bytes");
    assert_eq!(h.encoder.thumbnail_calls.load(Ordering::SeqCst), 1);

    // Cached: no second encode.
    let (status, _) = get(&h, "/preview/a.mkv.img").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.encoder.thumbnail_calls.load(Ordering::SeqCst), 1);

    // The animated flag disagreeing with the stored row forces a
    // regeneration into a fresh artifact.
    let (status, _) = get(&h, "/preview/a.mkv.img?animated=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.encoder.thumbnail_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn multi_audio_source_splits_tracks() {
    let mut profile = hd_profile();
    profile.audio.push(AudioTrack {
        codec: Some("ac3".into()),
        language: Some("deu".into()),
        default: false,
    });
    let h = harness(profile, Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    let (status, body) = get(&h, "/play/a.mkv/index.m3u8").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("#EXT-X-MEDIA:TYPE=AUDIO"));
    assert!(text.contains("index_audio_1.m3u8"));

    // Combined segments are not part of the multi-audio layout.
    let (status, _) = get(&h, "/play/a.mkv/segment_720p_0.ts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&h, "/play/a.mkv/video_720p_0.ts").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&h, "/play/a.mkv/audio_1_0.aac").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn live_session_teardown_is_synchronous() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    let start = live::start_session(&h.ctx, "a.mkv", None).await.unwrap();
    assert!(start.src_url.ends_with("/index.m3u8"));
    assert!((start.duration - 13.2).abs() < 1e-9);
    assert_eq!(start.video_renditions.last().map(String::as_str), Some("720p"));

    let scratch = h.cache_root.join("live").join(start.id.to_string());
    assert!(scratch.is_dir());
    assert_eq!(h.ctx.sessions.len(), 1);

    live::stop_session(&h.ctx, start.id).await;

    assert!(!scratch.exists(), "scratch dir must be gone after close");
    assert!(h.ctx.sessions.is_empty());
}

#[tokio::test]
async fn live_seek_replaces_the_encoder_process() {
    let h = harness(hd_profile(), Duration::ZERO);
    std::fs::write(h.media_root.join("a.mkv"), b"fake video data").unwrap();

    let start = live::start_session(&h.ctx, "a.mkv", None).await.unwrap();
    live::seek_session(&h.ctx, start.id, 8.0).await.unwrap();

    // Session survives the seek; scratch dir is reused.
    assert_eq!(h.ctx.sessions.len(), 1);
    let scratch = h.cache_root.join("live").join(start.id.to_string());
    assert!(scratch.is_dir());

    live::stop_session(&h.ctx, start.id).await;
}
