//! tc-server: the HTTP face of the transcoding engine.
//!
//! This crate ties together all other tc-* crates into a running server:
//!
//! - Axum-based HTTP API serving playlists, segments, previews, and live
//!   session output
//! - The segment generator state machine with per-key request coalescing
//! - The live session manager driven over a WebSocket channel
//! - Graceful shutdown that tears down live sessions

pub mod cache;
pub mod context;
pub mod error;
pub mod hls;
pub mod live;
pub mod preview;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use tc_av::{FfmpegEncoder, FsResolver, HwAccel, ToolRegistry};
use tc_core::config::Config;

use crate::cache::CacheIndex;
use crate::context::AppContext;

/// Build the application context from configuration: database, tool
/// discovery, and the production collaborator implementations.
pub fn build_context(config: Config) -> tc_core::Result<AppContext> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let cache_root = config.cache.cache_root.clone();
    for sub in ["hls", "previews", "live"] {
        std::fs::create_dir_all(cache_root.join(sub))?;
    }

    let db_path = cache_root.join("ledger.db");
    let db = tc_db::pool::init_pool(&db_path.to_string_lossy())?;
    tracing::info!("Ledger opened at {}", db_path.display());

    let tools = ToolRegistry::discover(&config.tools);
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    // Missing tools surface as per-request errors rather than refusing to
    // start; the rest of the file browser stays usable without them.
    let tool_path = |name: &str| {
        tools
            .get(name)
            .map(|t| t.path.clone())
            .unwrap_or_else(|| PathBuf::from(name))
    };

    let prober = Arc::new(tc_av::FfprobeProber::new(tool_path("ffprobe")));
    let resolver = Arc::new(FsResolver::new(
        config.cache.media_root.clone(),
        tools.get("7z").map(|t| t.path.clone()),
    ));
    let encoder = Arc::new(FfmpegEncoder::new(
        tool_path("ffmpeg"),
        HwAccel::from_config(config.transcode.hw_accel.as_deref()),
        config.transcode.hw_device.clone(),
        config.transcode.preset.clone(),
        config.transcode.audio_bitrate.clone(),
    ));

    Ok(AppContext {
        cache: Arc::new(CacheIndex::new(db, cache_root)),
        config: Arc::new(config),
        prober,
        resolver,
        encoder,
        events: Arc::new(tc_core::events::EventBus::default()),
        sessions: Arc::new(DashMap::new()),
        inflight: Arc::new(DashMap::new()),
    })
}

/// Start the tidecast server and run until a shutdown signal arrives.
pub async fn start(config: Config) -> tc_core::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| tc_core::Error::Validation(format!("invalid listen address: {e}")))?;

    let ctx = build_context(config)?;
    let app = router::build_router(ctx.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(ctx.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(ctx: AppContext) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Shutdown signal received; stopping live sessions");
    live::stop_all(&ctx).await;
}
