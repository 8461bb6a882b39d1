//! Service-oriented application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state: the cache index (ledger + cache root), the collaborator trait
//! objects, the live session table, and the in-flight work map used for
//! request coalescing. Everything is behind `Arc`s, so cloning is cheap and
//! nothing lives in process-wide globals.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

use tc_av::{Encoder, Prober, SourceResolver};
use tc_core::config::Config;
use tc_core::events::EventBus;
use tc_core::LiveSessionId;

use crate::cache::CacheIndex;
use crate::live::LiveSession;

/// Application context shared by all request handlers (via Axum state).
#[derive(Clone)]
pub struct AppContext {
    /// Ledger handle and cache-root paths.
    pub cache: Arc<CacheIndex>,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Media prober.
    pub prober: Arc<dyn Prober>,
    /// Virtual-path resolver and archive extractor.
    pub resolver: Arc<dyn SourceResolver>,
    /// Segment / live / thumbnail encoder.
    pub encoder: Arc<dyn Encoder>,
    /// Broadcast bus for generation progress events.
    pub events: Arc<EventBus>,
    /// Active live sessions, keyed by session id.
    pub sessions: Arc<DashMap<LiveSessionId, Arc<LiveSession>>>,
    /// In-flight generation work, keyed by the output path being produced.
    /// The first requester registers a `Notify` and does the work; later
    /// requesters await it instead of spawning a second encoder.
    pub inflight: Arc<DashMap<PathBuf, Arc<Notify>>>,
}

impl AppContext {
    /// Target segment duration from config, guarded against nonsense.
    pub fn segment_seconds(&self) -> f64 {
        let t = self.config.transcode.segment_seconds;
        if t > 0.0 {
            t
        } else {
            6.0
        }
    }
}
