//! On-demand HLS generation.
//!
//! Two state machines live here. The coarse one ([`manifest`]) covers the
//! playlist files: absent means probe once and synthesize *all* playlists
//! eagerly; present means serve as-is forever. The fine one ([`segment`])
//! covers individual segments: Absent → Generating (`.tmp` on disk) → Ready
//! (final file, non-empty), with per-key request coalescing so concurrent
//! requests converge on a single encoder run.

pub mod manifest;
pub mod segment;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tc_core::MediaProfile;
use tc_media::Rendition;
use tokio::sync::Notify;

/// Sidecar file describing an HLS artifact, written next to its playlists.
///
/// Segment requests arrive long after the manifest build (and possibly after
/// a server restart), so everything the generator needs is persisted here:
/// where the media lives, its probe result, and the rendition plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Virtual path of the source as requested.
    pub virtual_path: String,
    /// The direct file, or the archive containing the entry.
    pub source_path: PathBuf,
    /// Set when the source lives inside an archive; the extracted copy is
    /// kept under `<artifact>/source/` until the artifact completes.
    pub archive_entry: Option<String>,
    pub profile: MediaProfile,
    pub plan: Vec<Rendition>,
    pub segment_seconds: f64,
}

/// Sidecar filename inside an artifact directory.
const MANIFEST_FILE: &str = "media.json";

impl ArtifactManifest {
    /// Load the sidecar from an artifact directory.
    pub fn load(dir: &Path) -> tc_core::Result<Self> {
        let raw = std::fs::read_to_string(dir.join(MANIFEST_FILE))
            .map_err(|_| tc_core::Error::not_found("artifact", dir.display()))?;
        serde_json::from_str(&raw).map_err(|e| {
            tc_core::Error::Internal(format!("corrupt sidecar in {}: {e}", dir.display()))
        })
    }

    /// Persist the sidecar into an artifact directory.
    pub fn save(&self, dir: &Path) -> tc_core::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| tc_core::Error::Internal(format!("sidecar serialize: {e}")))?;
        std::fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Where the local media bytes live (or lived): the direct path, or the
    /// extracted copy inside the artifact directory.
    pub fn local_source(&self, dir: &Path) -> PathBuf {
        match &self.archive_entry {
            Some(entry) => dir.join("source").join(entry),
            None => self.source_path.clone(),
        }
    }
}

/// Removes its in-flight entry and wakes waiters when the owning future
/// completes *or is dropped* — a cancelled worker must not leave a
/// permanently-occupied slot behind.
struct InflightGuard {
    map: Arc<DashMap<PathBuf, Arc<Notify>>>,
    key: PathBuf,
    notify: Arc<Notify>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.key);
        self.notify.notify_waiters();
    }
}

/// Coalesce concurrent generation work for one output path.
///
/// `check` is the on-disk readiness probe; `work` produces the artifact.
/// The first caller registers itself and runs `work`; later callers await
/// its notify and re-check. A waiter whose worker failed (or vanished)
/// becomes the next worker. Waits are bounded so a missed wakeup degrades
/// to a re-check instead of a hang.
pub(crate) async fn coalesce<T, C, F, Fut>(
    inflight: &Arc<DashMap<PathBuf, Arc<Notify>>>,
    key: &Path,
    check: C,
    work: F,
) -> tc_core::Result<T>
where
    C: Fn() -> Option<T>,
    F: Fn() -> Fut,
    Fut: Future<Output = tc_core::Result<T>>,
{
    loop {
        if let Some(ready) = check() {
            return Ok(ready);
        }

        match inflight.entry(key.to_path_buf()) {
            Entry::Occupied(e) => {
                let notify = e.get().clone();
                drop(e);
                let _ = tokio::time::timeout(Duration::from_secs(30), notify.notified()).await;
                // Re-check; become the worker if the last one failed.
            }
            Entry::Vacant(e) => {
                let notify = Arc::new(Notify::new());
                e.insert(notify.clone());
                let _guard = InflightGuard {
                    map: inflight.clone(),
                    key: key.to_path_buf(),
                    notify,
                };
                return work().await;
            }
        }
    }
}
