//! Engine progress events.
//!
//! Generation work reports progress by broadcasting onto an [`EventBus`]
//! instead of calling back into whoever started it; any transport (the live
//! channel, an SSE feed, a log tail) can subscribe independently of the
//! encode routine's internals. A bounded ring buffer of recent events lets
//! late subscribers catch up.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::{ArtifactId, LiveSessionId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// All playlists for an artifact were synthesized.
    ManifestSynthesized {
        artifact_id: ArtifactId,
        virtual_path: String,
        renditions: usize,
    },
    /// One segment reached Ready.
    SegmentGenerated {
        artifact_id: ArtifactId,
        segment: String,
    },
    /// Every segment of a child playlist is present; the ledger row was
    /// flipped to completed.
    ArtifactCompleted {
        artifact_id: ArtifactId,
        virtual_path: String,
    },
    /// A preview image was (re)generated.
    PreviewGenerated {
        virtual_path: String,
        animated: bool,
    },

    LiveSessionStarted {
        session_id: LiveSessionId,
    },
    LiveSessionSeeked {
        session_id: LiveSessionId,
        offset: f64,
    },
    LiveSessionStopped {
        session_id: LiveSessionId,
    },
}

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus. `capacity` controls the broadcast channel
    /// buffer size (not the ring buffer).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
