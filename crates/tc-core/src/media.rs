//! Media-domain types shared between the prober, the planner, and the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of artifact a ledger row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// A directory of HLS playlists and segments.
    Hls,
    /// A single preview image file (static or animated).
    Thumbnail,
}

impl ArtifactKind {
    /// Stable string form used as the ledger's kind column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Hls => "hls",
            ArtifactKind::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hls" => Ok(ArtifactKind::Hls),
            "thumbnail" => Ok(ArtifactKind::Thumbnail),
            other => Err(format!("unknown artifact kind: {other}")),
        }
    }
}

/// A source's content fingerprint: the natural key `(file_name, kind)` plus
/// the freshness component `(modified_ms, size_bytes)`.
///
/// This is a cheap identity proxy, not a cryptographic hash: renaming a file
/// or touching its mtime is enough to invalidate the cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentity {
    /// Virtual path of the source as the browser sees it.
    pub file_name: String,
    /// Which artifact family this fingerprint belongs to.
    pub kind: ArtifactKind,
    /// Source modification time, in milliseconds since the epoch.
    pub modified_ms: i64,
    /// Source size in bytes.
    pub size_bytes: i64,
}

impl SourceIdentity {
    /// Whether `other` describes the same bytes (same natural key assumed).
    pub fn is_fresh(&self, modified_ms: i64, size_bytes: i64) -> bool {
        self.modified_ms == modified_ms && self.size_bytes == size_bytes
    }
}

// ---------------------------------------------------------------------------
// Probe results
// ---------------------------------------------------------------------------

/// One video stream as reported by the prober.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTrack {
    pub width: u32,
    pub height: u32,
    /// Frames per second, when the container reports one.
    pub frame_rate: Option<f64>,
    /// Color transfer characteristic (e.g. "smpte2084" for HDR10).
    pub color_transfer: Option<String>,
    pub language: Option<String>,
}

/// One audio stream as reported by the prober.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub codec: Option<String>,
    pub language: Option<String>,
    /// Whether the container marks this stream as the default.
    pub default: bool,
}

/// One subtitle stream as reported by the prober.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub codec: Option<String>,
    pub language: Option<String>,
}

/// Everything the engine needs to know about a source, in one probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaProfile {
    /// Total duration in seconds.
    pub duration_seconds: f64,
    pub video: Vec<VideoTrack>,
    pub audio: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
}

impl MediaProfile {
    /// The primary video track, if any.
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video.first()
    }

    /// True when segment generation must split audio from video: with more
    /// than one audio track the combined `segment_*.ts` layout cannot carry
    /// track selection.
    pub fn multi_audio(&self) -> bool {
        self.audio.len() > 1
    }
}
