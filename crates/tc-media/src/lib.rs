//! tc-media: pure HLS planning and text generation.
//!
//! No I/O lives here. The rendition planner turns probed dimensions into a
//! resolution ladder, the playlist module renders master/child manifests,
//! and the segment module is the filename codec shared by the manifest
//! builder and the segment generator — the two must agree byte-for-byte
//! because segment requests are parsed back out of the playlist text.

pub mod playlist;
pub mod rendition;
pub mod segment;

pub use playlist::{
    audio_playlist, index_width, master_playlist, segment_count, segment_duration,
    subtitle_playlist, video_playlist,
};
pub use rendition::{plan_renditions, Rendition};
pub use segment::{ChildPlaylist, SegmentKey};
