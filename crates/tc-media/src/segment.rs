//! Segment and child-playlist filename codec.
//!
//! Playlists reference segments by filename, and segment requests are parsed
//! back into keys on arrival, so rendering and parsing must agree exactly:
//!
//! - combined (single audio): `segment_{res}_{idx}.ts`
//! - video-only (multi audio): `video_{res}_{idx}.ts`
//! - audio track:              `audio_{track}_{idx}.aac`
//! - subtitle track:           `subtitle_{track}_{idx}.vtt`
//!
//! `idx` is zero-padded to the width of the playlist's highest index.

use std::fmt;

/// A segment's identity: track kind, track/rendition selector, and sequence
/// index within the child playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentKey {
    /// Muxed video+audio, used when the source has at most one audio track.
    Combined { rendition: String, index: u64 },
    /// Video without audio, used when audio tracks are served separately.
    Video { rendition: String, index: u64 },
    /// One audio track as raw AAC.
    Audio { track: usize, index: u64 },
    /// One subtitle track as WebVTT.
    Subtitle { track: usize, index: u64 },
}

impl SegmentKey {
    /// Sequence index within the child playlist.
    pub fn index(&self) -> u64 {
        match self {
            SegmentKey::Combined { index, .. }
            | SegmentKey::Video { index, .. }
            | SegmentKey::Audio { index, .. }
            | SegmentKey::Subtitle { index, .. } => *index,
        }
    }

    /// Render the exact segment filename with the given index pad width.
    pub fn file_name(&self, pad: usize) -> String {
        match self {
            SegmentKey::Combined { rendition, index } => {
                format!("segment_{rendition}_{index:0pad$}.ts")
            }
            SegmentKey::Video { rendition, index } => {
                format!("video_{rendition}_{index:0pad$}.ts")
            }
            SegmentKey::Audio { track, index } => format!("audio_{track}_{index:0pad$}.aac"),
            SegmentKey::Subtitle { track, index } => {
                format!("subtitle_{track}_{index:0pad$}.vtt")
            }
        }
    }

    /// Parse a segment filename back into its key.
    ///
    /// Accepts any zero-padding on the index, since the pad width depends on
    /// the playlist length the requester saw.
    pub fn parse(name: &str) -> Option<SegmentKey> {
        let (stem, ext) = name.rsplit_once('.')?;
        let mut parts = stem.split('_');
        let prefix = parts.next()?;
        let selector = parts.next()?;
        let index: u64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        match (prefix, ext) {
            ("segment", "ts") => Some(SegmentKey::Combined {
                rendition: selector.to_string(),
                index,
            }),
            ("video", "ts") => Some(SegmentKey::Video {
                rendition: selector.to_string(),
                index,
            }),
            ("audio", "aac") => Some(SegmentKey::Audio {
                track: selector.parse().ok()?,
                index,
            }),
            ("subtitle", "vtt") => Some(SegmentKey::Subtitle {
                track: selector.parse().ok()?,
                index,
            }),
            _ => None,
        }
    }

    /// MIME type of the segment payload.
    pub fn content_type(&self) -> &'static str {
        match self {
            SegmentKey::Combined { .. } | SegmentKey::Video { .. } => "video/mp2t",
            SegmentKey::Audio { .. } => "audio/aac",
            SegmentKey::Subtitle { .. } => "text/vtt",
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name(1))
    }
}

/// A child playlist reference: `index_{res}.m3u8`, `index_audio_{n}.m3u8`,
/// or `index_subtitle_{n}.m3u8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildPlaylist {
    Video { rendition: String },
    Audio { track: usize },
    Subtitle { track: usize },
}

impl ChildPlaylist {
    /// Render the playlist filename.
    pub fn file_name(&self) -> String {
        match self {
            ChildPlaylist::Video { rendition } => format!("index_{rendition}.m3u8"),
            ChildPlaylist::Audio { track } => format!("index_audio_{track}.m3u8"),
            ChildPlaylist::Subtitle { track } => format!("index_subtitle_{track}.m3u8"),
        }
    }

    /// Parse a child playlist filename. `index.m3u8` itself is the master
    /// playlist and is not a child.
    pub fn parse(name: &str) -> Option<ChildPlaylist> {
        let stem = name.strip_suffix(".m3u8")?;
        let rest = stem.strip_prefix("index_")?;

        if let Some(track) = rest.strip_prefix("audio_") {
            return Some(ChildPlaylist::Audio {
                track: track.parse().ok()?,
            });
        }
        if let Some(track) = rest.strip_prefix("subtitle_") {
            return Some(ChildPlaylist::Subtitle {
                track: track.parse().ok()?,
            });
        }
        if rest.is_empty() || rest.contains('_') {
            return None;
        }
        Some(ChildPlaylist::Video {
            rendition: rest.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_roundtrip() {
        let key = SegmentKey::Combined {
            rendition: "720p".into(),
            index: 3,
        };
        assert_eq!(key.file_name(1), "segment_720p_3.ts");
        assert_eq!(key.file_name(3), "segment_720p_003.ts");
        assert_eq!(SegmentKey::parse("segment_720p_3.ts"), Some(key.clone()));
        assert_eq!(SegmentKey::parse("segment_720p_003.ts"), Some(key));
    }

    #[test]
    fn video_and_audio_roundtrip() {
        let video = SegmentKey::Video {
            rendition: "1080p".into(),
            index: 12,
        };
        assert_eq!(video.file_name(2), "video_1080p_12.ts");
        assert_eq!(SegmentKey::parse("video_1080p_12.ts"), Some(video));

        let audio = SegmentKey::Audio { track: 1, index: 0 };
        assert_eq!(audio.file_name(2), "audio_1_00.aac");
        assert_eq!(SegmentKey::parse("audio_1_00.aac"), Some(audio));
    }

    #[test]
    fn subtitle_roundtrip() {
        let sub = SegmentKey::Subtitle { track: 0, index: 7 };
        assert_eq!(sub.file_name(1), "subtitle_0_7.vtt");
        assert_eq!(SegmentKey::parse("subtitle_0_7.vtt"), Some(sub));
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(SegmentKey::parse("segment_720p.ts"), None);
        assert_eq!(SegmentKey::parse("segment_720p_3.aac"), None);
        assert_eq!(SegmentKey::parse("audio_x_3.aac"), None);
        assert_eq!(SegmentKey::parse("segment_720p_3_extra.ts"), None);
        assert_eq!(SegmentKey::parse("banner.jpg"), None);
        assert_eq!(SegmentKey::parse("index.m3u8"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(
            SegmentKey::parse("segment_720p_0.ts").unwrap().content_type(),
            "video/mp2t"
        );
        assert_eq!(
            SegmentKey::parse("audio_0_0.aac").unwrap().content_type(),
            "audio/aac"
        );
        assert_eq!(
            SegmentKey::parse("subtitle_0_0.vtt").unwrap().content_type(),
            "text/vtt"
        );
    }

    #[test]
    fn child_playlist_roundtrip() {
        let video = ChildPlaylist::Video {
            rendition: "540p".into(),
        };
        assert_eq!(video.file_name(), "index_540p.m3u8");
        assert_eq!(ChildPlaylist::parse("index_540p.m3u8"), Some(video));

        let audio = ChildPlaylist::Audio { track: 2 };
        assert_eq!(audio.file_name(), "index_audio_2.m3u8");
        assert_eq!(ChildPlaylist::parse("index_audio_2.m3u8"), Some(audio));

        let sub = ChildPlaylist::Subtitle { track: 0 };
        assert_eq!(sub.file_name(), "index_subtitle_0.m3u8");
        assert_eq!(ChildPlaylist::parse("index_subtitle_0.m3u8"), Some(sub));
    }

    #[test]
    fn master_is_not_a_child() {
        assert_eq!(ChildPlaylist::parse("index.m3u8"), None);
        assert_eq!(ChildPlaylist::parse("index_.m3u8"), None);
        assert_eq!(ChildPlaylist::parse("playlist.m3u8"), None);
    }
}
