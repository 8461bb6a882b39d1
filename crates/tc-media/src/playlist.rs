//! HLS playlist generation.
//!
//! The master playlist advertises renditions and alternate tracks; child
//! playlists are VOD-typed and enumerate every segment up front, even though
//! segments are generated lazily on first request.

use std::fmt::Write;

use tc_core::MediaProfile;

use crate::rendition::Rendition;
use crate::segment::{ChildPlaylist, SegmentKey};

/// Number of segments in a source of `duration` seconds.
pub fn segment_count(duration: f64, target: f64) -> u64 {
    if duration <= 0.0 || target <= 0.0 {
        return 0;
    }
    (duration / target).ceil() as u64
}

/// Zero-pad width for segment indexes: the digit count of the highest index.
pub fn index_width(count: u64) -> usize {
    let highest = count.saturating_sub(1);
    highest.to_string().len()
}

/// Duration of segment `i`: the target, or whatever remains at the tail.
pub fn segment_duration(i: u64, duration: f64, target: f64) -> f64 {
    let remaining = duration - (i as f64) * target;
    target.min(remaining)
}

/// Display name for an alternate track: its language tag, or a numbered
/// fallback.
fn track_name(language: Option<&str>, fallback: &str, n: usize) -> String {
    language
        .map(str::to_string)
        .unwrap_or_else(|| format!("{fallback} {}", n + 1))
}

/// Render the master playlist.
///
/// - one `#EXT-X-MEDIA:TYPE=AUDIO` per audio track when more than one
///   exists (first marked default);
/// - one `#EXT-X-MEDIA:TYPE=SUBTITLES` per subtitle track;
/// - one `#EXT-X-STREAM-INF` + URI per video rendition, bandwidth
///   approximated by the pixel count;
/// - audio-only variant entries when multiple audio tracks exist.
pub fn master_playlist(profile: &MediaProfile, plan: &[Rendition]) -> String {
    let mut out = String::new();

    writeln!(out, "#EXTM3U").unwrap();
    writeln!(out, "#EXT-X-VERSION:3").unwrap();

    let multi_audio = profile.multi_audio();

    if multi_audio {
        for (n, track) in profile.audio.iter().enumerate() {
            let uri = ChildPlaylist::Audio { track: n }.file_name();
            writeln!(
                out,
                "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"{}\",DEFAULT={},AUTOSELECT=YES,URI=\"{}\"",
                track_name(track.language.as_deref(), "Audio", n),
                if n == 0 { "YES" } else { "NO" },
                uri,
            )
            .unwrap();
        }
    }

    for (n, track) in profile.subtitles.iter().enumerate() {
        let uri = ChildPlaylist::Subtitle { track: n }.file_name();
        writeln!(
            out,
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"sub\",NAME=\"{}\",DEFAULT=NO,URI=\"{}\"",
            track_name(track.language.as_deref(), "Subtitle", n),
            uri,
        )
        .unwrap();
    }

    let frame_rate = profile.primary_video().and_then(|v| v.frame_rate);

    for rendition in plan {
        write!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}",
            rendition.width * rendition.height,
            rendition.width,
            rendition.height,
        )
        .unwrap();
        if let Some(fr) = frame_rate {
            write!(out, ",FRAME-RATE={fr:.3}").unwrap();
        }
        if multi_audio {
            write!(out, ",AUDIO=\"aud\"").unwrap();
        }
        if !profile.subtitles.is_empty() {
            write!(out, ",SUBTITLES=\"sub\"").unwrap();
        }
        writeln!(out).unwrap();
        writeln!(
            out,
            "{}",
            ChildPlaylist::Video {
                rendition: rendition.name.clone()
            }
            .file_name()
        )
        .unwrap();
    }

    if multi_audio {
        for n in 0..profile.audio.len() {
            writeln!(
                out,
                "#EXT-X-STREAM-INF:BANDWIDTH=131072,CODECS=\"mp4a.40.2\",AUDIO=\"aud\""
            )
            .unwrap();
            writeln!(out, "{}", ChildPlaylist::Audio { track: n }.file_name()).unwrap();
        }
    } else if plan.is_empty() && !profile.audio.is_empty() {
        // Audio-only source: the single track is the only variant.
        writeln!(out, "#EXT-X-STREAM-INF:BANDWIDTH=131072,CODECS=\"mp4a.40.2\"").unwrap();
        writeln!(out, "{}", ChildPlaylist::Audio { track: 0 }.file_name()).unwrap();
    }

    out
}

/// Render one VOD child playlist whose segments are produced by `key_for`.
fn child_playlist<F>(duration: f64, target: f64, key_for: F) -> String
where
    F: Fn(u64) -> SegmentKey,
{
    let count = segment_count(duration, target);
    let pad = index_width(count);

    let mut out = String::new();
    writeln!(out, "#EXTM3U").unwrap();
    writeln!(out, "#EXT-X-VERSION:3").unwrap();
    writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD").unwrap();
    writeln!(out, "#EXT-X-TARGETDURATION:{}", target.ceil() as u64).unwrap();
    writeln!(out, "#EXT-X-MEDIA-SEQUENCE:0").unwrap();

    for i in 0..count {
        writeln!(out, "#EXTINF:{:.6},", segment_duration(i, duration, target)).unwrap();
        writeln!(out, "{}", key_for(i).file_name(pad)).unwrap();
    }

    writeln!(out, "#EXT-X-ENDLIST").unwrap();
    out
}

/// Child playlist for one video rendition. With a single audio track the
/// segments are combined `segment_*.ts`; with several they are video-only
/// `video_*.ts` and audio rides in its own playlists.
pub fn video_playlist(rendition: &str, duration: f64, target: f64, multi_audio: bool) -> String {
    child_playlist(duration, target, |index| {
        if multi_audio {
            SegmentKey::Video {
                rendition: rendition.to_string(),
                index,
            }
        } else {
            SegmentKey::Combined {
                rendition: rendition.to_string(),
                index,
            }
        }
    })
}

/// Child playlist for one audio track.
pub fn audio_playlist(track: usize, duration: f64, target: f64) -> String {
    child_playlist(duration, target, |index| SegmentKey::Audio { track, index })
}

/// Child playlist for one subtitle track.
pub fn subtitle_playlist(track: usize, duration: f64, target: f64) -> String {
    child_playlist(duration, target, |index| SegmentKey::Subtitle { track, index })
}
