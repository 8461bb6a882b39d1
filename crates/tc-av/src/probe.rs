//! Media probing.
//!
//! The [`Prober`] trait is the engine's window into a source's structure;
//! the production implementation shells out to
//! `ffprobe -v quiet -print_format json -show_format -show_streams` and maps
//! the JSON into a [`MediaProfile`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tc_core::{AudioTrack, MediaProfile, SubtitleTrack, VideoTrack};

use crate::command::ToolCommand;

/// Extracts duration and track structure from a local media file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `path` and return its media profile.
    async fn probe(&self, path: &Path) -> tc_core::Result<MediaProfile>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> tc_core::Result<MediaProfile> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await.map_err(|e| match e {
            tc_core::Error::Tool { message, .. } => {
                tc_core::Error::Probe(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;

        let ff: FfprobeOutput = serde_json::from_str(&output.stdout)
            .map_err(|e| tc_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

        Ok(parse_ffprobe_output(ff))
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    color_transfer: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_ffprobe_output(output: FfprobeOutput) -> MediaProfile {
    let duration_seconds = output
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut profile = MediaProfile {
        duration_seconds,
        ..MediaProfile::default()
    };

    for stream in output.streams {
        match stream.codec_type.as_deref() {
            Some("video") => profile.video.push(VideoTrack {
                width: stream.width.unwrap_or(0),
                height: stream.height.unwrap_or(0),
                frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
                color_transfer: stream.color_transfer,
                language: stream.tags.language,
            }),
            Some("audio") => profile.audio.push(AudioTrack {
                codec: stream.codec_name,
                language: stream.tags.language,
                default: stream.disposition.default == 1,
            }),
            Some("subtitle") => profile.subtitles.push(SubtitleTrack {
                codec: stream.codec_name,
                language: stream.tags.language,
            }),
            _ => {}
        }
    }

    profile
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}
