//! Encoding: per-segment jobs, long-lived live pipelines, and thumbnails.
//!
//! Hardware acceleration is a closed set of parameter-builder variants, one
//! per vendor, selected once from config. A hardware attempt that fails —
//! spawn error or non-zero exit — falls back exactly once to the software
//! x264 path for the same job before the error surfaces; the encoder's exit
//! status is authoritative.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;

use crate::command::ToolCommand;

/// Per-segment encodes get a tighter deadline than the global default; a
/// single six-second segment taking minutes means something is wrong.
const SEGMENT_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Hardware acceleration
// ---------------------------------------------------------------------------

/// Supported hardware encode vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwAccel {
    Nvenc,
    Qsv,
    Vaapi,
    VideoToolbox,
}

impl HwAccel {
    /// Capability-checked factory: maps the config string to a variant.
    /// `"none"`, unset, and unknown values all mean software-only.
    pub fn from_config(name: Option<&str>) -> Option<HwAccel> {
        match name {
            Some("nvenc") => Some(HwAccel::Nvenc),
            Some("qsv") => Some(HwAccel::Qsv),
            Some("vaapi") => Some(HwAccel::Vaapi),
            Some("videotoolbox") => Some(HwAccel::VideoToolbox),
            Some("none") | None => None,
            Some(other) => {
                tracing::warn!("Unknown hw_accel '{other}'; using software encode");
                None
            }
        }
    }

    /// Input-side arguments (decoder/device selection). Device selectors are
    /// opaque pass-through strings.
    fn input_args(&self, device: Option<&str>) -> Vec<String> {
        match self {
            HwAccel::Nvenc => {
                let mut args = vec!["-hwaccel".into(), "cuda".into()];
                if let Some(dev) = device {
                    args.push("-hwaccel_device".into());
                    args.push(dev.into());
                }
                args
            }
            HwAccel::Qsv => {
                let mut args = vec!["-hwaccel".into(), "qsv".into()];
                if let Some(dev) = device {
                    args.push("-qsv_device".into());
                    args.push(dev.into());
                }
                args
            }
            HwAccel::Vaapi => vec![
                "-vaapi_device".into(),
                device.unwrap_or("/dev/dri/renderD128").into(),
            ],
            HwAccel::VideoToolbox => Vec::new(),
        }
    }

    /// Output-side arguments: scale filter and encoder, per vendor.
    fn video_args(&self, width: u32, height: u32) -> Vec<String> {
        match self {
            HwAccel::Nvenc => vec![
                "-vf".into(),
                format!("scale={width}:{height}"),
                "-c:v".into(),
                "h264_nvenc".into(),
                "-preset".into(),
                "p4".into(),
            ],
            HwAccel::Qsv => vec![
                "-vf".into(),
                format!("scale={width}:{height}"),
                "-c:v".into(),
                "h264_qsv".into(),
            ],
            HwAccel::Vaapi => vec![
                "-vf".into(),
                format!("format=nv12,hwupload,scale_vaapi=w={width}:h={height}"),
                "-c:v".into(),
                "h264_vaapi".into(),
            ],
            HwAccel::VideoToolbox => vec![
                "-vf".into(),
                format!("scale={width}:{height}"),
                "-c:v".into(),
                "h264_videotoolbox".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Job specs
// ---------------------------------------------------------------------------

/// Which streams a segment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStream {
    /// Video plus the first audio track, muxed.
    Combined,
    /// Video only.
    VideoOnly,
    /// One audio track as raw AAC.
    AudioTrack(usize),
    /// One subtitle track as WebVTT.
    SubtitleTrack(usize),
}

/// One segment encode job. `output` is the temp path; the caller renames it
/// into place after success.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub input: PathBuf,
    /// Start offset in seconds.
    pub start: f64,
    /// Segment duration in seconds.
    pub duration: f64,
    pub stream: SegmentStream,
    /// Output dimensions; ignored for audio and subtitle streams.
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
}

/// A long-lived live transcode writing a rolling playlist into `out_dir`.
#[derive(Debug, Clone)]
pub struct LiveSpec {
    pub input: PathBuf,
    /// Seek offset in seconds.
    pub start: f64,
    pub width: u32,
    pub height: u32,
    pub out_dir: PathBuf,
    pub segment_seconds: f64,
}

/// One preview image job. `output` is the temp path, as with segments.
#[derive(Debug, Clone)]
pub struct ThumbnailSpec {
    pub input: PathBuf,
    /// Frame timestamp for static previews, clip start for animated ones.
    pub start: f64,
    pub animated: bool,
    pub width: u32,
    pub output: PathBuf,
}

/// Handle to a running live encoder process.
#[derive(Debug)]
pub struct LiveHandle {
    child: Child,
}

impl LiveHandle {
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    /// OS process id, while the child is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the encoder and reap it.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("live encoder already gone: {e}");
        }
    }

    /// Whether the process has exited on its own.
    pub fn is_finished(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

// ---------------------------------------------------------------------------
// Encoder trait + ffmpeg implementation
// ---------------------------------------------------------------------------

/// Produces media artifacts by running external encode processes.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode one segment to `spec.output`. Blocks until the process exits;
    /// dropping the future kills the process.
    async fn encode_segment(&self, spec: &SegmentSpec) -> tc_core::Result<()>;

    /// Start a long-lived live transcode and return its handle.
    async fn start_live(&self, spec: &LiveSpec) -> tc_core::Result<LiveHandle>;

    /// Encode a preview image to `spec.output`.
    async fn encode_thumbnail(&self, spec: &ThumbnailSpec) -> tc_core::Result<()>;
}

/// The production encoder, shelling out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    hw: Option<HwAccel>,
    hw_device: Option<String>,
    preset: String,
    audio_bitrate: String,
}

impl FfmpegEncoder {
    pub fn new(
        ffmpeg: PathBuf,
        hw: Option<HwAccel>,
        hw_device: Option<String>,
        preset: String,
        audio_bitrate: String,
    ) -> Self {
        Self {
            ffmpeg,
            hw,
            hw_device,
            preset,
            audio_bitrate,
        }
    }

    fn software_video_args(&self, width: u32, height: u32) -> Vec<String> {
        vec![
            "-vf".into(),
            format!("scale={width}:{height}"),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            "23".into(),
        ]
    }

    fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Build the full argument list for one segment attempt.
    fn segment_args(&self, spec: &SegmentSpec, hw: Option<HwAccel>) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        if let Some(hw) = hw {
            args.extend(hw.input_args(self.hw_device.as_deref()));
        }

        // Fast input seek, then bounded read.
        args.extend([
            "-ss".into(),
            format!("{:.3}", spec.start),
            "-t".into(),
            format!("{:.3}", spec.duration),
            "-i".into(),
            spec.input.to_string_lossy().into_owned(),
        ]);

        match spec.stream {
            SegmentStream::Combined => {
                args.extend(["-map".into(), "0:v:0".into(), "-map".into(), "0:a:0?".into()]);
                match hw {
                    Some(hw) => args.extend(hw.video_args(spec.width, spec.height)),
                    None => args.extend(self.software_video_args(spec.width, spec.height)),
                }
                args.extend(self.audio_args());
                // Keep segment timestamps continuous across the playlist.
                args.extend(["-output_ts_offset".into(), format!("{:.3}", spec.start)]);
                args.extend(["-f".into(), "mpegts".into()]);
            }
            SegmentStream::VideoOnly => {
                args.extend(["-map".into(), "0:v:0".into(), "-an".into()]);
                match hw {
                    Some(hw) => args.extend(hw.video_args(spec.width, spec.height)),
                    None => args.extend(self.software_video_args(spec.width, spec.height)),
                }
                args.extend(["-output_ts_offset".into(), format!("{:.3}", spec.start)]);
                args.extend(["-f".into(), "mpegts".into()]);
            }
            SegmentStream::AudioTrack(n) => {
                args.extend(["-map".into(), format!("0:a:{n}"), "-vn".into()]);
                args.extend(self.audio_args());
                args.extend(["-f".into(), "adts".into()]);
            }
            SegmentStream::SubtitleTrack(n) => {
                args.extend(["-map".into(), format!("0:s:{n}")]);
                args.extend(["-c:s".into(), "webvtt".into(), "-f".into(), "webvtt".into()]);
            }
        }

        args.push("-y".into());
        args.push(spec.output.to_string_lossy().into_owned());
        args
    }

    fn live_args(&self, spec: &LiveSpec) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        if let Some(hw) = self.hw {
            args.extend(hw.input_args(self.hw_device.as_deref()));
        }

        args.extend([
            "-ss".into(),
            format!("{:.3}", spec.start),
            "-i".into(),
            spec.input.to_string_lossy().into_owned(),
        ]);

        if spec.width == 0 {
            // Audio-only live source.
            args.push("-vn".into());
        } else {
            match self.hw {
                Some(hw) => args.extend(hw.video_args(spec.width, spec.height)),
                None => args.extend(self.software_video_args(spec.width, spec.height)),
            }
        }
        args.extend(self.audio_args());

        let playlist = spec.out_dir.join("index.m3u8");
        args.extend([
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            format!("{:.0}", spec.segment_seconds),
            "-hls_list_size".into(),
            "6".into(),
            "-hls_flags".into(),
            "delete_segments".into(),
            "-hls_segment_filename".into(),
            spec.out_dir.join("live_%05d.ts").to_string_lossy().into_owned(),
            "-y".into(),
            playlist.to_string_lossy().into_owned(),
        ]);

        args
    }

    fn thumbnail_args(&self, spec: &ThumbnailSpec) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-ss".into(),
            format!("{:.3}", spec.start),
            "-i".into(),
            spec.input.to_string_lossy().into_owned(),
        ];

        if spec.animated {
            args.extend([
                "-t".into(),
                "3".into(),
                "-vf".into(),
                format!("fps=10,scale={}:-2", spec.width),
                "-loop".into(),
                "0".into(),
                "-f".into(),
                "webp".into(),
            ]);
        } else {
            args.extend([
                "-frames:v".into(),
                "1".into(),
                "-vf".into(),
                format!("scale={}:-2", spec.width),
                "-f".into(),
                "image2".into(),
            ]);
        }

        args.push("-y".into());
        args.push(spec.output.to_string_lossy().into_owned());
        args
    }

    async fn run(&self, args: Vec<String>, timeout: Duration) -> tc_core::Result<()> {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(args);
        cmd.timeout(timeout);
        cmd.execute().await?;
        Ok(())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode_segment(&self, spec: &SegmentSpec) -> tc_core::Result<()> {
        let uses_video = matches!(
            spec.stream,
            SegmentStream::Combined | SegmentStream::VideoOnly
        );

        // Hardware first, software once on failure. Audio/subtitle jobs
        // never touch the video encoder, so they skip the dance.
        if uses_video {
            if let Some(hw) = self.hw {
                match self
                    .run(self.segment_args(spec, Some(hw)), SEGMENT_TIMEOUT)
                    .await
                {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!(
                            output = %spec.output.display(),
                            "Hardware encode ({hw:?}) failed, retrying in software: {e}"
                        );
                    }
                }
            }
        }

        self.run(self.segment_args(spec, None), SEGMENT_TIMEOUT)
            .await
            .map_err(|e| match e {
                tc_core::Error::Tool { message, .. } => tc_core::Error::encoder(
                    spec.output
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "segment".into()),
                    message,
                ),
                other => other,
            })
    }

    async fn start_live(&self, spec: &LiveSpec) -> tc_core::Result<LiveHandle> {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(self.live_args(spec));
        let child = cmd.spawn().map_err(|e| match e {
            tc_core::Error::Tool { message, .. } => tc_core::Error::encoder("live", message),
            other => other,
        })?;
        tracing::info!(
            pid = child.id(),
            out_dir = %spec.out_dir.display(),
            start = spec.start,
            "Live encoder started"
        );
        Ok(LiveHandle::new(child))
    }

    async fn encode_thumbnail(&self, spec: &ThumbnailSpec) -> tc_core::Result<()> {
        self.run(self.thumbnail_args(spec), SEGMENT_TIMEOUT)
            .await
            .map_err(|e| match e {
                tc_core::Error::Tool { message, .. } => {
                    tc_core::Error::encoder("thumbnail", message)
                }
                other => other,
            })
    }
}
