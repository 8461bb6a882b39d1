//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for server, cache, tools, and transcoding. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub tools: ToolsConfig,
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !self.cache.media_root.is_absolute() {
            warnings.push(format!(
                "cache.media_root '{}' is relative; resolution depends on the working directory",
                self.cache.media_root.display()
            ));
        }

        if let Some(ref hw) = self.transcode.hw_accel {
            let valid = ["none", "nvenc", "qsv", "vaapi", "videotoolbox"];
            if !valid.contains(&hw.as_str()) {
                warnings.push(format!(
                    "transcode.hw_accel '{}' is not a recognized method (valid: {})",
                    hw,
                    valid.join(", ")
                ));
            }
        }

        if self.transcode.segment_seconds <= 0.0 {
            warnings.push("transcode.segment_seconds must be positive; using default".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Cache and media tree locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root of the browsable media tree; virtual paths resolve under it.
    pub media_root: PathBuf,
    /// Root of the artifact cache: one subdirectory per HLS artifact id,
    /// one file per thumbnail artifact id, plus the ledger database.
    pub cache_root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("/data/media"),
            cache_root: PathBuf::from("/data/cache"),
        }
    }
}

/// Paths to external CLI tools. Unset paths are discovered on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub sevenzip_path: Option<PathBuf>,
}

/// Transcoding defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Target segment duration in seconds.
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: f64,
    /// x264 preset for the software path.
    #[serde(default = "default_preset")]
    pub preset: String,
    /// AAC bitrate for transcoded audio.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// Hardware acceleration method (none, nvenc, qsv, vaapi, videotoolbox).
    #[serde(default)]
    pub hw_accel: Option<String>,
    /// Opaque device selector passed through to the hardware encoder
    /// (e.g. a VAAPI render node or a CUDA device index).
    #[serde(default)]
    pub hw_device: Option<String>,
    /// Seconds between polls while waiting on a segment another writer owns.
    #[serde(default = "default_wait_secs")]
    pub segment_wait_secs: u64,
    /// Poll attempts before a waiting request gives up with `Unready`.
    #[serde(default = "default_wait_attempts")]
    pub segment_wait_attempts: u32,
}

fn default_segment_seconds() -> f64 {
    6.0
}
fn default_preset() -> String {
    "veryfast".into()
}
fn default_audio_bitrate() -> String {
    "128k".into()
}
fn default_wait_secs() -> u64 {
    1
}
fn default_wait_attempts() -> u32 {
    5
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            segment_seconds: default_segment_seconds(),
            preset: default_preset(),
            audio_bitrate: default_audio_bitrate(),
            hw_accel: None,
            hw_device: None,
            segment_wait_secs: default_wait_secs(),
            segment_wait_attempts: default_wait_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.transcode.segment_seconds, 6.0);
        assert_eq!(cfg.transcode.segment_wait_attempts, 5);
        assert_eq!(cfg.cache.cache_root, PathBuf::from("/data/cache"));
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn unknown_hw_accel_warns() {
        let mut cfg = Config::default();
        cfg.transcode.hw_accel = Some("quantum".into());
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("quantum")));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"server": {"port": 9090}, "transcode": {"segment_seconds": 4.0}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.transcode.segment_seconds, 4.0);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/config.json")));
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn relative_media_root_warns() {
        let mut cfg = Config::default();
        cfg.cache.media_root = PathBuf::from("media");
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("media_root")));
    }
}
