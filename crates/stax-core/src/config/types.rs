//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How source files end up in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyPolicy {
    /// Reference the original location only
    #[default]
    Soft,
    /// Duplicate the files into the repository tree
    Hard,
}

impl CopyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyPolicy::Soft => "soft",
            CopyPolicy::Hard => "hard",
        }
    }
}

impl std::fmt::Display for CopyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Library-wide ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory that receives thumbnails, GIFs, clips and GLB proxies
    pub preview_dir: PathBuf,

    /// Copy policy used when a caller doesn't choose one
    pub default_copy_policy: CopyPolicy,

    /// Whether ingestion generates previews at all
    pub generate_previews: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            preview_dir: PathBuf::from("~/.stax/previews"),
            default_copy_policy: CopyPolicy::Soft,
            generate_previews: true,
        }
    }
}

/// Frame sequence detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// When false, every file is ingested on its own
    pub auto_detect: bool,

    /// Pattern key (".####.ext", "_####.ext", " ####.ext", "-####.ext").
    /// Empty tries all four in priority order.
    pub pattern: String,

    /// Playback rate assumed for image sequences
    pub fps: u32,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            pattern: String::new(),
            fps: 24,
        }
    }
}

/// Still thumbnail and video clip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Longest edge of still thumbnails and video clips, in pixels
    pub size: u32,

    /// Duration cap for re-encoded video clips
    pub video_duration_secs: u32,

    /// Frames taken from the head of a sequence for its clip
    pub sequence_video_max_frames: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            size: 512,
            video_duration_secs: 10,
            sequence_video_max_frames: 100,
        }
    }
}

/// Animated GIF settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GifConfig {
    /// Square canvas size in pixels
    pub size: u32,

    /// Output frame rate
    pub fps: u32,

    /// Duration cap in seconds (ignored when `full_duration` is set)
    pub duration_secs: f64,

    /// Use the full source length
    pub full_duration: bool,

    /// Optional cap on source frames
    pub max_frames: Option<u64>,

    /// Loop the animation forever instead of playing once
    pub loop_forever: bool,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            size: 256,
            fps: 10,
            duration_secs: 3.0,
            full_duration: false,
            max_frames: None,
            loop_forever: true,
        }
    }
}

impl GifConfig {
    /// The duration cap to apply, `None` meaning full source length.
    pub fn max_duration(&self) -> Option<f64> {
        if self.full_duration {
            None
        } else {
            Some(self.duration_secs)
        }
    }
}

/// External tool locations and supervision limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory holding ffmpeg/ffprobe/ffplay. Unset searches PATH.
    pub ffmpeg_bin_dir: Option<PathBuf>,

    /// Wall-clock cap for transcoder invocations
    pub command_timeout_secs: u64,

    /// Explicit Blender executable
    pub blender_path: Option<PathBuf>,

    /// Replacement for the bundled GLB export script
    pub export_script: Option<PathBuf>,

    /// Terminate the headless tool after this long without output
    pub geometry_idle_timeout_secs: u64,

    /// Optional absolute cap on a headless tool run
    pub geometry_hard_timeout_secs: Option<u64>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin_dir: None,
            command_timeout_secs: 300,
            blender_path: None,
            export_script: None,
            geometry_idle_timeout_secs: 900,
            geometry_hard_timeout_secs: None,
        }
    }
}

/// Background preview worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of preview workers
    pub count: usize,

    /// How long a worker waits on an empty queue before re-checking for shutdown
    pub poll_interval_ms: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: 2,
            poll_interval_ms: 500,
        }
    }
}

/// Executables run around each ingest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Run before anything is copied; may veto the ingest
    pub pre_ingest: Option<PathBuf>,

    /// Run after the element is persisted
    pub post_ingest: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
