//! Preview generation by driving the ffmpeg command-line tools.
//!
//! Every operation reports success as `bool` (or `Option`) and logs the
//! cause of a failure; only construction can fail, when one of the three
//! binaries is missing. Arguments are assembled by pure builder functions so
//! the exact argv can be checked without running anything.

use serde::{Deserialize, Serialize};
use std::env::consts::EXE_SUFFIX;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{Config, GifConfig};
use crate::error::ToolError;
use crate::process::ToolCommand;

/// Durations above this are treated as moving images.
const VIDEO_DURATION_THRESHOLD: f64 = 0.1;

/// Summary of a media file as reported by ffprobe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    /// Container format name, e.g. `mov,mp4,m4a,3gp,3g2,mj2`
    pub format: Option<String>,
    pub fps: Option<f64>,
    pub is_video: bool,
    pub is_image: bool,
}

/// Parameters of an animated GIF preview.
#[derive(Debug, Clone, PartialEq)]
pub struct GifOptions {
    /// Square canvas edge in pixels
    pub size: u32,
    /// Output frame rate
    pub fps: u32,
    /// `None` encodes the full source length
    pub max_duration: Option<f64>,
    /// First frame: `-start_number` for sequences, a trim offset for video
    pub start_frame: Option<u64>,
    /// Input is a printf-style image sequence pattern
    pub is_sequence: bool,
    /// Frame rate at which sequence frames are read
    pub sequence_fps: u32,
    /// Cap on source frames
    pub max_frames: Option<u64>,
    pub loop_forever: bool,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self::from_config(&GifConfig::default(), 24)
    }
}

impl GifOptions {
    pub fn from_config(gif: &GifConfig, sequence_fps: u32) -> Self {
        Self {
            size: gif.size,
            fps: gif.fps,
            max_duration: gif.max_duration(),
            start_frame: None,
            is_sequence: false,
            sequence_fps,
            max_frames: gif.max_frames,
            loop_forever: gif.loop_forever,
        }
    }

    /// Read the input as an image sequence starting at `start_frame`.
    pub fn sequence(mut self, start_frame: u64) -> Self {
        self.is_sequence = true;
        self.start_frame = Some(start_frame);
        self
    }
}

/// Wrapper around the ffmpeg/ffprobe/ffplay executables.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    ffplay: PathBuf,
    timeout: Duration,
}

impl Transcoder {
    /// Locate the three binaries in `bin_dir`, or on `PATH` when unset.
    ///
    /// A missing binary is fatal.
    pub fn new(bin_dir: Option<&Path>) -> Result<Self, ToolError> {
        let find = |name: &str| -> Result<PathBuf, ToolError> {
            match bin_dir {
                Some(dir) => {
                    let path = dir.join(format!("{name}{EXE_SUFFIX}"));
                    if path.exists() {
                        Ok(path)
                    } else {
                        Err(ToolError::Missing {
                            tool: name.to_string(),
                            path,
                        })
                    }
                }
                None => which::which(name).map_err(|_| ToolError::NotOnPath {
                    tool: name.to_string(),
                }),
            }
        };

        let transcoder = Self {
            ffmpeg: find("ffmpeg")?,
            ffprobe: find("ffprobe")?,
            ffplay: find("ffplay")?,
            timeout: Duration::from_secs(300),
        };
        tracing::debug!(ffmpeg = %transcoder.ffmpeg.display(), "Transcoder ready");
        Ok(transcoder)
    }

    pub fn from_config(config: &Config) -> Result<Self, ToolError> {
        Ok(Self::new(config.ffmpeg_bin_dir().as_deref())?.with_timeout(config.command_timeout()))
    }

    /// Wall-clock cap applied to every invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn ffmpeg_cmd(&self, args: Vec<OsString>) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.ffmpeg);
        cmd.args(args).timeout(self.timeout);
        cmd
    }

    /// Run ffmpeg and confirm `out` was produced by this run.
    async fn render(&self, op: &str, args: Vec<OsString>, out: &Path) -> bool {
        if !ensure_parent(out) || !remove_stale(out) {
            return false;
        }
        match self.ffmpeg_cmd(args).execute().await {
            Ok(_) if out.exists() => true,
            Ok(_) => {
                tracing::warn!(op, out = %out.display(), "ffmpeg produced no output");
                false
            }
            Err(e) => {
                tracing::warn!(op, out = %out.display(), error = %e, "ffmpeg failed");
                false
            }
        }
    }

    /// Query duration, dimensions, codec, container and frame rate.
    pub async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        let mut cmd = ToolCommand::new(&self.ffprobe);
        cmd.args(probe_args(path)).timeout(self.timeout);
        let output = match cmd.execute().await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ffprobe failed");
                return None;
            }
        };
        match parse_probe_output(&output.stdout) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unparseable ffprobe output");
                None
            }
        }
    }

    /// Extract a single scaled frame. Videos default to their midpoint.
    pub async fn thumbnail(
        &self,
        input: &Path,
        out: &Path,
        max_size: u32,
        frame_time: Option<f64>,
    ) -> bool {
        let frame_time = match frame_time {
            Some(t) => t,
            None => match self.probe(input).await {
                Some(MediaInfo {
                    is_video: true,
                    duration: Some(d),
                    ..
                }) => d / 2.0,
                _ => 0.0,
            },
        };
        self.render("thumbnail", thumbnail_args(input, out, max_size, frame_time), out)
            .await
    }

    /// Extract a single scaled frame from a printf-style sequence pattern.
    pub async fn sequence_thumbnail(
        &self,
        pattern: &Path,
        out: &Path,
        max_size: u32,
        frame_number: Option<u64>,
    ) -> bool {
        self.render(
            "sequence_thumbnail",
            sequence_thumbnail_args(pattern, out, max_size, frame_number),
            out,
        )
        .await
    }

    /// Re-encode a short, low-resolution H.264 clip without audio.
    pub async fn video_preview(
        &self,
        input: &Path,
        out: &Path,
        max_size: u32,
        duration_cap: u32,
    ) -> bool {
        self.render(
            "video_preview",
            video_preview_args(input, out, max_size, duration_cap),
            out,
        )
        .await
    }

    /// Encode a low-resolution clip from the head of an image sequence.
    pub async fn sequence_video_preview(
        &self,
        pattern: &Path,
        out: &Path,
        max_size: u32,
        fps: u32,
        start_frame: u64,
        max_frames: Option<u64>,
    ) -> bool {
        self.render(
            "sequence_video_preview",
            sequence_video_args(pattern, out, max_size, fps, start_frame, max_frames),
            out,
        )
        .await
    }

    /// Two-pass palette GIF.
    ///
    /// Pass one writes a palette to a temp file, pass two maps the source
    /// through it. The palette is removed whether or not either pass worked.
    pub async fn gif_preview(&self, input: &Path, out: &Path, opts: &GifOptions) -> bool {
        if !ensure_parent(out) {
            return false;
        }
        let palette = match tempfile::Builder::new()
            .prefix("stax_palette_")
            .suffix(".png")
            .tempfile()
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot create palette file");
                return false;
            }
        };

        if let Err(e) = self
            .ffmpeg_cmd(gif_palette_args(input, &palette, opts))
            .execute()
            .await
        {
            tracing::warn!(input = %input.display(), error = %e, "GIF palette pass failed");
            return false;
        }

        let ok = self
            .render("gif_preview", gif_compose_args(input, &palette, out, opts), out)
            .await;
        if let Err(e) = palette.close() {
            tracing::debug!(error = %e, "Palette cleanup failed");
        }
        ok
    }

    /// Extract frame `frame_number` (zero-based) through a select filter.
    pub async fn extract_frame(&self, input: &Path, frame_number: u64, out: &Path) -> bool {
        self.render("extract_frame", extract_frame_args(input, frame_number, out), out)
            .await
    }

    /// Count video packets. `None` on any failure.
    pub async fn frame_count(&self, path: &Path) -> Option<u64> {
        let mut cmd = ToolCommand::new(&self.ffprobe);
        cmd.args(frame_count_args(path)).timeout(self.timeout);
        let output = cmd.execute().await.ok()?;
        output.stdout.trim().parse().ok()
    }

    /// Open the file in ffplay without waiting for it.
    pub fn play(
        &self,
        path: &Path,
        loop_playback: bool,
        start_time: f64,
    ) -> Option<tokio::process::Child> {
        let mut cmd = ToolCommand::new(&self.ffplay);
        cmd.args(play_args(path, loop_playback, start_time));
        match cmd.spawn_detached() {
            Ok(child) => Some(child),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Playback failed");
                None
            }
        }
    }
}

/// Delete a previous render at `out` so only fresh output counts.
fn remove_stale(out: &Path) -> bool {
    match std::fs::remove_file(out) {
        Ok(()) => {
            tracing::debug!(out = %out.display(), "Replacing previous preview");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(out = %out.display(), error = %e, "Cannot replace previous preview");
            false
        }
    }
}

fn ensure_parent(out: &Path) -> bool {
    match out.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => match std::fs::create_dir_all(dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot create output directory");
                false
            }
        },
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

fn parse_probe_output(json: &str) -> Result<MediaInfo, serde_json::Error> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let mut info = MediaInfo::default();

    if let Some(format) = probe.format {
        info.format = format.format_name;
        info.duration = format.duration.and_then(|d| d.parse::<f64>().ok());
    }

    let video = probe
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    if let Some(stream) = video {
        info.width = stream.width;
        info.height = stream.height;
        info.codec = stream.codec_name;
        info.fps = stream.r_frame_rate.as_deref().and_then(parse_frame_rate);
        match info.duration {
            Some(d) if d > VIDEO_DURATION_THRESHOLD => info.is_video = true,
            _ => info.is_image = true,
        }
    }

    Ok(info)
}

/// Parse a rational like `"24000/1001"`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

// ---------------------------------------------------------------------------
// Argument builders
// ---------------------------------------------------------------------------

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

fn fit_filter(max_size: u32) -> String {
    format!("scale={max_size}:{max_size}:force_original_aspect_ratio=decrease")
}

/// H.264 needs even dimensions.
fn fit_filter_even(max_size: u32) -> String {
    format!("{}:force_divisible_by=2", fit_filter(max_size))
}

pub fn probe_args(path: &Path) -> Vec<OsString> {
    vec![
        os("-v"),
        os("quiet"),
        os("-print_format"),
        os("json"),
        os("-show_format"),
        os("-show_streams"),
        os(path),
    ]
}

pub fn thumbnail_args(input: &Path, out: &Path, max_size: u32, frame_time: f64) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-ss"),
        os(frame_time.to_string()),
        os("-i"),
        os(input),
        os("-vframes"),
        os("1"),
        os("-vf"),
        os(fit_filter(max_size)),
        os("-q:v"),
        os("2"),
        os(out),
    ]
}

pub fn sequence_thumbnail_args(
    pattern: &Path,
    out: &Path,
    max_size: u32,
    frame_number: Option<u64>,
) -> Vec<OsString> {
    let mut args = vec![os("-y")];
    if let Some(n) = frame_number {
        args.extend([os("-start_number"), os(n.to_string())]);
    }
    args.extend([
        os("-i"),
        os(pattern),
        os("-vframes"),
        os("1"),
        os("-vf"),
        os(fit_filter(max_size)),
        os("-q:v"),
        os("2"),
        os(out),
    ]);
    args
}

pub fn video_preview_args(
    input: &Path,
    out: &Path,
    max_size: u32,
    duration_cap: u32,
) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        os(input),
        os("-t"),
        os(duration_cap.to_string()),
        os("-vf"),
        os(fit_filter_even(max_size)),
        os("-c:v"),
        os("libx264"),
        os("-preset"),
        os("fast"),
        os("-crf"),
        os("28"),
        os("-pix_fmt"),
        os("yuv420p"),
        os("-an"),
        os(out),
    ]
}

pub fn sequence_video_args(
    pattern: &Path,
    out: &Path,
    max_size: u32,
    fps: u32,
    start_frame: u64,
    max_frames: Option<u64>,
) -> Vec<OsString> {
    let mut args = vec![
        os("-y"),
        os("-start_number"),
        os(start_frame.to_string()),
        os("-framerate"),
        os(fps.to_string()),
        os("-i"),
        os(pattern),
    ];
    if let Some(n) = max_frames {
        args.extend([os("-frames:v"), os(n.to_string())]);
    }
    args.extend([
        os("-vf"),
        os(fit_filter_even(max_size)),
        os("-c:v"),
        os("libx264"),
        os("-preset"),
        os("fast"),
        os("-crf"),
        os("28"),
        os("-pix_fmt"),
        os("yuv420p"),
        os(out),
    ]);
    args
}

fn gif_input_args(input: &Path, opts: &GifOptions) -> Vec<OsString> {
    let mut args = Vec::new();
    if opts.is_sequence {
        if let Some(start) = opts.start_frame {
            args.extend([os("-start_number"), os(start.to_string())]);
        }
        args.extend([os("-framerate"), os(opts.sequence_fps.to_string())]);
    }
    args.extend([os("-i"), os(input)]);
    args
}

fn gif_duration_args(opts: &GifOptions) -> Vec<OsString> {
    match opts.max_duration {
        Some(d) => vec![os("-t"), os(d.to_string())],
        None => Vec::new(),
    }
}

/// Trim, resample, fit and pad to a square canvas.
fn gif_filter(opts: &GifOptions) -> String {
    let skip = if opts.is_sequence {
        0
    } else {
        opts.start_frame.unwrap_or(0)
    };
    let trim = match (skip, opts.max_frames) {
        (0, None) => None,
        (s, None) => Some(format!("trim=start_frame={s}")),
        (0, Some(n)) => Some(format!("trim=end_frame={n}")),
        (s, Some(n)) => Some(format!("trim=start_frame={s}:end_frame={}", s + n)),
    };
    let size = opts.size;
    let body = format!(
        "fps={},scale=w={size}:h={size}:force_original_aspect_ratio=decrease,\
         pad={size}:{size}:(ow-iw)/2:(oh-ih)/2:color=black",
        opts.fps
    );
    match trim {
        Some(trim) => format!("{trim},setpts=PTS-STARTPTS,{body}"),
        None => body,
    }
}

pub fn gif_palette_args(input: &Path, palette: &Path, opts: &GifOptions) -> Vec<OsString> {
    let mut args = vec![os("-y")];
    args.extend(gif_input_args(input, opts));
    args.extend(gif_duration_args(opts));
    args.extend([
        os("-vf"),
        os(format!("{},palettegen", gif_filter(opts))),
        os(palette),
    ]);
    args
}

pub fn gif_compose_args(
    input: &Path,
    palette: &Path,
    out: &Path,
    opts: &GifOptions,
) -> Vec<OsString> {
    let mut args = vec![os("-y")];
    args.extend(gif_input_args(input, opts));
    args.extend([os("-i"), os(palette)]);
    args.extend(gif_duration_args(opts));
    args.extend([
        os("-filter_complex"),
        os(format!("{}[x];[x][1:v]paletteuse", gif_filter(opts))),
        os("-loop"),
        os(if opts.loop_forever { "0" } else { "-1" }),
        os(out),
    ]);
    args
}

pub fn extract_frame_args(input: &Path, frame_number: u64, out: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        os(input),
        os("-vf"),
        os(format!("select=eq(n\\,{frame_number})")),
        os("-vframes"),
        os("1"),
        os(out),
    ]
}

pub fn frame_count_args(path: &Path) -> Vec<OsString> {
    vec![
        os("-v"),
        os("error"),
        os("-select_streams"),
        os("v:0"),
        os("-count_packets"),
        os("-show_entries"),
        os("stream=nb_read_packets"),
        os("-of"),
        os("csv=p=0"),
        os(path),
    ]
}

pub fn play_args(path: &Path, loop_playback: bool, start_time: f64) -> Vec<OsString> {
    let mut args = vec![os("-autoexit")];
    if loop_playback {
        args.extend([os("-loop"), os("0")]);
    }
    if start_time > 0.0 {
        args.extend([os("-ss"), os(start_time.to_string())]);
    }
    args.push(os(path));
    args
}
