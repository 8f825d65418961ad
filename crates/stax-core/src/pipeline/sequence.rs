//! Numbered frame sequence detection.
//!
//! A file such as `shot010.1001.exr` is matched against one of four
//! separator patterns, and its siblings sharing base name, separator and
//! extension are gathered into a single [`SequenceInfo`]. Detection never
//! fails: unreadable directories and lone files simply yield `None`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::config::SequenceConfig;

static DOT_RE: LazyLock<Regex> = LazyLock::new(|| separator_regex(r"\."));
static UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| separator_regex("_"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| separator_regex(" "));
static DASH_RE: LazyLock<Regex> = LazyLock::new(|| separator_regex("-"));

fn separator_regex(sep: &str) -> Regex {
    Regex::new(&format!(
        r"^(?P<base>.+?){sep}(?P<frame>\d+)(?P<ext>\.[A-Za-z0-9_]+)$"
    ))
    .expect("Sequence pattern must compile")
}

/// One of the four supported `<base><sep><digits><.ext>` layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequencePattern {
    #[serde(rename = ".####.ext")]
    Dot,
    #[serde(rename = "_####.ext")]
    Underscore,
    #[serde(rename = " ####.ext")]
    Space,
    #[serde(rename = "-####.ext")]
    Dash,
}

impl SequencePattern {
    /// Auto-detection priority order.
    pub const ALL: [SequencePattern; 4] = [
        SequencePattern::Dot,
        SequencePattern::Underscore,
        SequencePattern::Space,
        SequencePattern::Dash,
    ];

    /// The pattern identifier used in configuration.
    pub fn key(&self) -> &'static str {
        match self {
            SequencePattern::Dot => ".####.ext",
            SequencePattern::Underscore => "_####.ext",
            SequencePattern::Space => " ####.ext",
            SequencePattern::Dash => "-####.ext",
        }
    }

    /// Parse a configuration key. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    pub fn separator(&self) -> char {
        match self {
            SequencePattern::Dot => '.',
            SequencePattern::Underscore => '_',
            SequencePattern::Space => ' ',
            SequencePattern::Dash => '-',
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            SequencePattern::Dot => &DOT_RE,
            SequencePattern::Underscore => &UNDERSCORE_RE,
            SequencePattern::Space => &SPACE_RE,
            SequencePattern::Dash => &DASH_RE,
        }
    }

    /// Split a file name into (base, digits, extension).
    fn split<'a>(&self, file_name: &'a str) -> Option<(&'a str, &'a str, &'a str)> {
        let caps = self.regex().captures(file_name)?;
        Some((
            caps.name("base")?.as_str(),
            caps.name("frame")?.as_str(),
            caps.name("ext")?.as_str(),
        ))
    }
}

impl std::fmt::Display for SequencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A detected frame sequence. Always holds at least two frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceInfo {
    /// Common file stem, e.g. `shot010`
    pub base_name: String,
    pub separator: char,
    /// Digit width of the file detection started from
    pub padding: usize,
    /// Extension with leading dot, as spelled by the starting file
    pub extension: String,
    /// Directory the frames live in
    pub directory: PathBuf,
    /// Frame files, ascending by frame number
    pub files: Vec<PathBuf>,
    pub frame_numbers: Vec<u64>,
    /// `"first-last"`
    pub frame_range: String,
    pub first_frame: u64,
    pub last_frame: u64,
    #[serde(rename = "pattern_key")]
    pub pattern: SequencePattern,
    pub frame_count: usize,
}

impl SequenceInfo {
    /// Human-readable pattern, e.g. `shot010.####.exr`.
    pub fn display_pattern(&self) -> String {
        format!(
            "{}{}{}{}",
            self.base_name,
            self.separator,
            "#".repeat(self.padding),
            self.extension
        )
    }

    /// Zero-padded printf-style pattern, e.g. `shot010.%04d.exr`.
    pub fn printf_pattern(&self) -> String {
        format!(
            "{}{}%0{}d{}",
            self.base_name, self.separator, self.padding, self.extension
        )
    }

    pub fn display_path(&self) -> PathBuf {
        self.directory.join(self.display_pattern())
    }

    /// Full printf-style path, suitable as transcoder input.
    pub fn printf_path(&self) -> PathBuf {
        self.directory.join(self.printf_pattern())
    }

    /// The frame at the middle of the sequence, used for still thumbnails.
    pub fn middle(&self) -> (&Path, u64) {
        let idx = self.frame_count / 2;
        (&self.files[idx], self.frame_numbers[idx])
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path)
    }
}

/// Groups numbered frame files found next to a given file.
#[derive(Debug, Clone)]
pub struct SequenceDetector {
    auto_detect: bool,
    pattern: Option<SequencePattern>,
}

impl Default for SequenceDetector {
    fn default() -> Self {
        Self {
            auto_detect: true,
            pattern: None,
        }
    }
}

impl SequenceDetector {
    /// Create a detector. An unknown or empty `pattern_key` means "try all".
    pub fn new(auto_detect: bool, pattern_key: Option<&str>) -> Self {
        let pattern = pattern_key.and_then(|key| {
            let parsed = SequencePattern::from_key(key);
            if parsed.is_none() && !key.is_empty() {
                tracing::warn!(key, "Unknown sequence pattern key, auto-detecting");
            }
            parsed
        });
        Self {
            auto_detect,
            pattern,
        }
    }

    pub fn from_config(config: &SequenceConfig) -> Self {
        Self::new(config.auto_detect, Some(config.pattern.as_str()))
    }

    /// Return a copy of this detector using a different pattern key.
    pub fn with_pattern(&self, pattern_key: Option<&str>) -> Self {
        Self::new(self.auto_detect, pattern_key)
    }

    /// Detect the sequence `path` belongs to, if any.
    pub fn detect(&self, path: &Path) -> Option<SequenceInfo> {
        if !self.auto_detect {
            return None;
        }
        match self.pattern {
            Some(pattern) => detect_with(path, pattern),
            None => SequencePattern::ALL
                .into_iter()
                .find_map(|pattern| detect_with(path, pattern)),
        }
    }
}

/// Detect a sequence with one specific pattern.
pub fn detect_with(path: &Path, pattern: SequencePattern) -> Option<SequenceInfo> {
    let file_name = path.file_name()?.to_str()?;
    let (base, digits, ext) = pattern.split(file_name)?;
    let padding = digits.len();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let directory = std::fs::canonicalize(parent).ok()?;
    let entries = match std::fs::read_dir(&directory) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %directory.display(), error = %e, "Cannot list directory");
            return None;
        }
    };

    // frame -> (file name, digit width)
    let mut frames: BTreeMap<u64, (String, usize)> = BTreeMap::new();
    for entry in entries.filter_map(|e| e.ok()) {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some((sib_base, sib_digits, sib_ext)) = pattern.split(name) else {
            continue;
        };
        if sib_base != base || !sib_ext.eq_ignore_ascii_case(ext) {
            continue;
        }
        let Ok(frame) = sib_digits.parse::<u64>() else {
            continue;
        };
        let width = sib_digits.len();
        match frames.get(&frame) {
            Some((kept, kept_width)) => {
                let prefer_new = if *kept_width == padding {
                    false
                } else if width == padding {
                    true
                } else {
                    name < kept.as_str()
                };
                if prefer_new {
                    frames.insert(frame, (name.to_string(), width));
                }
            }
            None => {
                frames.insert(frame, (name.to_string(), width));
            }
        }
    }

    if frames.len() < 2 {
        return None;
    }

    let frame_numbers: Vec<u64> = frames.keys().copied().collect();
    let files: Vec<PathBuf> = frames
        .values()
        .map(|(name, _)| directory.join(name))
        .collect();
    let first_frame = frame_numbers[0];
    let last_frame = frame_numbers[frame_numbers.len() - 1];

    tracing::debug!(
        base,
        pattern = pattern.key(),
        frames = files.len(),
        "Detected sequence"
    );

    Some(SequenceInfo {
        base_name: base.to_string(),
        separator: pattern.separator(),
        padding,
        extension: ext.to_string(),
        directory,
        frame_count: files.len(),
        files,
        frame_numbers,
        frame_range: format!("{first_frame}-{last_frame}"),
        first_frame,
        last_frame,
        pattern,
    })
}

/// Convenience wrapper mirroring the detector's constructor arguments.
pub fn detect_sequence(
    path: &Path,
    pattern_key: Option<&str>,
    auto_detect: bool,
) -> Option<SequenceInfo> {
    SequenceDetector::new(auto_detect, pattern_key).detect(path)
}
