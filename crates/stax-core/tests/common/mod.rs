//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

#[path = "../../src/testutil.rs"]
mod fixtures;

pub(crate) use fixtures::{fake_tool, minimal_glb};

/// ffmpeg, ffprobe and ffplay stand-ins in their own `bin` directory.
/// ffmpeg logs one argv per line to `ffmpeg.log` and touches its last
/// argument; ffprobe reports a 10 second clip.
pub fn fake_transcoder_bin(dir: &Path) -> PathBuf {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    fixtures::fake_transcoder(&bin);
    bin
}

pub fn ffmpeg_log(bin: &Path) -> Vec<String> {
    std::fs::read_to_string(bin.join("ffmpeg.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"frame").unwrap();
}
