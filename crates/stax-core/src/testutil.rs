//! Fixtures shared by unit tests.

use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script standing in for an external tool.
#[cfg(unix)]
pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Fake ffmpeg/ffprobe/ffplay trio in `dir`.
///
/// ffmpeg appends its argv to `ffmpeg.log` and creates its last argument.
/// ffprobe reports a 4 second 1920x1080 clip.
#[cfg(unix)]
pub(crate) fn fake_transcoder(dir: &Path) {
    let log = dir.join("ffmpeg.log");
    fake_tool(
        dir,
        "ffmpeg",
        &format!(
            r#"echo "$@" >> '{}'
for last; do :; done
touch "$last""#,
            log.display()
        ),
    );
    fake_tool(
        dir,
        "ffprobe",
        r#"case "$*" in
  *count_packets*) echo 240 ;;
  *) echo '{"format":{"format_name":"mov","duration":"10.0"},"streams":[{"codec_type":"video","codec_name":"h264","width":1920,"height":1080,"r_frame_rate":"24/1"}]}' ;;
esac"#,
    );
    fake_tool(dir, "ffplay", "exit 0");
}

/// Smallest valid GLB: a header and an `asset`-only JSON chunk.
pub(crate) fn minimal_glb() -> Vec<u8> {
    let mut json = br#"{"asset":{"version":"2.0"}}"#.to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let total = 12 + 8 + json.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out
}
