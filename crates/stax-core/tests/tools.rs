#![cfg(unix)]

mod common;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use stax_core::pipeline::detect_sequence;
use stax_core::process::Supervision;
use stax_core::{GeometryConverter, GifOptions, HeadlessTool, Transcoder};

#[test]
fn shots_in_one_directory_stay_separate() {
    let dir = tempfile::tempdir().unwrap();
    for frame in 1001..=1010 {
        common::touch(&dir.path().join(format!("shot001.{frame}.exr")));
    }
    for frame in 2001..=2005 {
        common::touch(&dir.path().join(format!("shot002.{frame}.exr")));
    }

    let first = detect_sequence(&dir.path().join("shot001.1001.exr"), None, true).unwrap();
    assert_eq!(first.frame_count, 10);
    assert_eq!(first.frame_range, "1001-1010");

    let second = detect_sequence(&dir.path().join("shot002.2001.exr"), None, true).unwrap();
    assert_eq!(second.frame_count, 5);
    assert_eq!(second.frame_range, "2001-2005");
}

#[test]
fn mixed_digit_widths_merge() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["image.1.exr", "image.10.exr", "image.003.exr"] {
        common::touch(&dir.path().join(name));
    }
    let info = detect_sequence(&dir.path().join("image.1.exr"), None, true).unwrap();
    assert_eq!(info.frame_range, "1-10");
    assert_eq!(info.frame_numbers, vec![1, 3, 10]);
    assert_eq!(info.padding, 1);
}

#[test]
fn lone_file_is_never_a_sequence() {
    let dir = tempfile::tempdir().unwrap();
    common::touch(&dir.path().join("plate.0001.exr"));
    let file = dir.path().join("plate.0001.exr");
    assert!(detect_sequence(&file, None, true).is_none());
    for key in [".####.ext", "_####.ext", " ####.ext", "-####.ext"] {
        assert!(detect_sequence(&file, Some(key), true).is_none());
    }
}

fn converter(blender: PathBuf, idle: Duration) -> GeometryConverter {
    GeometryConverter::new(HeadlessTool::new(Some(blender), Supervision { idle, hard: None }))
}

#[tokio::test]
async fn glb_conversion_is_a_byte_copy() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("blender-ran");
    let blender = common::fake_tool(
        dir.path(),
        "blender",
        &format!("touch '{}'", marker.display()),
    );
    let input = dir.path().join("asset.glb");
    std::fs::write(&input, common::minimal_glb()).unwrap();
    let output = dir.path().join("proxy/asset.glb");

    let report = converter(blender, Duration::from_secs(5))
        .convert(&input, &output)
        .await;
    assert!(report.success, "{:?}", report.attempts);
    assert_eq!(
        std::fs::metadata(&output).unwrap().len(),
        std::fs::metadata(&input).unwrap().len()
    );
    assert!(!marker.exists());
}

#[tokio::test]
async fn silent_headless_tool_is_terminated() {
    let dir = tempfile::tempdir().unwrap();
    let blender = common::fake_tool(dir.path(), "blender", "echo starting\nexec sleep 60");
    let input = dir.path().join("asset.fbx");
    common::touch(&input);
    let output = dir.path().join("asset.glb");

    let started = Instant::now();
    let report = converter(blender, Duration::from_millis(500))
        .convert(&input, &output)
        .await;
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(!report.success);
    assert!(report.message().contains("timed out"), "{}", report.message());
    assert!(!output.exists());
}

#[tokio::test]
async fn gif_without_duration_cap_has_no_time_argument() {
    let dir = tempfile::tempdir().unwrap();
    let bin = common::fake_transcoder_bin(dir.path());
    let transcoder = Transcoder::new(Some(&bin)).unwrap();
    let input = dir.path().join("clip.mov");
    common::touch(&input);
    let output = dir.path().join("gif/clip.gif");
    let opts = GifOptions {
        max_duration: None,
        max_frames: Some(12),
        ..GifOptions::default()
    };

    assert!(transcoder.gif_preview(&input, &output, &opts).await);
    assert!(output.exists());

    let log = common::ffmpeg_log(&bin);
    assert_eq!(log.len(), 2);
    for line in &log {
        assert!(!line.split(' ').any(|a| a == "-t"), "{line}");
        assert!(line.contains("trim=end_frame=12"), "{line}");
    }
    assert!(log[0].contains("palettegen"));
    assert!(log[1].contains("paletteuse"));

    // The palette is gone after the second pass.
    let palette = log[1]
        .split(' ')
        .skip_while(|a| *a != "-i")
        .nth(3)
        .unwrap()
        .to_string();
    assert!(!std::path::Path::new(&palette).exists(), "{palette}");
}
