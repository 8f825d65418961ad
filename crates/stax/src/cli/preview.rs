//! The `stax preview` command: render previews through the worker pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::Args;
use stax_core::{
    Config, MetadataExtractor, OutputFormat, OutputWriter, PreviewEvent, PreviewMedia,
    PreviewPool, PreviewTask, SequenceDetector, Transcoder,
};

/// Arguments for the `preview` command.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Images, sequence frames or videos
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Directory receiving the previews
    #[arg(long)]
    pub out: PathBuf,

    /// Number of workers (defaults to `workers.count`)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Execute the preview command.
pub async fn execute(args: PreviewArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(workers) = args.workers {
        config.workers.count = workers;
    }
    let transcoder = Transcoder::from_config(&config)?;
    let detector = SequenceDetector::from_config(&config.sequence);
    let tasks = plan(&args.paths, &args.out, &detector);
    if tasks.is_empty() {
        tracing::warn!("Nothing to preview");
        return Ok(());
    }
    tracing::info!("Rendering {} preview(s)", tasks.len());

    let (pool, mut events) = PreviewPool::start(transcoder, &config);
    let expected = tasks.len();
    for task in tasks {
        pool.submit(task);
    }

    let mut writer = OutputWriter::new(std::io::stdout().lock(), OutputFormat::JsonLines, false);
    let mut finished = 0;
    while finished < expected {
        let Some(event) = events.recv().await else {
            break;
        };
        if matches!(
            event,
            PreviewEvent::Completed { .. } | PreviewEvent::Failed { .. }
        ) {
            finished += 1;
        }
        writer.write(&event)?;
    }
    writer.flush()?;

    pool.stop().await;
    Ok(())
}

/// One task per still, plus a GIF for videos. Frames of a sequence collapse
/// into a single task.
fn plan(paths: &[PathBuf], out: &Path, detector: &SequenceDetector) -> Vec<PreviewTask> {
    let mut tasks = Vec::new();
    let mut covered = HashSet::new();

    for (index, path) in paths.iter().enumerate() {
        if !path.is_file() {
            continue;
        }
        // Detected frames come back canonicalized.
        let path = &std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        if covered.contains(path) {
            continue;
        }
        let element_id = index as i64 + 1;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| element_id.to_string());

        if let Some(info) = detector.detect(path) {
            covered.extend(info.files.iter().cloned());
            tasks.push(PreviewTask {
                element_id,
                source: info.printf_path(),
                output: out.join(format!("{}.png", info.base_name)),
                media: PreviewMedia::Sequence {
                    start_frame: Some(info.first_frame),
                },
            });
        } else if MetadataExtractor::is_video_extension(path) {
            tasks.push(PreviewTask {
                element_id,
                source: path.clone(),
                output: out.join(format!("{stem}.png")),
                media: PreviewMedia::Video,
            });
            tasks.push(PreviewTask {
                element_id,
                source: path.clone(),
                output: out.join(format!("{stem}.gif")),
                media: PreviewMedia::Gif,
            });
        } else if MetadataExtractor::is_image_extension(path) {
            tasks.push(PreviewTask {
                element_id,
                source: path.clone(),
                output: out.join(format!("{stem}.png")),
                media: PreviewMedia::Image,
            });
        } else {
            tracing::debug!(path = %path.display(), "No preview for this file type");
        }
    }
    tasks
}
