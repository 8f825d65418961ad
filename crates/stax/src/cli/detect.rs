//! The `stax detect` command.

use std::path::PathBuf;

use clap::Args;
use stax_core::{Config, MetadataExtractor, SequenceDetector};

/// Arguments for the `detect` command.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Any frame of the sequence
    #[arg(required = true)]
    pub file: PathBuf,

    /// Pattern key, e.g. "_####.ext". Empty tries every pattern.
    #[arg(long)]
    pub pattern: Option<String>,
}

/// Execute the detect command.
pub async fn execute(args: DetectArgs, config: Config) -> anyhow::Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("Not a file: {}", args.file.display());
    }

    let detector = SequenceDetector::from_config(&config.sequence);
    let detector = match args.pattern.as_deref() {
        Some(key) => detector.with_pattern(Some(key).filter(|k| !k.is_empty())),
        None => detector,
    };

    match detector.detect(&args.file) {
        Some(info) => {
            tracing::info!(
                pattern = %info.display_pattern(),
                frames = info.frame_count,
                size = MetadataExtractor::sequence_size(&info.files),
                "Sequence detected"
            );
            super::print_json(&info)
        }
        None => {
            tracing::info!("{} is not part of a sequence", args.file.display());
            println!("null");
            Ok(())
        }
    }
}
