//! The `stax probe` command.

use std::path::PathBuf;

use clap::Args;
use stax_core::{Config, Transcoder};

/// Arguments for the `probe` command.
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Media file to inspect
    #[arg(required = true)]
    pub file: PathBuf,
}

/// Execute the probe command.
pub async fn execute(args: ProbeArgs, config: Config) -> anyhow::Result<()> {
    let transcoder = Transcoder::from_config(&config)?;
    match transcoder.probe(&args.file).await {
        Some(info) => super::print_json(&info),
        None => anyhow::bail!("ffprobe could not read {}", args.file.display()),
    }
}
