//! The `stax glb` command for geometry conversion.

use std::path::PathBuf;

use clap::Args;
use stax_core::{Config, GeometryConverter};

/// Arguments for the `glb` command.
#[derive(Args, Debug)]
pub struct GlbArgs {
    /// Geometry file (.glb, .gltf, .fbx, .obj, .abc, ...)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Destination GLB
    #[arg(required = true)]
    pub output: PathBuf,
}

/// Execute the glb command.
pub async fn execute(args: GlbArgs, config: Config) -> anyhow::Result<()> {
    let converter = GeometryConverter::from_config(&config);
    let report = converter.convert(&args.input, &args.output).await;

    for attempt in &report.attempts {
        eprintln!("  {attempt}");
    }
    if !report.success {
        return Err(report.into_error(&args.input).into());
    }
    tracing::info!("GLB written to {:?}", report.output);
    super::print_json(&report)
}
