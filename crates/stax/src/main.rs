//! StaX CLI - ingest media and geometry into a managed asset library.
//!
//! StaX folds numbered frames into sequences, copies or references sources,
//! and renders thumbnails, GIFs, clips and GLB proxies with external tools.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a folder of plates into a list
//! stax ingest ./incoming --stack-path /mnt/library/plates --list shot010
//!
//! # Inspect a frame sequence
//! stax detect renders/shot010.1001.exr
//!
//! # Convert geometry to a GLB proxy
//! stax glb robot.fbx robot.glb
//!
//! # View configuration
//! stax config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// StaX - asset ingestion for media and geometry libraries.
#[derive(Parser, Debug)]
#[command(name = "stax")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest files, sequences and folders into a list
    Ingest(cli::ingest::IngestArgs),

    /// Show the frame sequence a file belongs to
    Detect(cli::detect::DetectArgs),

    /// Print ffprobe information for a media file
    Probe(cli::probe::ProbeArgs),

    /// Convert a geometry file to a GLB proxy
    Glb(cli::glb::GlbArgs),

    /// Render previews with the background worker pool
    Preview(cli::preview::PreviewArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match stax_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `stax config path`."
            );
            stax_core::Config::default()
        }
    };
    logging::init(&logging::LogSettings::resolve(
        &config.logging,
        cli.verbose,
        cli.json_logs,
    ));

    tracing::debug!("StaX v{}", stax_core::VERSION);

    match cli.command {
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::Detect(args) => cli::detect::execute(args, config).await,
        Commands::Probe(args) => cli::probe::execute(args, config).await,
        Commands::Glb(args) => cli::glb::execute(args, config).await,
        Commands::Preview(args) => cli::preview::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
