//! The `stax ingest` command.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, ValueEnum};
use serde::Serialize;
use stax_core::{
    BatchOptions, BatchReport, Config, CopyPolicy, Element, InMemoryCatalog, IngestOptions,
    IngestionCore, IngestionLogEntry, OutputWriter,
};
use tokio_util::sync::CancellationToken;

use super::OutputFormat;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Files, sequence frames or folders to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Repository root of the target stack
    #[arg(long, env = "STAX_STACK_PATH")]
    pub stack_path: PathBuf,

    /// Name of the list receiving the elements
    #[arg(long, default_value = "default")]
    pub list: String,

    /// Copy policy (defaults to `library.default_copy_policy`)
    #[arg(long, value_enum)]
    pub copy: Option<CopyArg>,

    /// Descend into sub-folders
    #[arg(short, long)]
    pub recursive: bool,

    /// Comment stored on every element
    #[arg(long)]
    pub comment: Option<String>,

    /// Comma-separated tags stored on every element
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Skip thumbnail, GIF and clip generation
    #[arg(long)]
    pub no_previews: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CopyArg {
    Soft,
    Hard,
}

impl From<CopyArg> for CopyPolicy {
    fn from(arg: CopyArg) -> Self {
        match arg {
            CopyArg::Soft => CopyPolicy::Soft,
            CopyArg::Hard => CopyPolicy::Hard,
        }
    }
}

/// One line of ingest output.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum IngestRecord<'a> {
    Element(&'a Element),
    Log(&'a IngestionLogEntry),
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, mut config: Config) -> anyhow::Result<()> {
    if args.no_previews {
        config.library.generate_previews = false;
    }

    let stack_path = expand(&args.stack_path);
    let catalog = Arc::new(InMemoryCatalog::new());
    let stack_name = stack_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "library".to_string());
    let stack = catalog.add_stack(&stack_name, &stack_path);
    let list = catalog.add_list(stack.id, &args.list, None);

    let mut options = IngestOptions::from_config(&config);
    if let Some(copy) = args.copy {
        options = options.with_copy_policy(copy.into());
    }
    options.comment = args.comment.clone();
    options.tags = args.tags.iter().map(|t| t.trim().to_string()).collect();

    let core = IngestionCore::new(config, catalog.clone())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing the current item");
            on_interrupt.cancel();
        }
    });

    let progress = create_progress_bar();
    let bar = progress.clone();
    let batch = BatchOptions::default()
        .with_cancel(cancel)
        .with_progress(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        });

    let start_time = Instant::now();
    let report = core
        .ingest_paths(&args.paths, list.id, args.recursive, &options, &batch)
        .await;
    progress.finish_and_clear();

    for item in &report.items {
        if let Err(e) = &item.result {
            tracing::warn!(source = %item.source.display(), error = %e, "Ingest failed");
        }
    }

    let elements = catalog.elements();
    let history = catalog.history();
    let records: Vec<IngestRecord<'_>> = elements
        .iter()
        .map(IngestRecord::Element)
        .chain(history.iter().map(IngestRecord::Log))
        .collect();

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, args.format.into(), true);
    writer.write_all(&records)?;
    writer.flush()?;
    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }

    print_summary(&report, start_time.elapsed());
    Ok(())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn create_progress_bar() -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => tracing::debug!(error = %e, "Falling back to the default progress style"),
    }
    pb
}

fn print_summary(report: &BatchReport, elapsed: std::time::Duration) {
    let (succeeded, failed) = (report.succeeded(), report.failed());

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Ingested:     {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    if report.cancelled {
        eprintln!("    (cancelled before the end)");
    }
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}
