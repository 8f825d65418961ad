//! Multi-file and folder ingestion with sequence folding and cancellation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{normalize_path, IngestOptions, IngestionCore};
use crate::catalog::Element;
use crate::error::{IngestError, IngestResult};

/// Called with `(done, total)` after each source.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Batch-level controls.
#[derive(Clone, Default)]
pub struct BatchOptions {
    /// Checked between items
    pub cancel: Option<CancellationToken>,
    pub progress: Option<ProgressFn>,
}

impl BatchOptions {
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    fn report(&self, done: usize, total: usize) {
        if let Some(ref progress) = self.progress {
            progress(done, total);
        }
    }
}

/// Outcome for one submitted source.
#[derive(Debug)]
pub struct BatchItem {
    pub source: PathBuf,
    pub result: IngestResult<Element>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    /// The batch stopped early on request
    pub cancelled: bool,
}

impl BatchReport {
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.items.iter().filter_map(|i| i.result.as_ref().ok())
    }

    pub fn succeeded(&self) -> usize {
        self.elements().count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

impl IngestionCore {
    /// Ingest each source once.
    ///
    /// Paths are de-duplicated after normalization, and every frame of a
    /// sequence already submitted is skipped.
    pub async fn ingest_multiple(
        &self,
        sources: &[PathBuf],
        list_id: i64,
        options: &IngestOptions,
        batch: &BatchOptions,
    ) -> BatchReport {
        let total = sources.len();
        let mut processed: HashSet<PathBuf> = HashSet::new();
        let mut report = BatchReport::default();

        for (index, source) in sources.iter().enumerate() {
            if batch.is_cancelled() {
                tracing::info!(done = index, total, "Batch cancelled");
                report.cancelled = true;
                break;
            }

            let path = normalize_path(source);
            if processed.insert(path.clone()) {
                if let Some(sequence) = self.detector().detect(&path) {
                    processed.extend(sequence.files);
                }
                let result = self.ingest(&path, list_id, options).await;
                report.items.push(BatchItem {
                    source: path,
                    result,
                });
            } else {
                tracing::debug!(path = %path.display(), "Already ingested");
            }
            batch.report(index + 1, total);
        }

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Batch complete"
        );
        report
    }

    /// Ingest a mix of files and folders as one batch.
    ///
    /// Folders are expanded first so a file named directly and reached
    /// through its folder is ingested once.
    pub async fn ingest_paths(
        &self,
        paths: &[PathBuf],
        list_id: i64,
        recursive: bool,
        options: &IngestOptions,
        batch: &BatchOptions,
    ) -> BatchReport {
        let sources = collect_sources(paths, recursive);
        tracing::info!(paths = paths.len(), sources = sources.len(), "Ingesting paths");
        self.ingest_multiple(&sources, list_id, options, batch).await
    }

    /// Ingest every regular file in `folder`, sorted by path.
    pub async fn ingest_folder(
        &self,
        folder: &Path,
        list_id: i64,
        recursive: bool,
        options: &IngestOptions,
        batch: &BatchOptions,
    ) -> IngestResult<BatchReport> {
        if !folder.is_dir() {
            return Err(IngestError::SourceNotFound(folder.to_path_buf()));
        }
        let files = list_files(folder, recursive);
        tracing::info!(folder = %folder.display(), files = files.len(), recursive, "Ingesting folder");
        Ok(self.ingest_multiple(&files, list_id, options, batch).await)
    }
}

/// Expand folders to their files, keeping plain paths in place.
///
/// Paths that are not directories pass through untouched, so a missing
/// source is still reported per item.
pub fn collect_sources(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|path| {
            if path.is_dir() {
                list_files(path, recursive)
            } else {
                vec![path.clone()]
            }
        })
        .collect()
}

/// Regular files under `folder`, hidden entries skipped.
pub(crate) fn list_files(folder: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}
