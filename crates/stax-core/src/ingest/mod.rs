//! Ingestion orchestration.
//!
//! One [`IngestionCore::ingest`] call takes a source file through:
//!
//! ```text
//! validate → detect sequence → classify → pre-hook → copy → GLB proxy
//!          → previews → persist → history entry → post-hook
//! ```
//!
//! Every call writes exactly one history entry, whatever the outcome.

mod batch;

pub use batch::{collect_sources, BatchItem, BatchOptions, BatchReport, ProgressFn};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{
    Catalog, Element, ElementList, IngestionLogEntry, IngestionStatus, NewElement,
};
use crate::config::{Config, CopyPolicy};
use crate::error::{IngestError, IngestResult, Result};
use crate::geometry::{is_convertible, GeometryConverter};
use crate::hooks::{CommandHook, HookContext, PostIngestHook, PreIngestHook};
use crate::pipeline::metadata::{lower_extension, AssetType, MetadataExtractor};
use crate::pipeline::sequence::{SequenceDetector, SequenceInfo};
use crate::pipeline::transcoder::{GifOptions, Transcoder};

/// Per-call ingestion choices.
#[derive(Clone, Default)]
pub struct IngestOptions {
    /// Falls back to `library.default_copy_policy`
    pub copy_policy: Option<CopyPolicy>,
    pub comment: Option<String>,
    pub tags: Vec<String>,
    pub pre_hook: Option<Arc<dyn PreIngestHook>>,
    pub post_hook: Option<Arc<dyn PostIngestHook>>,
}

impl IngestOptions {
    /// Options carrying the hooks named in `[hooks]`.
    pub fn from_config(config: &Config) -> Self {
        let (pre, post) = CommandHook::from_config(config);
        Self {
            copy_policy: Some(config.library.default_copy_policy),
            pre_hook: pre.map(|h| Arc::new(h) as Arc<dyn PreIngestHook>),
            post_hook: post.map(|h| Arc::new(h) as Arc<dyn PostIngestHook>),
            ..Self::default()
        }
    }

    pub fn with_copy_policy(mut self, policy: CopyPolicy) -> Self {
        self.copy_policy = Some(policy);
        self
    }

    pub fn with_pre_hook(mut self, hook: Arc<dyn PreIngestHook>) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    pub fn with_post_hook(mut self, hook: Arc<dyn PostIngestHook>) -> Self {
        self.post_hook = Some(hook);
        self
    }
}

/// Derivative files for one asset, keyed by list and a hash of its name.
#[derive(Debug, Clone)]
struct PreviewPaths {
    thumbnail: PathBuf,
    gif: PathBuf,
    video: PathBuf,
    geometry: PathBuf,
}

impl PreviewPaths {
    fn new(preview_dir: &Path, list_id: i64, name: &str) -> Self {
        let hash = blake3::hash(name.as_bytes()).to_hex();
        let stem = format!("{list_id}_{}", &hash.as_str()[..8]);
        let at = |ext: &str| preview_dir.join(format!("{stem}.{ext}"));
        Self {
            thumbnail: at("png"),
            gif: at("gif"),
            video: at("mp4"),
            geometry: at("glb"),
        }
    }
}

/// State of a single ingest call.
struct IngestTask {
    source: PathBuf,
    list_id: i64,
    name: String,
    asset_type: AssetType,
    sequence: Option<SequenceInfo>,
    copy_policy: CopyPolicy,
    files: Vec<PathBuf>,
    size: u64,
    paths: PreviewPaths,
    hard_dir: Option<PathBuf>,
}

impl IngestTask {
    fn filepath_soft(&self) -> PathBuf {
        match self.sequence {
            Some(ref seq) => seq.display_path(),
            None => self.source.clone(),
        }
    }

    fn filepath_hard(&self) -> Option<PathBuf> {
        let dir = self.hard_dir.as_ref()?;
        Some(match self.sequence {
            Some(ref seq) => dir.join(seq.display_pattern()),
            None => dir.join(self.source.file_name()?),
        })
    }

    /// Hard copy, then soft path, then the original.
    fn conversion_source(&self) -> PathBuf {
        let hard = self
            .hard_dir
            .as_ref()
            .zip(self.source.file_name())
            .map(|(dir, name)| dir.join(name));
        [hard, Some(self.filepath_soft())]
            .into_iter()
            .flatten()
            .find(|p| p.is_file())
            .unwrap_or_else(|| self.source.clone())
    }
}

/// Previews that were actually written.
#[derive(Debug, Default)]
struct Rendered {
    thumbnail: Option<PathBuf>,
    gif: Option<PathBuf>,
    video: Option<PathBuf>,
    geometry: Option<PathBuf>,
}

/// Orchestrates ingestion against a [`Catalog`].
pub struct IngestionCore {
    config: Config,
    catalog: Arc<dyn Catalog>,
    detector: SequenceDetector,
    transcoder: Option<Transcoder>,
    geometry: GeometryConverter,
}

impl IngestionCore {
    /// Build from configuration.
    ///
    /// With previews enabled the transcoder binaries must be present.
    pub fn new(config: Config, catalog: Arc<dyn Catalog>) -> Result<Self> {
        let transcoder = if config.library.generate_previews {
            Some(Transcoder::from_config(&config)?)
        } else {
            None
        };
        let geometry = GeometryConverter::from_config(&config);
        Ok(Self::with_tools(config, catalog, transcoder, geometry))
    }

    /// Build around explicitly constructed tools.
    pub fn with_tools(
        config: Config,
        catalog: Arc<dyn Catalog>,
        transcoder: Option<Transcoder>,
        geometry: GeometryConverter,
    ) -> Self {
        Self {
            detector: SequenceDetector::from_config(&config.sequence),
            config,
            catalog,
            transcoder,
            geometry,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub(crate) fn detector(&self) -> &SequenceDetector {
        &self.detector
    }

    /// Ingest one file (or the sequence it belongs to) into `list_id`.
    pub async fn ingest(
        &self,
        source: &Path,
        list_id: i64,
        options: &IngestOptions,
    ) -> IngestResult<Element> {
        let list = self.catalog.get_list_by_id(list_id).await;
        let label = list
            .as_ref()
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("#{list_id}"));

        let result = self.run(source, list_id, list, options).await;

        let entry = match result {
            Ok((ref element, _)) => IngestionLogEntry {
                action: "ingest".into(),
                source_path: source.to_path_buf(),
                target_list: label,
                status: IngestionStatus::Success,
                message: format!("Ingested {} as element {}", element.name, element.id),
                element_id: Some(element.id),
            },
            Err(ref e) => IngestionLogEntry {
                action: "ingest".into(),
                source_path: source.to_path_buf(),
                target_list: label,
                status: IngestionStatus::Error,
                message: e.to_string(),
                element_id: None,
            },
        };
        if let Err(e) = self.catalog.log_ingestion(entry).await {
            tracing::warn!(
                source = %source.display(),
                error = %e,
                "Could not record ingestion history"
            );
        }

        let (element, context) = result.inspect_err(|e| {
            tracing::error!(source = %source.display(), error = %e, "Ingest failed");
        })?;
        if let Some(ref hook) = options.post_hook {
            hook.notify(&context).await;
        }
        Ok(element)
    }

    async fn run(
        &self,
        source: &Path,
        list_id: i64,
        list: Option<ElementList>,
        options: &IngestOptions,
    ) -> IngestResult<(Element, HookContext)> {
        let source = normalize_path(source);
        if !source.is_file() {
            return Err(IngestError::SourceNotFound(source));
        }
        let list = list.ok_or(IngestError::ListNotFound(list_id))?;
        if self.catalog.get_stack_by_id(list.stack_id).await.is_none() {
            return Err(IngestError::StackNotFound { list_id });
        }

        let mut task = self.plan(source, list_id, options);
        tracing::info!(
            name = %task.name,
            asset_type = %task.asset_type,
            frames = task.files.len(),
            policy = %task.copy_policy,
            "Ingesting"
        );

        if let Some(ref hook) = options.pre_hook {
            let context = self.context(&task, "pre_ingest", None, &Rendered::default());
            let decision = hook.evaluate(&context).await;
            if !decision.proceed {
                return Err(IngestError::HookRejected(
                    decision.message.unwrap_or_else(|| "no reason given".into()),
                ));
            }
        }

        if task.copy_policy == CopyPolicy::Hard {
            let repository = self
                .catalog
                .get_repository_path_for_list(list_id)
                .await
                .ok_or(IngestError::StackNotFound { list_id })?;
            let dir = repository.join(&task.name);
            hard_copy(&task.files, &dir).await?;
            task.hard_dir = Some(dir);
        }

        let mut rendered = Rendered::default();
        if task.asset_type == AssetType::ThreeD && is_convertible(&task.source) {
            let input = task.conversion_source();
            let report = self.geometry.convert(&input, &task.paths.geometry).await;
            if !report.success {
                return Err(report.into_error(&task.source));
            }
            rendered.geometry = Some(report.output);
        }

        if self.config.library.generate_previews && task.asset_type == AssetType::TwoD {
            match self.transcoder {
                Some(ref transcoder) => {
                    self.render_previews(transcoder, &task, &mut rendered)
                        .await
                }
                None => tracing::warn!("Previews enabled but no transcoder available"),
            }
        }

        let fields = NewElement {
            list_id,
            name: task.name.clone(),
            asset_type: task.asset_type,
            filepath_soft: Some(task.filepath_soft()),
            filepath_hard: task.filepath_hard(),
            is_hard_copy: task.hard_dir.is_some(),
            frame_range: task.sequence.as_ref().map(|s| s.frame_range.clone()),
            format: lower_extension(&task.source),
            comment: options.comment.clone(),
            tags: options.tags.clone(),
            preview_path: rendered.thumbnail.clone(),
            gif_preview_path: rendered.gif.clone(),
            video_preview_path: rendered.video.clone(),
            geometry_preview_path: rendered.geometry.clone(),
            file_size: Some(task.size),
        };
        let id = self.catalog.create_element(fields.clone()).await?;
        tracing::info!(element_id = id, name = %task.name, list = %list.name, "Element created");

        let context = self.context(&task, "post_ingest", Some(id), &rendered);
        Ok((Element { id, fields }, context))
    }

    fn plan(&self, source: PathBuf, list_id: i64, options: &IngestOptions) -> IngestTask {
        let sequence = self.detector.detect(&source);
        let (name, files) = match sequence {
            Some(ref seq) => (seq.base_name.clone(), seq.files.clone()),
            None => (
                source
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
                vec![source.clone()],
            ),
        };
        let size = match sequence {
            Some(_) => MetadataExtractor::sequence_size(&files),
            None => MetadataExtractor::file_size(&source),
        };
        IngestTask {
            asset_type: MetadataExtractor::asset_type(&source),
            copy_policy: options
                .copy_policy
                .unwrap_or(self.config.library.default_copy_policy),
            paths: PreviewPaths::new(&self.config.preview_dir(), list_id, &name),
            source,
            list_id,
            name,
            sequence,
            files,
            size,
            hard_dir: None,
        }
    }

    /// Thumbnail always; GIF for video and 2D sequences; clip for sequences.
    /// Failures leave the preview unset.
    async fn render_previews(
        &self,
        transcoder: &Transcoder,
        task: &IngestTask,
        rendered: &mut Rendered,
    ) {
        let size = self.config.preview.size;
        let fps = self.config.sequence.fps;
        let paths = &task.paths;

        let thumbnail_ok = match task.sequence {
            Some(ref seq) => {
                let (frame, _) = seq.middle();
                transcoder
                    .thumbnail(frame, &paths.thumbnail, size, Some(0.0))
                    .await
            }
            None => {
                transcoder
                    .thumbnail(&task.source, &paths.thumbnail, size, None)
                    .await
            }
        };
        rendered.thumbnail = kept("thumbnail", thumbnail_ok, &paths.thumbnail);

        let gif = GifOptions::from_config(&self.config.gif, fps);
        if let Some(ref seq) = task.sequence {
            let pattern = seq.printf_path();
            let ok = transcoder
                .gif_preview(&pattern, &paths.gif, &gif.sequence(seq.first_frame))
                .await;
            rendered.gif = kept("gif", ok, &paths.gif);

            let ok = transcoder
                .sequence_video_preview(
                    &pattern,
                    &paths.video,
                    size,
                    fps,
                    seq.first_frame,
                    Some(self.config.preview.sequence_video_max_frames),
                )
                .await;
            rendered.video = kept("video", ok, &paths.video);
        } else if MetadataExtractor::is_video_extension(&task.source) {
            let ok = transcoder.gif_preview(&task.source, &paths.gif, &gif).await;
            rendered.gif = kept("gif", ok, &paths.gif);
        }
    }

    fn context(
        &self,
        task: &IngestTask,
        stage: &str,
        element_id: Option<i64>,
        rendered: &Rendered,
    ) -> HookContext {
        HookContext {
            stage: stage.to_string(),
            element_id,
            name: task.name.clone(),
            asset_type: task.asset_type,
            source_path: task.source.clone(),
            list_id: task.list_id,
            copy_policy: task.copy_policy,
            is_sequence: task.sequence.is_some(),
            frame_range: task.sequence.as_ref().map(|s| s.frame_range.clone()),
            files: task.files.clone(),
            file_size: task.size,
            filepath_hard: task.filepath_hard(),
            preview_path: rendered.thumbnail.clone(),
            gif_preview_path: rendered.gif.clone(),
            video_preview_path: rendered.video.clone(),
            geometry_preview_path: rendered.geometry.clone(),
        }
    }
}

fn kept(kind: &str, ok: bool, path: &Path) -> Option<PathBuf> {
    if ok && path.exists() {
        Some(path.to_path_buf())
    } else {
        tracing::warn!(kind, path = %path.display(), "Preview not generated");
        None
    }
}

async fn hard_copy(files: &[PathBuf], dir: &Path) -> IngestResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| IngestError::Copy {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        tokio::fs::copy(file, dir.join(name))
            .await
            .map_err(|e| IngestError::Copy {
                path: file.clone(),
                message: e.to_string(),
            })?;
    }
    tracing::debug!(dir = %dir.display(), files = files.len(), "Hard copy complete");
    Ok(())
}

/// Canonical form when the path exists, absolute otherwise.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::hooks::HookDecision;
    use crate::process::Supervision;
    use crate::testutil::minimal_glb;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        catalog: Arc<InMemoryCatalog>,
        list_id: i64,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let catalog = Arc::new(InMemoryCatalog::new());
            let stack = catalog.add_stack("plates", dir.path().join("library"));
            let list = catalog.add_list(stack.id, "shot010", None);
            std::fs::create_dir_all(dir.path().join("src")).unwrap();
            Self {
                dir,
                catalog,
                list_id: list.id,
            }
        }

        fn config(&self, previews: bool) -> Config {
            let mut config = Config::default();
            config.library.preview_dir = self.dir.path().join("previews");
            config.library.generate_previews = previews;
            config
        }

        fn core(&self, config: Config, transcoder: Option<Transcoder>) -> IngestionCore {
            let geometry = GeometryConverter::new(crate::geometry::HeadlessTool::new(
                Some(PathBuf::from("/nonexistent/blender")),
                Supervision {
                    idle: Duration::from_secs(5),
                    hard: None,
                },
            ));
            IngestionCore::with_tools(config, self.catalog.clone(), transcoder, geometry)
        }

        fn source(&self, name: &str, bytes: &[u8]) -> PathBuf {
            let path = self.dir.path().join("src").join(name);
            std::fs::write(&path, bytes).unwrap();
            path
        }
    }

    #[test]
    fn test_preview_paths_keyed_by_list_and_name() {
        let a = PreviewPaths::new(Path::new("/p"), 4, "shot010");
        let b = PreviewPaths::new(Path::new("/p"), 4, "shot011");
        let name = a.thumbnail.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("4_"));
        assert_eq!(name.len(), "4_".len() + 8 + ".png".len());
        assert_ne!(a.thumbnail, b.thumbnail);
        assert_eq!(a.gif.extension().unwrap(), "gif");
        assert_eq!(a.geometry.extension().unwrap(), "glb");
    }

    #[tokio::test]
    async fn test_missing_source_is_logged_once() {
        let fx = Fixture::new();
        let core = fx.core(fx.config(false), None);
        let err = core
            .ingest(&fx.dir.path().join("nope.exr"), fx.list_id, &IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SourceNotFound(_)));

        let history = fx.catalog.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, IngestionStatus::Error);
        assert_eq!(history[0].target_list, "shot010");
        assert!(fx.catalog.elements().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_list_uses_id_label() {
        let fx = Fixture::new();
        let source = fx.source("plate.exr", b"x");
        let core = fx.core(fx.config(false), None);
        let err = core
            .ingest(&source, 999, &IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ListNotFound(999)));
        assert_eq!(fx.catalog.history()[0].target_list, "#999");
    }

    #[tokio::test]
    async fn test_soft_single_file() {
        let fx = Fixture::new();
        let source = fx.source("plate.exr", &[0u8; 64]);
        let core = fx.core(fx.config(false), None);
        let options = IngestOptions {
            comment: Some("clean plate".into()),
            tags: vec!["bg".into()],
            ..IngestOptions::default()
        };

        let element = core.ingest(&source, fx.list_id, &options).await.unwrap();
        assert_eq!(element.name, "plate");
        assert_eq!(element.asset_type, AssetType::TwoD);
        assert!(!element.is_hard_copy);
        assert_eq!(element.filepath_hard, None);
        assert_eq!(element.file_size, Some(64));
        assert_eq!(element.format.as_deref(), Some("exr"));
        assert_eq!(element.comment.as_deref(), Some("clean plate"));
        assert_eq!(element.frame_range, None);

        let history = fx.catalog.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, IngestionStatus::Success);
        assert_eq!(history[0].element_id, Some(element.id));
    }

    #[tokio::test]
    async fn test_hard_copy_sequence() {
        let fx = Fixture::new();
        for frame in 1001..=1003 {
            fx.source(&format!("shot.{frame}.exr"), &[0u8; 10]);
        }
        let core = fx.core(fx.config(false), None);
        let options = IngestOptions::default().with_copy_policy(CopyPolicy::Hard);

        let element = core
            .ingest(&fx.dir.path().join("src/shot.1002.exr"), fx.list_id, &options)
            .await
            .unwrap();
        assert_eq!(element.name, "shot");
        assert_eq!(element.frame_range.as_deref(), Some("1001-1003"));
        assert_eq!(element.file_size, Some(30));
        assert!(element.is_hard_copy);

        let copied = fx.dir.path().join("library/shot010/shot");
        for frame in 1001..=1003 {
            assert!(copied.join(format!("shot.{frame}.exr")).is_file());
        }
        assert_eq!(
            element.filepath_hard.as_deref().unwrap().file_name().unwrap(),
            "shot.####.exr"
        );
        assert!(element
            .filepath_soft
            .as_deref()
            .unwrap()
            .ends_with("src/shot.####.exr"));
    }

    struct Reject;

    #[async_trait]
    impl PreIngestHook for Reject {
        async fn evaluate(&self, _context: &HookContext) -> HookDecision {
            HookDecision::reject("frozen")
        }
    }

    #[derive(Default)]
    struct Record(Mutex<Vec<HookContext>>);

    #[async_trait]
    impl PostIngestHook for Record {
        async fn notify(&self, context: &HookContext) {
            self.0.lock().push(context.clone());
        }
    }

    #[tokio::test]
    async fn test_rejecting_hook_leaves_no_side_effects() {
        let fx = Fixture::new();
        let source = fx.source("plate.exr", b"x");
        let core = fx.core(fx.config(false), None);
        let record = Arc::new(Record::default());
        let options = IngestOptions::default()
            .with_copy_policy(CopyPolicy::Hard)
            .with_pre_hook(Arc::new(Reject))
            .with_post_hook(record.clone());

        let err = core.ingest(&source, fx.list_id, &options).await.unwrap_err();
        assert!(matches!(err, IngestError::HookRejected(ref m) if m == "frozen"));
        assert!(!fx.dir.path().join("library").exists());
        assert!(fx.catalog.elements().is_empty());
        assert!(record.0.lock().is_empty());
        assert_eq!(fx.catalog.history().len(), 1);
    }

    #[tokio::test]
    async fn test_post_hook_sees_persisted_element() {
        let fx = Fixture::new();
        let source = fx.source("plate.exr", b"x");
        let core = fx.core(fx.config(false), None);
        let record = Arc::new(Record::default());
        let options = IngestOptions::default().with_post_hook(record.clone());

        let element = core.ingest(&source, fx.list_id, &options).await.unwrap();
        let seen = record.0.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].element_id, Some(element.id));
        assert_eq!(seen[0].stage, "post_ingest");
    }

    #[tokio::test]
    async fn test_glb_proxy_from_glb_source() {
        let fx = Fixture::new();
        let source = fx.source("robot.glb", &minimal_glb());
        let core = fx.core(fx.config(false), None);

        let element = core
            .ingest(&source, fx.list_id, &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(element.asset_type, AssetType::ThreeD);
        let proxy = element.geometry_preview_path.clone().unwrap();
        assert_eq!(std::fs::read(proxy).unwrap(), minimal_glb());
    }

    #[tokio::test]
    async fn test_failed_conversion_aborts_with_chain() {
        let fx = Fixture::new();
        let source = fx.source("robot.fbx", b"fbx");
        let core = fx.core(fx.config(false), None);

        let err = core
            .ingest(&source, fx.list_id, &IngestOptions::default())
            .await
            .unwrap_err();
        match err {
            IngestError::Conversion { ref attempts, .. } => {
                assert_eq!(attempts[0].tool, "headless");
                assert!(!attempts[0].success);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(fx.catalog.elements().is_empty());
        let history = fx.catalog.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].message.contains("headless failed"));
    }

    #[tokio::test]
    async fn test_toolset_gets_no_previews() {
        let fx = Fixture::new();
        let source = fx.source("comp.nk", b"Blur {}");
        let core = fx.core(fx.config(false), None);
        let element = core
            .ingest(&source, fx.list_id, &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(element.asset_type, AssetType::Toolset);
        assert_eq!(element.preview_path, None);
        assert_eq!(element.geometry_preview_path, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sequence_previews() {
        let fx = Fixture::new();
        let bin = fx.dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        crate::testutil::fake_transcoder(&bin);
        let transcoder = Transcoder::new(Some(&bin)).unwrap();
        for frame in 1..=5 {
            fx.source(&format!("comp.{frame:04}.exr"), b"x");
        }
        let core = fx.core(fx.config(true), Some(transcoder));

        let element = core
            .ingest(&fx.dir.path().join("src/comp.0001.exr"), fx.list_id, &IngestOptions::default())
            .await
            .unwrap();
        assert!(element.preview_path.is_some());
        assert!(element.gif_preview_path.is_some());
        assert!(element.video_preview_path.is_some());

        let log = std::fs::read_to_string(bin.join("ffmpeg.log")).unwrap();
        // Thumbnail from the middle frame.
        assert!(log.contains("comp.0003.exr"), "{log}");
        assert!(log.contains("comp.%04d.exr"), "{log}");
        assert!(log.contains("-start_number 1"), "{log}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_single_image_gets_thumbnail_only() {
        let fx = Fixture::new();
        let bin = fx.dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        crate::testutil::fake_transcoder(&bin);
        let transcoder = Transcoder::new(Some(&bin)).unwrap();
        let source = fx.source("still.png", b"x");
        let core = fx.core(fx.config(true), Some(transcoder));

        let element = core
            .ingest(&source, fx.list_id, &IngestOptions::default())
            .await
            .unwrap();
        assert!(element.preview_path.is_some());
        assert_eq!(element.gif_preview_path, None);
        assert_eq!(element.video_preview_path, None);
    }
}
