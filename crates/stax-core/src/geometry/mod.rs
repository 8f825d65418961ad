//! Geometry-to-GLB conversion.
//!
//! A conversion runs an ordered plan of [`ConversionStrategy`] values chosen
//! by input extension, stopping at the first success, then validates the
//! result. Every step lands in the returned attempt log:
//!
//! ```text
//! .glb            → copy
//! .gltf           → repack
//! .fbx .abc       → headless tool
//! .obj .ply .stl → headless tool → mesh library
//! .dae, unknown   → headless tool
//!                 → validate (reload, consolidate buffers, re-save)
//! ```

mod headless;

#[cfg(feature = "gltf")]
mod glb;
#[cfg(feature = "mesh")]
mod mesh;

pub use headless::{HeadlessTool, EXPORT_SCRIPT};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::IngestError;
use crate::pipeline::metadata::lower_extension;

/// Extensions ingestion converts to a GLB proxy.
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &["obj", "fbx", "abc", "gltf", "glb", "ply", "stl", "dae"];

/// Extensions the in-process mesh library can read.
pub const MESH_EXTENSIONS: &[&str] = &["obj", "ply", "stl"];

/// Whether ingestion should build a GLB proxy for `path`.
pub fn is_convertible(path: &Path) -> bool {
    lower_extension(path).is_some_and(|ext| CONVERTIBLE_EXTENSIONS.contains(&ext.as_str()))
}

/// One step of a conversion, in the order it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionAttempt {
    pub tool: String,
    pub success: bool,
    pub message: String,
}

impl ConversionAttempt {
    pub fn ok(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConversionAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = if self.success { "ok" } else { "failed" };
        write!(f, "{} {}: {}", self.tool, outcome, self.message)
    }
}

/// Outcome of a conversion with its full attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub success: bool,
    pub output: PathBuf,
    pub attempts: Vec<ConversionAttempt>,
}

impl ConversionReport {
    fn failure(output: &Path, attempts: Vec<ConversionAttempt>) -> Self {
        Self {
            success: false,
            output: output.to_path_buf(),
            attempts,
        }
    }

    /// Message of the last step taken.
    pub fn message(&self) -> &str {
        self.attempts
            .last()
            .map(|a| a.message.as_str())
            .unwrap_or_default()
    }

    pub fn into_error(self, source: &Path) -> IngestError {
        IngestError::Conversion {
            path: source.to_path_buf(),
            attempts: self.attempts,
        }
    }
}

/// `Ok(note)` on success, `Err(reason)` otherwise.
pub type StrategyResult = std::result::Result<String, String>;

/// A single way of producing a GLB from an input file.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Name recorded in the attempt log.
    fn name(&self) -> &'static str;

    async fn convert(&self, input: &Path, output: &Path) -> StrategyResult;
}

/// Byte-for-byte copy of an existing `.glb`.
pub struct CopyGlb;

#[async_trait]
impl ConversionStrategy for CopyGlb {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn convert(&self, input: &Path, output: &Path) -> StrategyResult {
        if input == output {
            return Ok("input is already the output".into());
        }
        tokio::fs::copy(input, output)
            .await
            .map(|bytes| format!("copied {bytes} bytes"))
            .map_err(|e| format!("copy failed: {e}"))
    }
}

/// Pack a `.gltf` and its buffers into a single `.glb`.
pub struct RepackGltf;

#[async_trait]
impl ConversionStrategy for RepackGltf {
    fn name(&self) -> &'static str {
        "gltf"
    }

    #[cfg(feature = "gltf")]
    async fn convert(&self, input: &Path, output: &Path) -> StrategyResult {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        blocking(move || glb::repack_gltf(&input, &output)).await
    }

    #[cfg(not(feature = "gltf"))]
    async fn convert(&self, _input: &Path, _output: &Path) -> StrategyResult {
        Err("built without glTF support; cannot repack .gltf".into())
    }
}

/// In-process OBJ, STL and PLY loading and GLB export.
pub struct MeshLibrary;

impl MeshLibrary {
    pub const AVAILABLE: bool = cfg!(feature = "mesh");
}

#[async_trait]
impl ConversionStrategy for MeshLibrary {
    fn name(&self) -> &'static str {
        "mesh"
    }

    #[cfg(feature = "mesh")]
    async fn convert(&self, input: &Path, output: &Path) -> StrategyResult {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        blocking(move || mesh::export_glb(&input, &output)).await
    }

    #[cfg(not(feature = "mesh"))]
    async fn convert(&self, _input: &Path, _output: &Path) -> StrategyResult {
        Err("built without mesh support".into())
    }
}

#[cfg(feature = "gltf")]
async fn blocking<F>(f: F) -> StrategyResult
where
    F: FnOnce() -> StrategyResult + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(format!("conversion task failed: {e}")),
    }
}

/// Runs the per-extension strategy plan and the validation pass.
pub struct GeometryConverter {
    copy: CopyGlb,
    repack: RepackGltf,
    headless: HeadlessTool,
    mesh: MeshLibrary,
}

impl GeometryConverter {
    pub fn new(headless: HeadlessTool) -> Self {
        Self {
            copy: CopyGlb,
            repack: RepackGltf,
            headless,
            mesh: MeshLibrary,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(HeadlessTool::from_config(config))
    }

    /// Strategies tried for `input`, in order.
    pub fn plan(&self, input: &Path) -> Vec<&dyn ConversionStrategy> {
        let ext = lower_extension(input).unwrap_or_default();
        let mut plan: Vec<&dyn ConversionStrategy> = Vec::new();
        match ext.as_str() {
            "glb" => plan.push(&self.copy),
            "gltf" => plan.push(&self.repack),
            "fbx" | "abc" => plan.push(&self.headless),
            ext => {
                plan.push(&self.headless);
                if MeshLibrary::AVAILABLE && MESH_EXTENSIONS.contains(&ext) {
                    plan.push(&self.mesh);
                }
            }
        }
        plan
    }

    /// Convert `input` to a GLB at `output`.
    ///
    /// Strategies write into a private staging directory next to `output`,
    /// and the result is renamed into place only once it validates. A file
    /// already at `output` is left alone when the conversion fails.
    pub async fn convert(&self, input: &Path, output: &Path) -> ConversionReport {
        let mut attempts = Vec::new();

        if !input.is_file() {
            attempts.push(ConversionAttempt::failed(
                "input",
                format!("input file not found: {}", input.display()),
            ));
            return ConversionReport::failure(output, attempts);
        }
        let staging = match stage(output).await {
            Ok(staging) => staging,
            Err(message) => {
                attempts.push(ConversionAttempt::failed("output", message));
                return ConversionReport::failure(output, attempts);
            }
        };
        let staged = staging.path().join(output.file_name().unwrap_or(OsStr::new("out.glb")));

        let mut converted = false;
        for strategy in self.plan(input) {
            tracing::debug!(strategy = strategy.name(), input = %input.display(), "Trying");
            match strategy.convert(input, &staged).await {
                Ok(note) => {
                    attempts.push(ConversionAttempt::ok(strategy.name(), note));
                    converted = true;
                    break;
                }
                Err(reason) => {
                    tracing::info!(strategy = strategy.name(), %reason, "Strategy failed");
                    attempts.push(ConversionAttempt::failed(strategy.name(), reason));
                }
            }
        }

        if converted {
            let check = validate(&staged).await;
            converted = check.success;
            attempts.push(check);
        }
        if converted {
            if let Err(e) = tokio::fs::rename(&staged, output).await {
                attempts.push(ConversionAttempt::failed(
                    "output",
                    format!("cannot move GLB to {}: {e}", output.display()),
                ));
                converted = false;
            }
        }

        // Dropping the staging directory removes anything a failed run wrote.
        drop(staging);
        if !converted {
            return ConversionReport::failure(output, attempts);
        }

        tracing::info!(input = %input.display(), output = %output.display(), "GLB ready");
        ConversionReport {
            success: true,
            output: output.to_path_buf(),
            attempts,
        }
    }
}

/// Fresh empty directory beside `output`, removed on drop.
async fn stage(output: &Path) -> Result<tempfile::TempDir, String> {
    let dir = output
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    tempfile::Builder::new()
        .prefix(".stax_glb_")
        .tempdir_in(dir)
        .map_err(|e| format!("cannot stage in {}: {e}", dir.display()))
}

#[cfg(feature = "gltf")]
async fn validate(output: &Path) -> ConversionAttempt {
    let path = output.to_path_buf();
    match blocking(move || glb::normalize_glb(&path)).await {
        Ok(note) => ConversionAttempt::ok("validate", note),
        Err(reason) => ConversionAttempt::failed("validate", reason),
    }
}

#[cfg(not(feature = "gltf"))]
async fn validate(_output: &Path) -> ConversionAttempt {
    ConversionAttempt::ok("validate", "glTF support not built; validation skipped")
}
