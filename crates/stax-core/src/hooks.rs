//! Pre- and post-ingest extension points.
//!
//! A pre-ingest hook sees the resolved asset before any file is copied and may
//! stop the ingest. A post-ingest hook is told about the persisted element.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{Config, CopyPolicy};
use crate::error::ToolError;
use crate::pipeline::metadata::AssetType;
use crate::process::ToolCommand;

/// What a hook is told about the asset being ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookContext {
    /// `pre_ingest` or `post_ingest`
    pub stage: String,
    /// Set once the element is persisted
    pub element_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub source_path: PathBuf,
    pub list_id: i64,
    pub copy_policy: CopyPolicy,
    pub is_sequence: bool,
    pub frame_range: Option<String>,
    pub files: Vec<PathBuf>,
    pub file_size: u64,
    pub filepath_hard: Option<PathBuf>,
    pub preview_path: Option<PathBuf>,
    pub gif_preview_path: Option<PathBuf>,
    pub video_preview_path: Option<PathBuf>,
    pub geometry_preview_path: Option<PathBuf>,
}

/// A pre-ingest verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDecision {
    #[serde(rename = "continue")]
    pub proceed: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl HookDecision {
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            message: None,
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            proceed: false,
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait PreIngestHook: Send + Sync {
    async fn evaluate(&self, context: &HookContext) -> HookDecision;
}

#[async_trait]
pub trait PostIngestHook: Send + Sync {
    async fn notify(&self, context: &HookContext);
}

/// Runs an executable with the context as JSON on stdin.
///
/// As a pre-ingest hook, stdout may hold `{"continue": bool, "message": ...}`;
/// empty stdout means continue and a failing process rejects the ingest.
#[derive(Debug, Clone)]
pub struct CommandHook {
    program: PathBuf,
    timeout: Duration,
}

impl CommandHook {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Hooks named in `[hooks]`, with `~` expanded.
    pub fn from_config(config: &Config) -> (Option<Self>, Option<Self>) {
        let build = |path: &Option<PathBuf>| {
            path.as_ref().map(|p| {
                let expanded = shellexpand::tilde(&p.to_string_lossy()).to_string();
                Self::new(expanded).with_timeout(config.command_timeout())
            })
        };
        (build(&config.hooks.pre_ingest), build(&config.hooks.post_ingest))
    }

    async fn run(&self, context: &HookContext) -> Result<String, ToolError> {
        let payload = serde_json::to_vec(context).map_err(|e| ToolError::Io {
            tool: self.program.display().to_string(),
            message: e.to_string(),
        })?;
        let mut cmd = ToolCommand::new(&self.program);
        cmd.timeout(self.timeout).stdin(payload);
        Ok(cmd.execute().await?.stdout)
    }
}

#[async_trait]
impl PreIngestHook for CommandHook {
    async fn evaluate(&self, context: &HookContext) -> HookDecision {
        let stdout = match self.run(context).await {
            Ok(stdout) => stdout,
            Err(ToolError::Exit { stderr, status, .. }) => {
                let message = if stderr.is_empty() {
                    format!("hook exited with {status}")
                } else {
                    stderr
                };
                return HookDecision::reject(message);
            }
            Err(e) => return HookDecision::reject(e.to_string()),
        };

        let stdout = stdout.trim();
        if stdout.is_empty() {
            return HookDecision::proceed();
        }
        match serde_json::from_str::<HookDecision>(stdout) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(hook = %self.program.display(), error = %e, "Ignoring unparseable hook output");
                HookDecision::proceed()
            }
        }
    }
}

#[async_trait]
impl PostIngestHook for CommandHook {
    async fn notify(&self, context: &HookContext) {
        if let Err(e) = self.run(context).await {
            tracing::warn!(hook = %self.program.display(), error = %e, "Post-ingest hook failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HookContext {
        HookContext {
            stage: "pre_ingest".into(),
            element_id: None,
            name: "shot010".into(),
            asset_type: AssetType::TwoD,
            source_path: "/src/shot010.1001.exr".into(),
            list_id: 3,
            copy_policy: CopyPolicy::Soft,
            is_sequence: true,
            frame_range: Some("1001-1010".into()),
            files: vec![],
            file_size: 0,
            filepath_hard: None,
            preview_path: None,
            gif_preview_path: None,
            video_preview_path: None,
            geometry_preview_path: None,
        }
    }

    #[test]
    fn test_decision_wire_format() {
        let d: HookDecision = serde_json::from_str(r#"{"continue": false, "message": "no"}"#).unwrap();
        assert_eq!(d, HookDecision::reject("no"));
        let d: HookDecision = serde_json::from_str(r#"{"continue": true}"#).unwrap();
        assert_eq!(d, HookDecision::proceed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_continues() {
        let dir = tempfile::tempdir().unwrap();
        let seen = dir.path().join("seen.json");
        let hook = crate::testutil::fake_tool(
            dir.path(),
            "hook",
            &format!("cat > '{}'", seen.display()),
        );
        let decision = CommandHook::new(hook).evaluate(&context()).await;
        assert!(decision.proceed);

        let sent: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&seen).unwrap()).unwrap();
        assert_eq!(sent["name"], "shot010");
        assert_eq!(sent["type"], "2D");
        assert_eq!(sent["copy_policy"], "soft");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_decision_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let hook = crate::testutil::fake_tool(
            dir.path(),
            "hook",
            r#"cat > /dev/null
echo '{"continue": false, "message": "naming convention"}'"#,
        );
        let decision = CommandHook::new(hook).evaluate(&context()).await;
        assert_eq!(decision, HookDecision::reject("naming convention"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_hook_rejects_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let hook = crate::testutil::fake_tool(
            dir.path(),
            "hook",
            "cat > /dev/null\necho 'locked by review' >&2\nexit 2",
        );
        let decision = CommandHook::new(hook).evaluate(&context()).await;
        assert!(!decision.proceed);
        assert_eq!(decision.message.as_deref(), Some("locked by review"));
    }

    #[tokio::test]
    async fn test_missing_hook_rejects() {
        let decision = CommandHook::new("/nonexistent/hook")
            .evaluate(&context())
            .await;
        assert!(!decision.proceed);
    }
}
