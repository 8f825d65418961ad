//! Blender run headless with an import-then-export script.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ConversionStrategy, StrategyResult};
use crate::config::Config;
use crate::error::ToolError;
use crate::process::{locate, Supervision, ToolCommand};

/// Export script handed to the headless tool when none is configured.
pub const EXPORT_SCRIPT: &str = include_str!("../../assets/export_glb.py");

const TOOL: &str = "blender";

/// Runs `<blender> --background --python <script> -- <in> <out>`.
#[derive(Debug, Clone)]
pub struct HeadlessTool {
    executable: Option<PathBuf>,
    script: Option<PathBuf>,
    supervision: Supervision,
}

/// Script on disk for the duration of one run.
enum Script {
    Configured(PathBuf),
    Staged(tempfile::TempPath),
}

impl Script {
    fn path(&self) -> &Path {
        match self {
            Script::Configured(path) => path.as_path(),
            Script::Staged(temp) => &**temp,
        }
    }
}

impl HeadlessTool {
    /// `executable` overrides the `PATH` lookup.
    pub fn new(executable: Option<PathBuf>, supervision: Supervision) -> Self {
        Self {
            executable,
            script: None,
            supervision,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        let mut tool = Self::new(
            config.blender_path(),
            Supervision {
                idle: Duration::from_secs(tools.geometry_idle_timeout_secs),
                hard: tools.geometry_hard_timeout_secs.map(Duration::from_secs),
            },
        );
        tool.script = tools.export_script.clone();
        tool
    }

    /// Use a script on disk instead of the bundled one.
    pub fn with_script(mut self, script: PathBuf) -> Self {
        self.script = Some(script);
        self
    }

    fn stage_script(&self) -> Result<Script, String> {
        if let Some(ref path) = self.script {
            if path.is_file() {
                return Ok(Script::Configured(path.clone()));
            }
            return Err(format!("export script missing: {}", path.display()));
        }
        let mut file = tempfile::Builder::new()
            .prefix("stax_export_")
            .suffix(".py")
            .tempfile()
            .map_err(|e| format!("cannot stage export script: {e}"))?;
        file.write_all(EXPORT_SCRIPT.as_bytes())
            .map_err(|e| format!("cannot stage export script: {e}"))?;
        Ok(Script::Staged(file.into_temp_path()))
    }
}

#[async_trait]
impl ConversionStrategy for HeadlessTool {
    fn name(&self) -> &'static str {
        "headless"
    }

    async fn convert(&self, input: &Path, output: &Path) -> StrategyResult {
        let executable = locate(TOOL, self.executable.as_deref()).map_err(|_| {
            "blender not found on PATH; install it or set tools.blender_path".to_string()
        })?;
        let script = self.stage_script()?;

        let input = std::path::absolute(input).map_err(|e| e.to_string())?;
        let output = std::path::absolute(output).map_err(|e| e.to_string())?;

        let mut cmd = ToolCommand::new(&executable);
        cmd.arg("--background")
            .arg("--python")
            .arg(script.path())
            .arg("--")
            .arg(&input)
            .arg(&output);

        tracing::info!(tool = %executable.display(), input = %input.display(), "Headless conversion");
        let result = cmd.supervise(self.supervision).await;
        // The staged script is removed here on every path.
        drop(script);

        match result {
            Ok(_) if output.exists() => Ok(format!("converted with {}", executable.display())),
            Ok(_) => Err(format!(
                "{} exited cleanly but wrote no output",
                executable.display()
            )),
            Err(e @ ToolError::Timeout { .. }) => Err(e.to_string()),
            Err(ToolError::Exit { status, stderr, .. }) => {
                Err(format!("{TOOL} {status}: {}", last_lines(&stderr, 5)))
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(executable: PathBuf, idle: Duration) -> HeadlessTool {
        HeadlessTool::new(Some(executable), Supervision { idle, hard: None })
    }

    #[test]
    fn test_bundled_script_negotiates_before_retrying() {
        assert!(EXPORT_SCRIPT.contains("get_rna_type"));
        assert!(EXPORT_SCRIPT.contains("unrecognized"));
        assert!(EXPORT_SCRIPT.contains("export_format=\"GLB\""));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc", 2), "b | c");
        assert_eq!(last_lines("", 2), "");
    }

    #[tokio::test]
    async fn test_missing_configured_script_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.obj");
        std::fs::write(&input, b"v 0 0 0").unwrap();
        let exe = dir.path().join("blender");
        std::fs::write(&exe, b"").unwrap();
        let headless = tool(exe, Duration::from_secs(1)).with_script(dir.path().join("none.py"));
        let err = headless
            .convert(&input, &dir.path().join("out.glb"))
            .await
            .unwrap_err();
        assert!(err.contains("export script missing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invocation_contract_and_script_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let args_log = dir.path().join("args.log");
        let blender = crate::testutil::fake_tool(
            dir.path(),
            "blender",
            &format!(
                r#"printf '%s\n' "$@" > '{}'
for last; do :; done
echo exporting
cp "$5" "$last""#,
                args_log.display()
            ),
        );
        let input = dir.path().join("in.obj");
        let output = dir.path().join("out.glb");
        std::fs::write(&input, b"v 0 0 0").unwrap();

        let note = tool(blender, Duration::from_secs(5))
            .convert(&input, &output)
            .await
            .unwrap();
        assert!(note.contains("converted with"));
        assert!(output.exists());

        let args = std::fs::read_to_string(&args_log).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(args[0], "--background");
        assert_eq!(args[1], "--python");
        assert_eq!(args[3], "--");
        assert_eq!(args[4], input.to_str().unwrap());
        assert_eq!(args[5], output.to_str().unwrap());
        // Staged script is gone once the run is over.
        assert!(!Path::new(args[2]).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_zero_without_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blender = crate::testutil::fake_tool(dir.path(), "blender", "exit 0");
        let input = dir.path().join("in.fbx");
        std::fs::write(&input, b"x").unwrap();
        let err = tool(blender, Duration::from_secs(5))
            .convert(&input, &dir.path().join("out.glb"))
            .await
            .unwrap_err();
        assert!(err.contains("wrote no output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_tool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let blender = crate::testutil::fake_tool(dir.path(), "blender", "exec sleep 30");
        let input = dir.path().join("in.fbx");
        std::fs::write(&input, b"x").unwrap();
        let err = tool(blender, Duration::from_millis(300))
            .convert(&input, &dir.path().join("out.glb"))
            .await
            .unwrap_err();
        assert!(err.contains("timed out"), "{err}");
        assert!(err.contains("no output"), "{err}");
    }
}
