//! Error types for the StaX ingestion core.
//!
//! Errors are grouped by concern so callers can tell a bad configuration from
//! a missing tool or a rejected ingest. The media pipeline itself never
//! returns these: its operations report `bool`/`Option` and log the cause.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::geometry::ConversionAttempt;

/// Top-level error type for StaX operations.
#[derive(Error, Debug)]
pub enum StaxError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External tool errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures launching or supervising an external executable.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A required binary is absent. Raised at construction time.
    #[error("{tool} not found at {path}")]
    Missing { tool: String, path: PathBuf },

    /// A required binary could not be located on PATH.
    #[error("{tool} not found; is it installed and in PATH?")]
    NotOnPath { tool: String },

    /// The process could not be started.
    #[error("failed to launch {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The process exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    Exit {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The process was terminated by a supervision clock.
    #[error("{tool} timed out after {}s ({kind})", .after.as_secs())]
    Timeout {
        tool: String,
        kind: TimeoutKind,
        after: Duration,
    },

    /// I/O failure while talking to the process.
    #[error("I/O error with {tool}: {message}")]
    Io { tool: String, message: String },
}

/// Which supervision clock terminated a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No output arrived within the idle window
    Idle,
    /// The hard wall-clock cap elapsed
    WallClock,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Idle => write!(f, "no output"),
            TimeoutKind::WallClock => write!(f, "wall-clock cap"),
        }
    }
}

/// Ingestion failures, one variant per failure class.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Source path does not exist
    #[error("Source file does not exist: {0}")]
    SourceNotFound(PathBuf),

    /// Target list could not be resolved
    #[error("Target list not found: {0}")]
    ListNotFound(i64),

    /// Owning stack could not be resolved
    #[error("Stack not found for list {list_id}")]
    StackNotFound { list_id: i64 },

    /// Pre-ingest hook asked to stop
    #[error("Rejected by pre-ingest hook: {0}")]
    HookRejected(String),

    /// Hard copy failed
    #[error("Copy failed for {path}: {message}")]
    Copy { path: PathBuf, message: String },

    /// Geometry conversion exhausted every strategy or failed validation
    #[error("Geometry conversion failed for {path}: {}", summarize(.attempts))]
    Conversion {
        path: PathBuf,
        attempts: Vec<ConversionAttempt>,
    },

    /// The persistence collaborator refused the element
    #[error("Persistence error: {0}")]
    Persistence(String),
}

fn summarize(attempts: &[ConversionAttempt]) -> String {
    if attempts.is_empty() {
        return "no strategy attempted".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Convenience type alias for StaX results.
pub type Result<T> = std::result::Result<T, StaxError>;

/// Convenience type alias for ingestion results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_clock() {
        let err = ToolError::Timeout {
            tool: "blender".into(),
            kind: TimeoutKind::Idle,
            after: Duration::from_secs(900),
        };
        let msg = err.to_string();
        assert!(msg.contains("timed out after 900s"));
        assert!(msg.contains("no output"));
    }

    #[test]
    fn conversion_error_lists_attempt_chain() {
        let err = IngestError::Conversion {
            path: PathBuf::from("/tmp/model.fbx"),
            attempts: vec![
                ConversionAttempt::failed("blender", "not found"),
                ConversionAttempt::failed("mesh", "unsupported extension .fbx"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("blender"));
        assert!(msg.contains(" -> "));
        assert!(msg.contains("mesh"));
    }

    #[test]
    fn empty_attempt_chain_is_described() {
        let err = IngestError::Conversion {
            path: PathBuf::from("x.obj"),
            attempts: vec![],
        };
        assert!(err.to_string().contains("no strategy attempted"));
    }
}
