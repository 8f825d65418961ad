//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.preview.size == 0 {
            return Err(ConfigError::ValidationError(
                "preview.size must be > 0".into(),
            ));
        }
        if self.preview.sequence_video_max_frames == 0 {
            return Err(ConfigError::ValidationError(
                "preview.sequence_video_max_frames must be > 0".into(),
            ));
        }
        if self.sequence.fps == 0 {
            return Err(ConfigError::ValidationError(
                "sequence.fps must be > 0".into(),
            ));
        }
        if self.gif.size == 0 {
            return Err(ConfigError::ValidationError("gif.size must be > 0".into()));
        }
        if self.gif.fps == 0 {
            return Err(ConfigError::ValidationError("gif.fps must be > 0".into()));
        }
        let duration = self.gif.duration_secs;
        if !self.gif.full_duration && (duration.is_nan() || duration <= 0.0) {
            return Err(ConfigError::ValidationError(
                "gif.duration_secs must be > 0 unless gif.full_duration is set".into(),
            ));
        }
        if self.gif.max_frames == Some(0) {
            return Err(ConfigError::ValidationError(
                "gif.max_frames must be > 0 when set".into(),
            ));
        }
        if self.tools.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.command_timeout_secs must be > 0".into(),
            ));
        }
        if self.tools.geometry_idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.geometry_idle_timeout_secs must be > 0".into(),
            ));
        }
        if self.tools.geometry_hard_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "tools.geometry_hard_timeout_secs must be > 0 when set".into(),
            ));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::ValidationError(
                "workers.count must be > 0".into(),
            ));
        }
        if self.workers.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "workers.poll_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
