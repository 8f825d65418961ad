//! Logging initialization.
//!
//! Log output goes to stderr; stdout carries command results. Chatter from
//! the external tools is logged at debug, so `info` shows one line per asset.

use stax_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Resolved subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Directive used when `RUST_LOG` is unset
    pub directive: String,
    pub json: bool,
}

impl LogSettings {
    /// Combine the `[logging]` section with the `--verbose` and
    /// `--json-logs` flags. `--verbose` raises the level to at least debug.
    pub fn resolve(config: &LoggingConfig, verbose: bool, json_logs: bool) -> Self {
        let configured = config.level.trim().to_lowercase();
        let mut level = if LEVELS.contains(&configured.as_str()) {
            configured
        } else {
            eprintln!("Warning: unknown log level {:?}, using info", config.level);
            "info".to_string()
        };
        if verbose && !matches!(level.as_str(), "debug" | "trace") {
            level = "debug".to_string();
        }
        Self {
            directive: format!("stax={level},stax_core={level},warn"),
            json: json_logs || config.format.eq_ignore_ascii_case("json"),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the directive.
pub fn init(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.directive));

    if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.into(),
            format: format.into(),
        }
    }

    #[test]
    fn test_default_is_info_pretty() {
        let settings = LogSettings::resolve(&LoggingConfig::default(), false, false);
        assert_eq!(settings.directive, "stax=info,stax_core=info,warn");
        assert!(!settings.json);
    }

    #[test]
    fn test_verbose_raises_but_never_lowers() {
        let raised = LogSettings::resolve(&logging("warn", "pretty"), true, false);
        assert!(raised.directive.starts_with("stax=debug,"));
        let kept = LogSettings::resolve(&logging("trace", "pretty"), true, false);
        assert!(kept.directive.starts_with("stax=trace,"));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let settings = LogSettings::resolve(&logging("LOUD", "pretty"), false, false);
        assert!(settings.directive.starts_with("stax=info,"));
    }

    #[test]
    fn test_json_from_config_or_flag() {
        assert!(LogSettings::resolve(&logging("info", "JSON"), false, false).json);
        assert!(LogSettings::resolve(&logging("info", "pretty"), false, true).json);
    }
}
