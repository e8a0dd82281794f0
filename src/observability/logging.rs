//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// `RUST_LOG` wins over the configured filter. Without either, the
    /// default level is `info`, or `debug` when `verbose` is set.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::resolve(settings, verbose, std::env::var("RUST_LOG").ok())
    }

    fn resolve(settings: Option<&LoggingSettings>, verbose: bool, rust_log: Option<String>) -> Self {
        let default_filter = if verbose {
            "freshwire=debug,warn"
        } else {
            "freshwire=info,warn"
        };
        let filter = rust_log
            .filter(|v| !v.trim().is_empty())
            .or_else(|| settings.and_then(|s| s.filter.clone()))
            .unwrap_or_else(|| default_filter.to_string());

        Self {
            format: settings
                .and_then(|s| s.format.as_deref())
                .map(LogFormat::parse)
                .unwrap_or_default(),
            filter,
            file: settings.and_then(|s| s.file.clone()),
        }
    }
}
