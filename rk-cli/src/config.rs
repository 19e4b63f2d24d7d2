//! CLI configuration
//!
//! Reads `kernel.json` and maps log levels onto `tracing` levels.

use rk_config::{LogLevel, LoggingConfig, Phase, RkConfig};
use rk_transport::uri::encode_path;
use std::path::Path;
use tracing::Level;

/// Default configuration file, read when present.
pub const DEFAULT_CONFIG_FILE: &str = "kernel.json";

/// Log configuration with levels resolved per phase.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    phases: Vec<(Phase, Level)>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_logging(&LoggingConfig::default())
    }
}

impl LogConfig {
    pub fn from_logging(logging: &LoggingConfig) -> Self {
        Self {
            global: to_level(logging.global),
            phases: Phase::ALL
                .iter()
                .map(|&phase| (phase, to_level(logging.level_for(phase))))
                .collect(),
        }
    }

    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> Level {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, level)| *level)
            .unwrap_or(self.global)
    }
}

pub fn to_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Read the configuration file.
///
/// An explicitly named file must exist; the default one is optional.
pub fn read_config(path: Option<&Path>) -> Result<RkConfig, String> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    if !path.exists() {
        if required {
            return Err(format!("config file '{}' not found", path.display()));
        }
        return Ok(RkConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("cannot parse '{}': {}", path.display(), e))
}

/// `file://` URI for a local directory.
pub fn directory_uri(dir: &Path) -> Result<String, String> {
    let absolute = dir
        .canonicalize()
        .map_err(|e| format!("cannot use directory '{}': {}", dir.display(), e))?;
    if !absolute.is_dir() {
        return Err(format!("'{}' is not a directory", dir.display()));
    }
    Ok(format!(
        "file://{}",
        encode_path(&absolute.to_string_lossy())
    ))
}
