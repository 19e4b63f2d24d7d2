//! rk Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! Validation happens where the values are applied (the kernel setters), so
//! a config that deserializes cleanly can still be rejected there.

use serde::Deserialize;

/// Default number of retrievals allowed in flight at once
pub const DEFAULT_REQUEST_MAXIMUM: usize = 2;

/// Default timeout for the alternate (bundle) delivery channel
pub const DEFAULT_BUNDLE_TIMEOUT_MS: u64 = 60 * 1000;

/// Configuration for a kernel instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KernelConfig {
    /// Base URI for root-qualified module paths (`/a/b.js`)
    pub root_uri: Option<String>,
    /// Base URI for library module paths (`a/b.js`)
    pub library_uri: Option<String>,
    /// Directory name searched in every ancestor (e.g. `node_modules`)
    pub library_lookup_component: Option<String>,
    /// Maximum number of concurrent retrievals
    pub request_maximum: usize,
    /// Name of the alternate cross-origin delivery channel
    pub global_key_path: Option<String>,
    /// Timeout for the alternate delivery channel, in milliseconds
    pub bundle_timeout_ms: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            root_uri: None,
            library_uri: None,
            library_lookup_component: None,
            request_maximum: DEFAULT_REQUEST_MAXIMUM,
            global_key_path: None,
            bundle_timeout_ms: DEFAULT_BUNDLE_TIMEOUT_MS,
        }
    }
}

/// Log level, shared by the CLI and config files
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, case-insensitively. `silent` maps to `Error`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" | "silent" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

/// Logging configuration with optional per-phase overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub global: LogLevel,
    pub resolve: Option<LogLevel>,
    pub fetch: Option<LogLevel>,
    pub load: Option<LogLevel>,
    pub defer: Option<LogLevel>,
    pub transport: Option<LogLevel>,
}

impl LoggingConfig {
    /// Effective level for a phase
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let specific = match phase {
            Phase::Resolve => self.resolve,
            Phase::Fetch => self.fetch,
            Phase::Load => self.load,
            Phase::Defer => self.defer,
            Phase::Transport => self.transport,
        };
        specific.unwrap_or(self.global)
    }
}

/// Kernel phase, used to pick log targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Fetch,
    Load,
    Defer,
    Transport,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 5] = [
        Phase::Resolve,
        Phase::Fetch,
        Phase::Load,
        Phase::Defer,
        Phase::Transport,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolve => "resolve",
            Phase::Fetch => "fetch",
            Phase::Load => "load",
            Phase::Defer => "defer",
            Phase::Transport => "transport",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> &'static str {
        match self {
            Phase::Resolve => "rk::resolve",
            Phase::Fetch => "rk::fetch",
            Phase::Load => "rk::load",
            Phase::Defer => "rk::defer",
            Phase::Transport => "rk::transport",
        }
    }
}

/// Top-level configuration file layout (`kernel.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RkConfig {
    pub kernel: KernelConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kernel_config() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.request_maximum, 2);
        assert_eq!(cfg.bundle_timeout_ms, 60_000);
        assert!(cfg.root_uri.is_none());
        assert!(cfg.library_lookup_component.is_none());
    }

    #[test]
    fn test_phase_target() {
        assert_eq!(Phase::Fetch.as_str(), "fetch");
        assert_eq!(Phase::Load.target(), "rk::load");
        assert_eq!(Phase::ALL.len(), 5);
    }

    #[test]
    fn test_level_for_falls_back_to_global() {
        let cfg = LoggingConfig {
            global: LogLevel::Info,
            fetch: Some(LogLevel::Trace),
            ..Default::default()
        };
        assert_eq!(cfg.level_for(Phase::Fetch), LogLevel::Trace);
        assert_eq!(cfg.level_for(Phase::Load), LogLevel::Info);
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("silent"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{
            "kernel": { "root_uri": "file:///srv/app", "library_lookup_component": "node_modules" },
            "logging": { "global": "info", "fetch": "trace" }
        }"#;
        let cfg: RkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.kernel.root_uri.as_deref(), Some("file:///srv/app"));
        assert_eq!(cfg.kernel.request_maximum, DEFAULT_REQUEST_MAXIMUM);
        assert_eq!(cfg.logging.level_for(Phase::Fetch), LogLevel::Trace);
        assert_eq!(cfg.logging.level_for(Phase::Defer), LogLevel::Info);
    }
}
