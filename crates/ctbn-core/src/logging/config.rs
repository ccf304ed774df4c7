//! Logging configuration for ctbn-cluster.
//!
//! Resolution order, later wins:
//! 1. defaults (human output, `info`)
//! 2. `RUST_LOG` (full filter directives)
//! 3. `CTBN_LOG` (a single level for the ctbn targets) and `CTBN_LOG_FORMAT`
//! 4. `--log-level` / `--log-format`

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Targets that receive the configured level.
const CTBN_TARGETS: [&str; 2] = ["ctbn_core", "ctbn_cluster"];

/// Where and how log records are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    #[value(alias = "json")]
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s, true).map_err(|_| format!("unknown log format: {}", s))
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    /// Run milestones and one line per EM iteration.
    #[default]
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
    #[value(alias = "quiet")]
    #[value(alias = "none")]
    Off,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| format!("unknown log level: {}", s))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Raw `RUST_LOG` directives, kept only while nothing more specific
    /// has set the level.
    pub directives: Option<String>,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: LogLevel::Info,
            directives: None,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = Self {
            directives: lookup("RUST_LOG").filter(|d| !d.trim().is_empty()),
            ..Self::default()
        };

        let env_level = lookup("CTBN_LOG").and_then(|v| v.parse::<LogLevel>().ok());
        if let Some(level) = cli_level.or(env_level) {
            config = config.with_level(level);
        }

        let env_format = lookup("CTBN_LOG_FORMAT").and_then(|v| v.parse::<LogFormat>().ok());
        if let Some(format) = cli_format.or(env_format) {
            config.format = format;
        }
        config
    }

    /// The `EnvFilter` directive string this configuration stands for.
    pub fn filter_directives(&self) -> String {
        match &self.directives {
            Some(raw) => raw.clone(),
            None => CTBN_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, self.level))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set an explicit level; this discards inherited `RUST_LOG` directives.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.directives = None;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" quiet ".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("xml".parse::<LogFormat>().is_err());
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn defaults_cover_library_and_binary() {
        let config = LogConfig::from_lookup(env(&[]), None, None);
        assert_eq!(config.filter_directives(), "ctbn_core=info,ctbn_cluster=info");
    }

    #[test]
    fn rust_log_is_passed_through_untouched() {
        let config = LogConfig::from_lookup(env(&[("RUST_LOG", "ctbn_core=trace,rayon=warn")]), None, None);
        assert_eq!(config.filter_directives(), "ctbn_core=trace,rayon=warn");
    }

    #[test]
    fn ctbn_log_replaces_rust_log() {
        let config = LogConfig::from_lookup(
            env(&[("CTBN_LOG", "error"), ("RUST_LOG", "debug")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.directives, None);
    }

    #[test]
    fn unparsable_ctbn_log_is_ignored() {
        let config = LogConfig::from_lookup(env(&[("CTBN_LOG", "chatty")]), None, None);
        assert_eq!(config.level, LogLevel::Info);
    }

    #[test]
    fn cli_wins_over_environment() {
        let config = LogConfig::from_lookup(
            env(&[("CTBN_LOG", "error"), ("CTBN_LOG_FORMAT", "jsonl")]),
            Some(LogLevel::Trace),
            Some(LogFormat::Human),
        );
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn builder_methods() {
        let config = LogConfig::default()
            .with_format(LogFormat::Jsonl)
            .with_level(LogLevel::Off)
            .with_timestamps(false);
        assert_eq!(config.format, LogFormat::Jsonl);
        assert_eq!(config.filter_directives(), "ctbn_core=off,ctbn_cluster=off");
        assert!(!config.timestamps);
    }
}
