//! Logging configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const ENV_LOG: &str = "AGENTLORE_LOG";

/// Environment variable selecting the output format.
pub const ENV_LOG_FORMAT: &str = "AGENTLORE_LOG_FORMAT";

/// Environment variable naming a log file.
pub const ENV_LOG_FILE: &str = "AGENTLORE_LOG_FILE";

/// Directive used when none is configured.
pub const DEFAULT_FILTER: &str = "agentlore=info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
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
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `agentlore=debug`.
    pub filter: String,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Defaults overridden by `AGENTLORE_LOG`, `AGENTLORE_LOG_FORMAT`, and
    /// `AGENTLORE_LOG_FILE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(filter) = non_empty(ENV_LOG) {
            config.filter = filter;
        }
        if let Some(format) = non_empty(ENV_LOG_FORMAT) {
            config.format = LogFormat::parse(&format);
        }
        config.file = non_empty(ENV_LOG_FILE).map(PathBuf::from);
        config
    }

    /// Sets the format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Builds the filter, falling back to the default directive when the
    /// configured one does not parse.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|e| {
            eprintln!("agentlore: invalid log filter {:?}: {e}", self.filter);
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}
