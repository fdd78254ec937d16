//! Configuration management.
//!
//! [`LearningConfig`] is built in three layers: built-in defaults, an
//! optional TOML file, then `AGENTLORE_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Agent suggested when no proven alternative exists.
pub const DEFAULT_FALLBACK_AGENT: &str = "general-purpose";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "AGENTLORE_DATA_DIR";

/// Environment variable overriding the similarity threshold.
pub const ENV_SIMILARITY_THRESHOLD: &str = "AGENTLORE_SIMILARITY_THRESHOLD";

/// Environment variable overriding the history window.
pub const ENV_HISTORY_WINDOW: &str = "AGENTLORE_HISTORY_WINDOW";

/// Tuning knobs of the learning services.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningConfig {
    /// Directory holding `learning.db` and `graph.db`.
    pub data_dir: PathBuf,
    /// Most recent executions considered by warm-up.
    pub history_window: usize,
    /// Minimum combined similarity for a past execution to count as similar.
    pub similarity_threshold: f64,
    /// Weight of file-set overlap in the combined similarity.
    pub file_weight: f64,
    /// Weight of name similarity in the combined similarity.
    pub name_weight: f64,
    /// Similar executions kept per warm-up context.
    pub max_similar: usize,
    /// Top patterns fetched as match candidates.
    pub pattern_pool: usize,
    /// Matched patterns kept per warm-up context.
    pub max_patterns: usize,
    /// Failed attempts before an agent swap is advised.
    pub failure_threshold: usize,
    /// Successful executions an agent needs to be suggested.
    pub min_agent_successes: u64,
    /// Agent suggested when no proven agent is available.
    pub fallback_agent: String,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".agentlore"),
            history_window: 100,
            similarity_threshold: 0.6,
            file_weight: 0.6,
            name_weight: 0.4,
            max_similar: 10,
            pattern_pool: 20,
            max_patterns: 5,
            failure_threshold: 2,
            min_agent_successes: 5,
            fallback_agent: DEFAULT_FALLBACK_AGENT.to_string(),
        }
    }
}

/// On-disk representation; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Warm-up settings.
    pub warmup: Option<ConfigFileWarmUp>,
    /// Failure analysis settings.
    pub failure: Option<ConfigFileFailure>,
}

/// `[warmup]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileWarmUp {
    /// History window.
    pub history_window: Option<usize>,
    /// Similarity threshold.
    pub similarity_threshold: Option<f64>,
    /// File weight.
    pub file_weight: Option<f64>,
    /// Name weight.
    pub name_weight: Option<f64>,
    /// Max similar executions.
    pub max_similar: Option<usize>,
    /// Pattern pool size.
    pub pattern_pool: Option<usize>,
    /// Max matched patterns.
    pub max_patterns: Option<usize>,
}

/// `[failure]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileFailure {
    /// Failure threshold.
    pub threshold: Option<usize>,
    /// Minimum agent successes.
    pub min_agent_successes: Option<u64>,
    /// Fallback agent.
    pub fallback_agent: Option<String>,
}

impl LearningConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml_str(&contents)
    }

    /// Parses TOML text on top of the defaults. Environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`<config_dir>/agentlore/config.toml`),
    /// then `~/.config/agentlore/config.toml`. Falls back to defaults when
    /// neither exists or parses. Environment overrides always apply.
    #[must_use]
    pub fn load_default() -> Self {
        Self::load_layered(
            Self::find_config_file().as_deref(),
            |key| std::env::var(key).ok(),
        )
    }

    /// File (when present and readable) over defaults, then one pass of
    /// `lookup` overrides.
    fn load_layered(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = path
            .and_then(|path| match Self::read_file(path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                    None
                },
            })
            .unwrap_or_default();
        config.apply_overrides(lookup);
        config
    }

    fn find_config_file() -> Option<PathBuf> {
        let base_dirs = directories::BaseDirs::new()?;

        let platform_config = base_dirs.config_dir().join("agentlore").join("config.toml");
        if platform_config.exists() {
            return Some(platform_config);
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("agentlore")
            .join("config.toml");
        xdg_config.exists().then_some(xdg_config)
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(warmup) = file.warmup {
            if let Some(v) = warmup.history_window {
                config.history_window = v;
            }
            if let Some(v) = warmup.similarity_threshold {
                config.similarity_threshold = v;
            }
            if let Some(v) = warmup.file_weight {
                config.file_weight = v;
            }
            if let Some(v) = warmup.name_weight {
                config.name_weight = v;
            }
            if let Some(v) = warmup.max_similar {
                config.max_similar = v;
            }
            if let Some(v) = warmup.pattern_pool {
                config.pattern_pool = v;
            }
            if let Some(v) = warmup.max_patterns {
                config.max_patterns = v;
            }
        }
        if let Some(failure) = file.failure {
            if let Some(v) = failure.threshold {
                config.failure_threshold = v;
            }
            if let Some(v) = failure.min_agent_successes {
                config.min_agent_successes = v;
            }
            if let Some(v) = failure.fallback_agent
                && !v.trim().is_empty()
            {
                config.fallback_agent = v;
            }
        }

        config
    }

    /// Applies `AGENTLORE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_SIMILARITY_THRESHOLD) {
            match raw.trim().parse::<f64>() {
                Ok(v) if (0.0..=1.0).contains(&v) => self.similarity_threshold = v,
                _ => tracing::warn!(value = %raw, "ignoring invalid {ENV_SIMILARITY_THRESHOLD}"),
            }
        }
        if let Some(raw) = lookup(ENV_HISTORY_WINDOW) {
            match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => self.history_window = v,
                _ => tracing::warn!(value = %raw, "ignoring invalid {ENV_HISTORY_WINDOW}"),
            }
        }
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Path of the record store database.
    #[must_use]
    pub fn learning_db_path(&self) -> PathBuf {
        self.data_dir.join("learning.db")
    }

    /// Path of the knowledge graph database.
    #[must_use]
    pub fn graph_db_path(&self) -> PathBuf {
        self.data_dir.join("graph.db")
    }
}
