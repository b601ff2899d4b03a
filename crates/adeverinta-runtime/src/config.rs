//! Runtime configuration loaded from YAML.
//!
//! Durations are written the human way (`5s`, `200ms`, `1h`). Relative
//! paths are resolved against the directory of the config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::resilience::CircuitBreakerConfig;

/// Errors while loading configuration. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file `{path}`: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Directory of policy documents (one markdown file per snippet)
    pub corpus_dir: PathBuf,

    /// Precomputed embedding index; dense retrieval is off without it
    pub index_path: Option<PathBuf>,

    /// Forbidden/allowed reason lists
    pub reasons_path: PathBuf,

    pub retrieval: RetrievalConfig,
    pub interpreter: InterpreterConfig,
    pub embedding: EmbeddingConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("kb"),
            index_path: None,
            reasons_path: PathBuf::from("config/reasons.yaml"),
            retrieval: RetrievalConfig::default(),
            interpreter: InterpreterConfig::default(),
            embedding: EmbeddingConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Snippets retrieved per turn
    pub k: usize,

    #[serde(with = "duration")]
    pub embedding_timeout: Duration,

    /// Pause before the single retry of a failed embedding call
    #[serde(with = "duration")]
    pub retry_delay: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 3,
            embedding_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Which NLU collaborator interprets user turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpreterKind {
    /// Deterministic keyword extraction, no network
    #[default]
    Keyword,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpreterConfig {
    pub kind: InterpreterKind,
    pub model: String,

    #[serde(with = "duration")]
    pub timeout: Duration,

    /// Falls back to the provider's environment variable when absent
    pub api_key: Option<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            kind: InterpreterKind::Keyword,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(20),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    #[default]
    None,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub kind: EmbeddingKind,

    /// Must match the model that produced the index
    pub model: String,

    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::None,
            model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_entries: u64,

    #[serde(with = "duration")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter; `RUST_LOG` overrides it
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl AppConfig {
    /// Parse YAML without touching the filesystem. Paths stay as written.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load, resolve relative paths against the file's directory, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            interpreter = ?config.interpreter.kind,
            embedding = ?config.embedding.kind,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.corpus_dir);
        resolve(&mut self.reasons_path);
        if let Some(index) = self.index_path.as_mut() {
            resolve(index);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.k == 0 {
            return Err(ConfigError::Validation(
                "retrieval.k must be at least 1".to_string(),
            ));
        }
        if self.interpreter.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "interpreter.model must not be empty".to_string(),
            ));
        }
        if self.embedding.kind != EmbeddingKind::None && self.index_path.is_none() {
            return Err(ConfigError::Validation(
                "embedding provider configured without index_path".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde helpers for human-readable durations (`30s`, `1m 30s`, `200ms`).
pub(crate) mod duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}
