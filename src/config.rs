//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document indexing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

fn default_documents_dir() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("skilldex")
                .join("documents")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./documents".to_string())
}

fn default_context_lines() -> usize {
    2
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            context_lines: default_context_lines(),
        }
    }
}

/// Keyword search and fusion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,

    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    #[serde(default = "default_fusion_weight")]
    pub bm25_weight: f32,

    #[serde(default = "default_fusion_weight")]
    pub vector_weight: f32,
}

fn default_bm25_k1() -> f32 {
    crate::search::DEFAULT_K1
}

fn default_bm25_b() -> f32 {
    crate::search::DEFAULT_B
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_fusion_weight() -> f32 {
    1.0
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            rrf_k: default_rrf_k(),
            bm25_weight: default_fusion_weight(),
            vector_weight: default_fusion_weight(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: usize,

    #[serde(default = "default_stats_cache_size")]
    pub stats_cache_size: usize,
}

fn default_query_cache_size() -> usize {
    crate::cache::DEFAULT_QUERY_CACHE_SIZE
}

fn default_stats_cache_size() -> usize {
    crate::cache::DEFAULT_STATS_CACHE_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_cache_size: default_query_cache_size(),
            stats_cache_size: default_stats_cache_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("skilldex").join("config.toml")),
            Some(PathBuf::from("/etc/skilldex/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SKILLDEX_DOCUMENTS_DIR") {
            self.index.documents_dir = dir;
        }
        if let Ok(lines) = std::env::var("SKILLDEX_CONTEXT_LINES") {
            if let Ok(n) = lines.parse() {
                self.index.context_lines = n;
            }
        }
        if let Ok(size) = std::env::var("SKILLDEX_QUERY_CACHE_SIZE") {
            if let Ok(n) = size.parse() {
                self.cache.query_cache_size = n;
            }
        }
        if let Ok(level) = std::env::var("SKILLDEX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SKILLDEX_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Engine tuning derived from this configuration
    pub fn engine_config(&self) -> crate::query::EngineConfig {
        crate::query::EngineConfig {
            query_cache_size: self.cache.query_cache_size,
            stats_cache_size: self.cache.stats_cache_size,
            context_lines: self.index.context_lines,
            hybrid: crate::search::HybridConfig {
                rrf_k: self.search.rrf_k,
                bm25_weight: self.search.bm25_weight,
                vector_weight: self.search.vector_weight,
            },
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Skilldex Configuration
#
# Environment variables override these settings:
# - SKILLDEX_DOCUMENTS_DIR
# - SKILLDEX_CONTEXT_LINES
# - SKILLDEX_QUERY_CACHE_SIZE
# - SKILLDEX_LOG_LEVEL
# - SKILLDEX_LOG_FORMAT

[index]
# Directory of canonical-shape skill documents (*.json)
documents_dir = "~/.local/share/skilldex/documents"

# Raw source lines shown around a record in context output
context_lines = 2

[search]
# BM25 term-frequency saturation
bm25_k1 = 1.5

# BM25 length normalization
bm25_b = 0.75

# Reciprocal rank fusion constant
rrf_k = 60.0

# Weighted-fusion weights (independent; need not sum to 1)
bm25_weight = 1.0
vector_weight = 1.0

[cache]
# Query response cache capacity (entries)
query_cache_size = 128

# Statistics response cache capacity (entries)
stats_cache_size = 64

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
