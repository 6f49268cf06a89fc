//! Configuration for chunking, rendering, and caching

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, Result};

/// Main configuration for the context library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Semantic chunker configuration
    #[serde(default)]
    pub chunker: ChunkerConfig,

    /// Context renderer configuration
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Embedding cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Semantic chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Hard upper token bound per emitted chunk
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,

    /// Chunks below this are merged or dropped
    #[serde(default = "default_min_tokens_per_chunk")]
    pub min_tokens_per_chunk: usize,

    /// Adjacent-distance percentile above which a boundary is placed
    #[serde(default = "default_breakpoint_percentile_threshold")]
    pub breakpoint_percentile_threshold: f64,

    /// Neighboring segments on each side included when embedding a group
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Consult and populate the embedding cache
    #[serde(default = "default_true")]
    pub enable_embedding_caching: bool,

    /// Capacity of the chunker-owned embedding cache
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
}

fn default_max_tokens_per_chunk() -> usize {
    512
}

fn default_min_tokens_per_chunk() -> usize {
    10
}

fn default_breakpoint_percentile_threshold() -> f64 {
    0.75
}

fn default_buffer_size() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_cache_size() -> usize {
    1000
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            min_tokens_per_chunk: default_min_tokens_per_chunk(),
            breakpoint_percentile_threshold: default_breakpoint_percentile_threshold(),
            buffer_size: default_buffer_size(),
            enable_embedding_caching: true,
            max_cache_size: default_max_cache_size(),
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens_per_chunk == 0 {
            return Err(ContextError::InvalidArgument(
                "max_tokens_per_chunk must be positive".to_string(),
            ));
        }
        if self.min_tokens_per_chunk > self.max_tokens_per_chunk {
            return Err(ContextError::InvalidArgument(format!(
                "min_tokens_per_chunk {} exceeds max_tokens_per_chunk {}",
                self.min_tokens_per_chunk, self.max_tokens_per_chunk
            )));
        }
        if !(0.0..=1.0).contains(&self.breakpoint_percentile_threshold) {
            return Err(ContextError::InvalidArgument(format!(
                "breakpoint_percentile_threshold must be in [0, 1], got {}",
                self.breakpoint_percentile_threshold
            )));
        }
        if self.enable_embedding_caching && self.max_cache_size == 0 {
            return Err(ContextError::InvalidArgument(
                "max_cache_size must be positive when caching is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Context renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Relevance/diversity tradeoff for MMR selection
    #[serde(default = "default_lambda")]
    pub lambda: f32,

    /// Pull toward recent items, in [0, 1]
    #[serde(default = "default_freshness_weight")]
    pub freshness_weight: f32,

    /// Upper bound on total rendered tokens; None means no limit
    #[serde(default)]
    pub token_budget: Option<usize>,
}

fn default_lambda() -> f32 {
    0.5
}

fn default_freshness_weight() -> f32 {
    0.2
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            freshness_weight: default_freshness_weight(),
            token_budget: None,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) || self.lambda.is_nan() {
            return Err(ContextError::InvalidArgument(format!(
                "lambda must be in [0, 1], got {}",
                self.lambda
            )));
        }
        if !(0.0..=1.0).contains(&self.freshness_weight) || self.freshness_weight.is_nan() {
            return Err(ContextError::InvalidArgument(format!(
                "freshness_weight must be in [0, 1], got {}",
                self.freshness_weight
            )));
        }
        if self.token_budget == Some(0) {
            return Err(ContextError::InvalidArgument(
                "token_budget must be positive when present".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embedding cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached embeddings
    #[serde(default = "default_max_cache_size")]
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_cache_size(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(ContextError::InvalidArgument(
                "cache max_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ContextConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config: Self = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)?,
            Some("yaml") | Some("yml") => serde_yml::to_string(self)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        self.renderer.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}
