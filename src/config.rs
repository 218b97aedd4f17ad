//! Engine configuration.
//!
//! Loaded from a TOML file when one is given, otherwise built-in defaults:
//!
//! ```toml
//! [limits.community.default]
//! max_depth = 3
//! max_nodes = 100
//! max_chains = 20
//!
//! [limits.pro.query]
//! max_depth = 6
//! max_nodes = 500
//! max_chains = 50
//!
//! [enrichment]
//! semantic_threshold = 0.65
//!
//! [logging]
//! level = "debug"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::tier::ToolLimits;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Tier limit table
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heuristic enrichment knobs
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Cross-request graph cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fact extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GraphError::Config {
            path: path.display().to_string(),
            message: format!("Failed to read config: {}", e),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            GraphError::Config { message, .. } => GraphError::Config {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: EngineConfig = toml::from_str(content).map_err(|e| GraphError::Config {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.limits.fill_missing_tiers();
        config.enrichment.validate()?;
        Ok(config)
    }
}

/// Tier limits: tier name -> tool name (or `default`) -> caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(flatten)]
    pub tiers: HashMap<String, HashMap<String, ToolLimits>>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let mut tiers = HashMap::new();
        for (tier, limits) in default_tier_limits() {
            let mut tools = HashMap::new();
            tools.insert("default".to_string(), limits);
            tiers.insert(tier.to_string(), tools);
        }
        Self { tiers }
    }
}

impl LimitsConfig {
    /// A partial file keeps the built-in rows for tiers it does not mention.
    fn fill_missing_tiers(&mut self) {
        for (tier, limits) in default_tier_limits() {
            self.tiers
                .entry(tier.to_string())
                .or_default()
                .entry("default".to_string())
                .or_insert(limits);
        }
    }
}

fn default_tier_limits() -> [(&'static str, ToolLimits); 3] {
    [
        ("community", ToolLimits::new(3, 100, 20)),
        ("pro", ToolLimits::new(6, 1_000, 200)),
        ("enterprise", ToolLimits::new(12, 10_000, 2_000)),
    ]
}

/// Heuristic enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Confidence of a same-class `self.m()` edge
    #[serde(default = "default_polymorphism_confidence")]
    pub polymorphism_confidence: f64,

    /// Confidence of an edge to a subclass override
    #[serde(default = "default_override_confidence")]
    pub override_confidence: f64,

    /// Minimum combined score for a SEMANTIC_SIMILAR edge
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,

    /// Maximum number of nodes compared pairwise
    #[serde(default = "default_semantic_pool_cap")]
    pub semantic_pool_cap: usize,

    #[serde(default = "default_name_weight")]
    pub name_weight: f64,

    #[serde(default = "default_doc_weight")]
    pub doc_weight: f64,

    #[serde(default = "default_param_weight")]
    pub param_weight: f64,

    /// Per-hop confidence decay used by neighborhood traversal
    #[serde(default = "default_decay")]
    pub decay: f64,
}

fn default_polymorphism_confidence() -> f64 {
    0.7
}

fn default_override_confidence() -> f64 {
    0.5
}

fn default_semantic_threshold() -> f64 {
    0.6
}

fn default_semantic_pool_cap() -> usize {
    400
}

fn default_name_weight() -> f64 {
    0.5
}

fn default_doc_weight() -> f64 {
    0.3
}

fn default_param_weight() -> f64 {
    0.2
}

fn default_decay() -> f64 {
    0.9
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            polymorphism_confidence: default_polymorphism_confidence(),
            override_confidence: default_override_confidence(),
            semantic_threshold: default_semantic_threshold(),
            semantic_pool_cap: default_semantic_pool_cap(),
            name_weight: default_name_weight(),
            doc_weight: default_doc_weight(),
            param_weight: default_param_weight(),
            decay: default_decay(),
        }
    }
}

impl EnrichmentConfig {
    fn validate(&self) -> Result<()> {
        let unit = [
            ("polymorphism_confidence", self.polymorphism_confidence),
            ("override_confidence", self.override_confidence),
            ("semantic_threshold", self.semantic_threshold),
            ("decay", self.decay),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphError::Config {
                    path: "<inline>".to_string(),
                    message: format!("enrichment.{} must be within [0, 1], got {}", name, value),
                });
            }
        }
        let weights = self.name_weight + self.doc_weight + self.param_weight;
        if weights <= 0.0 {
            return Err(GraphError::Config {
                path: "<inline>".to_string(),
                message: "enrichment weights must sum to a positive value".to_string(),
            });
        }
        Ok(())
    }
}

/// Graph cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

fn default_cache_entries() -> usize {
    16
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_cache_entries(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Fact extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Worker threads for file reads and parsing (0 = available cores)
    #[serde(default)]
    pub workers: usize,

    /// Files larger than this are skipped
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Path fragments to exclude (matched against the relative path)
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_excludes() -> Vec<String> {
    vec![
        "node_modules/".to_string(),
        "target/".to_string(),
        ".venv/".to_string(),
        "__pycache__/".to_string(),
    ]
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            max_file_bytes: default_max_file_bytes(),
            exclude: default_excludes(),
        }
    }
}

impl ExtractionConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_all_tiers() {
        let config = EngineConfig::default();
        for tier in ["community", "pro", "enterprise"] {
            assert!(config.limits.tiers[tier].contains_key("default"));
        }
        assert_eq!(config.enrichment.decay, 0.9);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [limits.pro.query]
            max_depth = 2
            max_nodes = 10
            max_chains = 1

            [enrichment]
            semantic_threshold = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.limits.tiers["pro"]["query"].max_nodes, 10);
        assert!(config.limits.tiers["pro"].contains_key("default"));
        assert!(config.limits.tiers.contains_key("community"));
        assert_eq!(config.enrichment.semantic_threshold, 0.8);
        assert_eq!(config.enrichment.polymorphism_confidence, 0.7);
    }

    #[test]
    fn test_out_of_range_decay_rejected() {
        let err = EngineConfig::from_toml("[enrichment]\ndecay = 1.5\n").unwrap_err();
        assert!(matches!(err, GraphError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ucg.toml");
        fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");

        let missing = EngineConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, GraphError::Config { .. }));
    }
}
