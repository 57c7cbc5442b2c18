//! Configuration options recognized by the core, per the external interface
//! table. Loading the backing file and wiring CLI flags is the host's job;
//! this struct is what the host ultimately constructs and validates against.

use crate::error::{RepoMapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn default_cache_dir() -> PathBuf {
    home_dir().join(".repomap-tool").join("cache")
}

fn default_session_dir() -> PathBuf {
    home_dir().join(".repomap-tool").join("sessions")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    pub threshold: f64,
    pub strategies: HashSet<String>,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            threshold: 70.0,
            strategies: ["exact", "prefix", "suffix", "substring", "edit", "word"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub threshold: f64,
    pub max_features: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self { threshold: 0.1, max_features: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub fuzzy_weight: f64,
    pub semantic_weight: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self { fuzzy_weight: 0.6, semantic_weight: 0.4 }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<()> {
        let sum = self.fuzzy_weight + self.semantic_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(RepoMapError::configuration(
                "hybrid weights must sum to 1.0",
                format!("fuzzy_weight={} semantic_weight={} sum={sum}", self.fuzzy_weight, self.semantic_weight),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: default_cache_dir(), enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_workers: usize,
    pub parallel_threshold: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { max_workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4), parallel_threshold: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    pub max_graph_size: usize,
    pub performance_threshold_seconds: u64,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self { max_graph_size: 10_000, performance_threshold_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub max_depth: usize,
    pub session_ttl_hours: u64,
    pub session_dir: PathBuf,
    pub max_trees: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self { max_depth: 3, session_ttl_hours: 24, session_dir: default_session_dir(), max_trees: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub generic_identifier_penalty: f64,
    pub private_identifier_penalty: f64,
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            generic_identifier_penalty: 0.1,
            private_identifier_penalty: 0.1,
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Full configuration recognized by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map_tokens: usize,
    pub fuzzy: FuzzyConfig,
    pub semantic: SemanticConfig,
    pub hybrid: HybridConfig,
    pub cache: CacheConfig,
    pub performance: PerformanceConfig,
    pub dependencies: DependenciesConfig,
    pub exploration: ExplorationConfig,
    pub ranker: RankerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_tokens: 4096,
            fuzzy: FuzzyConfig::default(),
            semantic: SemanticConfig::default(),
            hybrid: HybridConfig::default(),
            cache: CacheConfig::default(),
            performance: PerformanceConfig::default(),
            dependencies: DependenciesConfig::default(),
            exploration: ExplorationConfig::default(),
            ranker: RankerConfig::default(),
        }
    }
}

impl Config {
    /// Validate cross-field invariants. Called once at construction time by
    /// the host before the config is threaded into component constructors.
    pub fn validate(&self) -> Result<()> {
        self.hybrid.validate()?;
        if !(0.0..=100.0).contains(&self.fuzzy.threshold) {
            return Err(RepoMapError::configuration(
                "fuzzy.threshold out of range",
                format!("{}", self.fuzzy.threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.semantic.threshold) {
            return Err(RepoMapError::configuration(
                "semantic.threshold out of range",
                format!("{}", self.semantic.threshold),
            ));
        }
        const KNOWN_STRATEGIES: [&str; 6] = ["exact", "prefix", "suffix", "substring", "edit", "word"];
        for s in &self.fuzzy.strategies {
            if !KNOWN_STRATEGIES.contains(&s.as_str()) {
                return Err(RepoMapError::configuration("unknown fuzzy strategy", s.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn hybrid_weights_must_sum_to_one() {
        let mut cfg = Config::default();
        cfg.hybrid.fuzzy_weight = 0.9;
        cfg.hybrid.semantic_weight = 0.3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_fuzzy_strategy_rejected() {
        let mut cfg = Config::default();
        cfg.fuzzy.strategies.insert("bogus".to_string());
        assert!(cfg.validate().is_err());
    }
}
