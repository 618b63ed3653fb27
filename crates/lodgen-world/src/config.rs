//! TOML configuration for the scheduler, pipeline and demo generator.
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::params::FeatureFailurePolicy;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_keep_alive_secs")]
    pub worker_keep_alive_secs: u64,
    /// 0 means no limit.
    #[serde(default)]
    pub max_workers: usize,
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_keep_alive_secs() -> u64 {
    60
}
impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            worker_keep_alive_secs: default_keep_alive_secs(),
            max_workers: 0,
        }
    }
}
impl SchedulerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_secs(self.worker_keep_alive_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_halo_margin")]
    pub halo_margin: u32,
    #[serde(default = "default_halo_floor")]
    pub halo_floor: u32,
    #[serde(default)]
    pub perf_logging: bool,
    #[serde(default = "default_perf_window")]
    pub perf_window: usize,
}
fn default_halo_margin() -> u32 {
    3
}
// Empirical minimum; smaller halos break blending at region edges.
fn default_halo_floor() -> u32 {
    7
}
fn default_perf_window() -> usize {
    50
}
impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            halo_margin: default_halo_margin(),
            halo_floor: default_halo_floor(),
            perf_logging: false,
            perf_window: default_perf_window(),
        }
    }
}
impl PipelineConfig {
    /// Radius of the placeholder halo built around a request of `radius`.
    pub fn halo_radius(&self, radius: u32) -> u32 {
        radius.saturating_add(self.halo_margin).max(self.halo_floor)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub failure_policy: FeatureFailurePolicy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_generate_structures")]
    pub generate_structures: bool,
}
fn default_generate_structures() -> bool {
    true
}
impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            generate_structures: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NoiseConfig {
    #[serde(default = "default_height_frequency")]
    pub height_frequency: f32,
    #[serde(default = "default_min_height")]
    pub min_height: i32,
    #[serde(default = "default_max_height")]
    pub max_height: i32,
    #[serde(default = "default_sea_level")]
    pub sea_level: i32,
    #[serde(default = "default_biome_frequency")]
    pub biome_frequency: f32,
    #[serde(default = "default_cave_frequency")]
    pub cave_frequency: f32,
    #[serde(default = "default_tree_density")]
    pub tree_density: f32,
}
fn default_height_frequency() -> f32 {
    0.004
}
fn default_min_height() -> i32 {
    40
}
fn default_max_height() -> i32 {
    160
}
fn default_sea_level() -> i32 {
    63
}
fn default_biome_frequency() -> f32 {
    0.0015
}
fn default_cave_frequency() -> f32 {
    0.03
}
fn default_tree_density() -> f32 {
    0.02
}
impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            height_frequency: default_height_frequency(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            sea_level: default_sea_level(),
            biome_frequency: default_biome_frequency(),
            cave_frequency: default_cave_frequency(),
            tree_density: default_tree_density(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config read error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parse(value)
    }
}

impl GenConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

pub fn load_config_from_path(path: &Path) -> Result<GenConfig, ConfigError> {
    let s = fs::read_to_string(path)?;
    GenConfig::from_toml_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = GenConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.scheduler.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.pipeline.halo_margin, 3);
        assert_eq!(cfg.pipeline.halo_floor, 7);
        assert_eq!(cfg.pipeline.perf_window, 50);
        assert_eq!(cfg.features.failure_policy, FeatureFailurePolicy::Skip);
        assert!(cfg.world.generate_structures);
    }

    #[test]
    fn explicit_values_override() {
        let cfg = GenConfig::from_toml_str(
            r#"
            [scheduler]
            timeout_secs = 5
            max_workers = 4

            [pipeline]
            halo_floor = 9
            perf_logging = true

            [features]
            failure_policy = { retry = 2 }

            [world]
            seed = 42
            generate_structures = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scheduler.timeout_secs, 5);
        assert_eq!(cfg.scheduler.max_workers, 4);
        assert_eq!(cfg.scheduler.worker_keep_alive_secs, 60);
        assert_eq!(cfg.pipeline.halo_floor, 9);
        assert!(cfg.pipeline.perf_logging);
        assert_eq!(cfg.features.failure_policy, FeatureFailurePolicy::Retry(2));
        assert_eq!(cfg.world.seed, 42);
        assert!(!cfg.world.generate_structures);
    }

    #[test]
    fn halo_radius_has_floor() {
        let p = PipelineConfig::default();
        assert_eq!(p.halo_radius(0), 7);
        assert_eq!(p.halo_radius(4), 7);
        assert_eq!(p.halo_radius(5), 8);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            GenConfig::from_toml_str("[pipeline]\nhalo_floor = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
