//! Scanner configuration (lineage.toml)
//!
//! ```toml
//! [scan]
//! root_class = "net/minecraft/entity/Entity"
//! max_passes = 20
//! threads = 0
//! skip_units = ["fabricloader", "java"]
//!
//! [hook]
//! method_name = "damage"
//! descriptor = "(Lnet/minecraft/entity/damage/DamageSource;F)Z"
//! ```

use lineage_classfile::{normalize_class_name, MARKER_ANNOTATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hooks::HookSpec;

/// Default configuration file name
pub const CONFIG_FILE: &str = "lineage.toml";

/// Overrides the worker count
pub const ENV_NUM_THREADS: &str = "LINEAGE_NUM_THREADS";

/// Overrides the cache location
pub const ENV_CACHE: &str = "LINEAGE_CACHE";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// An environment override has an unusable value
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineageConfig {
    /// Discovery settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Hook-site selection
    #[serde(default)]
    pub hook: HookSpec,
}

/// Discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanConfig {
    /// Root of the hierarchy to close over (internal or dotted form)
    #[serde(default = "default_root_class")]
    pub root_class: String,

    /// Descriptor of the annotation that excludes a class
    #[serde(default = "default_marker")]
    pub marker_annotation: String,

    /// Pass ceiling; exceeding it aborts the scan
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Worker threads (0 = number of CPUs)
    #[serde(default)]
    pub threads: usize,

    /// Cache document location (default: ~/.lineage/scan_cache.toml)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,

    /// Unit identifiers that are never scanned
    #[serde(default = "default_skip_units")]
    pub skip_units: Vec<String>,
}

fn default_root_class() -> String {
    "net/minecraft/entity/Entity".to_string()
}

fn default_marker() -> String {
    MARKER_ANNOTATION.to_string()
}

fn default_max_passes() -> usize {
    20
}

fn default_skip_units() -> Vec<String> {
    vec!["fabricloader".to_string(), "java".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_class: default_root_class(),
            marker_annotation: default_marker(),
            max_passes: default_max_passes(),
            threads: 0,
            cache_path: None,
            skip_units: default_skip_units(),
        }
    }
}

impl ScanConfig {
    /// Config for an arbitrary root class, everything else default
    pub fn for_root(root_class: &str) -> Self {
        Self {
            root_class: normalize_class_name(root_class),
            ..Self::default()
        }
    }

    /// Check invariants and normalize the root class name
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.root_class.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "root_class cannot be empty".to_string(),
            ));
        }
        if self.max_passes == 0 {
            return Err(ConfigError::ValidationError(
                "max_passes must be at least 1".to_string(),
            ));
        }
        self.root_class = normalize_class_name(self.root_class.trim());
        Ok(())
    }

    /// Worker count for `units` corpus units
    pub fn effective_threads(&self, units: usize) -> usize {
        let wanted = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        wanted.min(units).max(1)
    }

    /// Whether `unit_id` is on the skip list
    pub fn is_skipped(&self, unit_id: &str) -> bool {
        self.skip_units.iter().any(|s| s == unit_id)
    }

    /// Cache location: configured path, else the per-user default
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.cache_path.clone().or_else(crate::cache::default_cache_path)
    }
}

impl LineageConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: LineageConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `lineage.toml` from `dir` if present, else defaults
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading config");
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate every section
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.scan.validate()?;
        self.hook.validate()
    }

    /// Apply `LINEAGE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_NUM_THREADS) {
            self.scan.threads = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_NUM_THREADS,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_CACHE) {
            if !value.is_empty() {
                self.scan.cache_path = Some(PathBuf::from(value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LineageConfig::from_str("").unwrap();
        assert_eq!(config.scan.root_class, "net/minecraft/entity/Entity");
        assert_eq!(config.scan.max_passes, 20);
        assert_eq!(config.scan.marker_annotation, MARKER_ANNOTATION);
        assert!(config.scan.is_skipped("fabricloader"));
        assert!(config.scan.is_skipped("java"));
        assert!(!config.scan.is_skipped("minecraft"));
        assert_eq!(config.hook.method_name, "damage");
    }

    #[test]
    fn test_parse_and_normalize() {
        let toml = r#"
[scan]
root_class = "com.example.Base"
max_passes = 5
threads = 3
skip_units = []

[hook]
method_name = "hurt"
descriptor = "(F)Z"
"#;
        let config = LineageConfig::from_str(toml).unwrap();
        assert_eq!(config.scan.root_class, "com/example/Base");
        assert_eq!(config.scan.max_passes, 5);
        assert_eq!(config.scan.effective_threads(10), 3);
        assert_eq!(config.scan.effective_threads(2), 2);
        assert!(!config.scan.is_skipped("java"));
        assert_eq!(config.hook.method_name, "hurt");
    }

    #[test]
    fn test_validation() {
        let err = LineageConfig::from_str("[scan]\nroot_class = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = LineageConfig::from_str("[scan]\nmax_passes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = LineageConfig::from_str("[scan]\nmax_passes = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LineageConfig::default();
        config
            .apply_env_with(|var| match var {
                ENV_NUM_THREADS => Some("4".to_string()),
                ENV_CACHE => Some("/tmp/lineage-cache.toml".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.scan.threads, 4);
        assert_eq!(
            config.scan.cache_path.as_deref(),
            Some(Path::new("/tmp/lineage-cache.toml"))
        );

        let err = config
            .apply_env_with(|var| (var == ENV_NUM_THREADS).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_NUM_THREADS, .. }));
    }

    #[test]
    fn test_effective_threads_never_zero() {
        let config = ScanConfig::default();
        assert_eq!(config.effective_threads(0), 1);
        assert!(config.effective_threads(1000) >= 1);
    }
}
