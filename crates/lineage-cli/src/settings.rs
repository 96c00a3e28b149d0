//! Configuration resolution
//!
//! Precedence, lowest first: defaults, `lineage.toml`, `LINEAGE_*`
//! environment variables, command-line flags.

use anyhow::Context;
use clap::Args;
use lineage_scan::{HookSpec, LineageConfig};
use std::path::{Path, PathBuf};

/// Scan settings that can be overridden per invocation
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Root class (internal or dotted name)
    #[arg(long)]
    pub root: Option<String>,

    /// Worker threads (0 = number of CPUs)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Cache file
    #[arg(long)]
    pub cache: Option<PathBuf>,
}

impl Overrides {
    /// Only a cache path override
    pub fn with_cache(cache: Option<PathBuf>) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }
}

/// Load the config file, then apply environment and flag overrides
pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> anyhow::Result<LineageConfig> {
    let mut config = match config_file {
        Some(path) => LineageConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => LineageConfig::discover(Path::new("."))?,
    };
    config.apply_env()?;
    apply_overrides(&mut config, overrides)?;
    tracing::debug!(
        root = %config.scan.root_class,
        threads = config.scan.threads,
        cache = ?config.scan.cache_path,
        "resolved configuration"
    );
    Ok(config)
}

fn apply_overrides(config: &mut LineageConfig, overrides: &Overrides) -> anyhow::Result<()> {
    if let Some(root) = &overrides.root {
        config.scan.root_class = root.clone();
    }
    if let Some(threads) = overrides.threads {
        config.scan.threads = threads;
    }
    if let Some(cache) = &overrides.cache {
        config.scan.cache_path = Some(cache.clone());
    }
    config.validate()?;
    Ok(())
}

/// Replace parts of the hook spec from flags
pub fn override_hook(
    config: &mut LineageConfig,
    method: Option<String>,
    descriptor: Option<String>,
) -> anyhow::Result<()> {
    if method.is_none() && descriptor.is_none() {
        return Ok(());
    }
    let method = method.unwrap_or_else(|| config.hook.method_name.clone());
    let descriptor = descriptor.unwrap_or_else(|| config.hook.descriptor.clone());
    config.hook = HookSpec::new(method, &descriptor);
    config.hook.validate()?;
    Ok(())
}

/// Cache location or an error telling the user to pick one
pub fn cache_path(config: &LineageConfig) -> anyhow::Result<PathBuf> {
    config
        .scan
        .resolved_cache_path()
        .context("no home directory for the default cache; pass --cache or set LINEAGE_CACHE")
}
