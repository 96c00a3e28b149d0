//! `lineage info`: Display environment and configuration info.

use lineage_scan::config::{CONFIG_FILE, ENV_CACHE, ENV_NUM_THREADS};
use lineage_scan::ScanCache;
use std::path::Path;

use crate::output::StyledOutput;
use crate::settings::{self, Overrides};

pub fn execute(out: &mut StyledOutput, config_file: Option<&Path>) -> anyhow::Result<()> {
    out.bold(&format!("Lineage v{}\n", env!("CARGO_PKG_VERSION")));
    out.newline();

    out.field(
        "Platform:",
        &format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH),
    );
    out.field("CPUs:", &num_threads_hint());

    let config_source = match config_file {
        Some(path) => path.display().to_string(),
        None if Path::new(CONFIG_FILE).is_file() => CONFIG_FILE.to_string(),
        None => "(defaults)".to_string(),
    };
    out.field("Config:", &config_source);

    let config = settings::load(config_file, &Overrides::default())?;
    out.field("Root class:", &config.scan.root_class);
    out.field("Max passes:", &config.scan.max_passes.to_string());
    out.field(
        "Hook:",
        &format!("{}{}", config.hook.method_name, config.hook.descriptor),
    );

    match config.scan.resolved_cache_path() {
        Some(path) => {
            let units = ScanCache::try_load(&path)
                .ok()
                .flatten()
                .map_or(0, |cache| cache.len());
            out.field("Cache:", &format!("{} ({} units)", path.display(), units));
        }
        None => out.field("Cache:", "(no location)"),
    }

    out.newline();
    out.plain("Environment:\n");
    for var in ["LINEAGE_LOG", ENV_NUM_THREADS, ENV_CACHE, "NO_COLOR"] {
        let value = std::env::var(var).unwrap_or_else(|_| "(default)".to_string());
        out.plain(&format!("  {} = {}\n", var, value));
    }
    Ok(())
}

fn num_threads_hint() -> String {
    std::thread::available_parallelism()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
