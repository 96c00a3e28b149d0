//! `lineage cache`: Inspect or clear the scan cache.

use lineage_scan::{LineageConfig, ScanCache};

use crate::output::StyledOutput;
use crate::settings;

pub fn show(out: &mut StyledOutput, config: &LineageConfig, json: bool) -> anyhow::Result<()> {
    let path = settings::cache_path(config)?;
    let Some(cache) = ScanCache::try_load(&path)? else {
        if json {
            println!("[]");
        } else {
            out.plain(&format!("No cache at {}\n", path.display()));
        }
        return Ok(());
    };

    if json {
        let entries: Vec<_> = cache.entries().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    out.bold(&format!("{}\n", path.display()));
    for entry in cache.entries() {
        out.info(&format!("{:<32}", entry.unit));
        let checksum = entry
            .checksum
            .as_deref()
            .map(|c| c.get(..12).unwrap_or(c))
            .unwrap_or("(live)");
        out.dim(&format!(" {:<12} ", checksum));
        out.plain(&format!("{} classes\n", entry.classes.len()));
    }
    out.field("Units:", &cache.len().to_string());
    Ok(())
}

pub fn clear(out: &mut StyledOutput, config: &LineageConfig) -> anyhow::Result<()> {
    let path = settings::cache_path(config)?;
    let mut cache = ScanCache::load(&path);
    if cache.is_empty() && !path.exists() {
        out.plain("No cache file found.\n");
        return Ok(());
    }

    let removed = cache.len();
    cache.clear();
    cache.save()?;
    out.success("Cleared ");
    out.plain(&format!("{} entries from {}\n", removed, path.display()));
    Ok(())
}
