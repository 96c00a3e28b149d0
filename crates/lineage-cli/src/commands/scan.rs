//! `lineage scan`: Compute the qualifying subclass set.

use anyhow::Context;
use lineage_events::{ClassHierarchy, ClassId};
use lineage_scan::{discover_units, LineageConfig, ScanCache, ScanReport, SubclassScanner};
use std::collections::BTreeMap;
use std::path::Path;

use crate::output::StyledOutput;
use crate::settings;

/// Run a scan over `dir` with the configured cache
pub fn run_scan(dir: &Path, config: &LineageConfig, fresh: bool) -> anyhow::Result<ScanReport> {
    let units = discover_units(dir)
        .with_context(|| format!("failed to enumerate units in {}", dir.display()))?;
    let cache_path = settings::cache_path(config)?;
    let mut cache = if fresh {
        ScanCache::new(cache_path)
    } else {
        ScanCache::load(cache_path)
    };

    let scanner = SubclassScanner::new(config.scan.clone())?;
    Ok(scanner.scan(&units, &mut cache)?)
}

/// Build the class table the event engine would dispatch over
pub fn hierarchy_of(report: &ScanReport) -> anyhow::Result<ClassHierarchy> {
    let links = report
        .superclasses
        .iter()
        .map(|(class, superclass)| (class.as_str(), superclass.as_str()));
    Ok(ClassHierarchy::from_links(&report.root_class, links)?)
}

pub fn execute(
    out: &mut StyledOutput,
    dir: &Path,
    config: LineageConfig,
    fresh: bool,
    tree: bool,
    json: bool,
) -> anyhow::Result<()> {
    let report = run_scan(dir, &config, fresh)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    out.success("Scanned ");
    out.plain(&format!("{} in {:.2?}\n", dir.display(), report.elapsed));
    out.field("Root:", &report.root_class);
    out.field("Qualifying:", &report.qualifying.len().to_string());
    out.field("Excluded:", &report.excluded.len().to_string());
    out.field("Discovered:", &report.discovered.to_string());
    out.field("Passes:", &report.passes.to_string());
    out.field(
        "Units:",
        &format!(
            "{} cached, {} scanned, {} skipped, {} failed",
            report.units_cached, report.units_scanned, report.units_skipped, report.units_failed
        ),
    );
    out.field(
        "Parsed:",
        &format!("{} classes ({} full)", report.classes_parsed, report.full_parses),
    );
    if let Some(error) = &report.cache_error {
        out.warning("warning: ");
        out.plain(&format!("cache not saved: {}\n", error));
    }

    match hierarchy_of(&report) {
        Ok(hierarchy) => {
            out.field("Max depth:", &max_depth(&hierarchy).to_string());
            if tree {
                out.newline();
                print_tree(out, &hierarchy);
            }
        }
        Err(e) => {
            out.warning("warning: ");
            out.plain(&format!("inconsistent superclass links: {:#}\n", e));
        }
    }

    Ok(())
}

fn max_depth(hierarchy: &ClassHierarchy) -> usize {
    hierarchy
        .iter()
        .map(|(id, _)| hierarchy.ancestors(id).len() - 1)
        .max()
        .unwrap_or(0)
}

fn print_tree(out: &mut StyledOutput, hierarchy: &ClassHierarchy) {
    let mut children: BTreeMap<ClassId, Vec<(&str, ClassId)>> = BTreeMap::new();
    for (id, name) in hierarchy.iter() {
        if let Some(parent) = hierarchy.parent(id) {
            children.entry(parent).or_default().push((name, id));
        }
    }
    for list in children.values_mut() {
        list.sort();
    }

    let mut stack = vec![(hierarchy.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        out.plain(&"  ".repeat(depth));
        let name = hierarchy.name(id).unwrap_or("?");
        if depth == 0 {
            out.bold(name);
        } else {
            out.info(name);
        }
        out.newline();
        if let Some(list) = children.get(&id) {
            stack.extend(list.iter().rev().map(|&(_, child)| (child, depth + 1)));
        }
    }
}
