//! `lineage plan`: List hook sites in the qualifying classes.

use lineage_scan::{discover_units, plan, LineageConfig};
use std::path::Path;

use crate::commands::scan::run_scan;
use crate::output::StyledOutput;

pub fn execute(
    out: &mut StyledOutput,
    dir: &Path,
    config: LineageConfig,
    json: bool,
) -> anyhow::Result<()> {
    let report = run_scan(dir, &config, false)?;
    let units = discover_units(dir)?;
    let hook_plan = plan(&units, &report.qualifying, &config.hook)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hook_plan)?);
        return Ok(());
    }

    out.bold(&format!(
        "{}{}\n",
        config.hook.method_name, config.hook.descriptor
    ));
    for site in &hook_plan.sites {
        out.plain("  ");
        out.info(&site.class);
        out.newline();
    }
    out.newline();
    out.field("Sites:", &hook_plan.sites.len().to_string());
    out.field("Examined:", &hook_plan.classes_examined.to_string());
    if hook_plan.parse_failures > 0 {
        out.warning("warning: ");
        out.plain(&format!(
            "{} qualifying classes could not be parsed\n",
            hook_plan.parse_failures
        ));
    }
    Ok(())
}
