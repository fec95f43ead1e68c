use anyhow::Result;
use plugin_permissions::PermissionEngine;
use tracing::{Level, instrument};

use crate::style;

/// List the plugins that declare permissions.
#[instrument(level = Level::TRACE, skip(engine))]
pub fn run(engine: &PermissionEngine, json: bool, verbose: bool) -> Result<bool> {
    let report = engine.scan_report();

    if json {
        println!("{}", serde_json::to_string_pretty(&report.declarations)?);
        return Ok(true);
    }

    if report.declarations.is_empty() {
        println!("{}", style::dim("No plugins declare permissions."));
    }
    for declaration in &report.declarations {
        let keys: Vec<_> = declaration.category_keys().collect();
        println!(
            "  {}  {}",
            style::bold(&declaration.name),
            style::dim(&keys.join(", "))
        );
    }

    if !report.skipped.is_empty() {
        println!();
        println!(
            "{}",
            style::dim(&format!("{} candidate(s) skipped", report.skipped.len()))
        );
        if verbose {
            for (_, reason) in &report.skipped {
                println!("  {}", style::dim(&reason.to_string()));
            }
        }
    }
    Ok(true)
}
