use anyhow::Result;
use plugin_permissions::rule;
use tracing::{Level, debug, instrument};

use crate::style;

/// Check each rule against the grammar. Returns false if any is invalid.
#[instrument(level = Level::TRACE)]
pub fn run(rules: &[String]) -> Result<bool> {
    let mut all_valid = true;
    for candidate in rules {
        match rule::validate(candidate) {
            Ok(()) => println!("{} {candidate}", style::green("ok     ")),
            Err(e) => {
                debug!(rule = %candidate, error = %e, "invalid rule");
                println!("{} {e}", style::red("invalid"));
                all_valid = false;
            }
        }
    }
    Ok(all_valid)
}
