use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use plugin_permissions::{Action, PermissionEngine, Scope, WriteStrategy};
use tracing::{Level, instrument};

use crate::style;

/// Category key to the action the user chose for it.
pub type Choices = BTreeMap<String, Action>;

/// Apply the choices read from `source` ("-" for stdin) to `scope`.
#[instrument(level = Level::TRACE, skip(engine))]
pub fn run(
    engine: &PermissionEngine,
    scope: Scope,
    strategy: WriteStrategy,
    source: &str,
) -> Result<bool> {
    let choices = read_choices(source)?;
    let path = engine.store().resolve_path(scope)?;

    let written = engine
        .apply(scope, &choices, strategy)
        .with_context(|| format!("failed to apply choices to {} settings", scope))?;

    report_write(&path, written);
    Ok(true)
}

/// Prints whether the settings file changed.
pub fn report_write(path: &Path, written: bool) {
    if written {
        println!("{} {}", style::green("Updated"), path.display());
    } else {
        println!("{} {}", style::dim("No changes to"), path.display());
    }
}

fn read_choices(source: &str) -> Result<Choices> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read choices from stdin")?;
        text
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read choices from {source}"))?
    };
    parse_choices(&text)
}

/// Parses `{"category": "allow" | "ask" | "deny", ...}`.
pub fn parse_choices(text: &str) -> Result<Choices> {
    serde_json::from_str(text)
        .context("choices must be a JSON object mapping category keys to allow, ask or deny")
}
