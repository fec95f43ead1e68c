use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use plugin_permissions::{Action, PermissionEngine, RulesByAction, Scope};
use serde::Serialize;
use tracing::{Level, instrument};

use crate::style;

#[derive(Serialize)]
struct ScopeView {
    path: Option<PathBuf>,
    rules: RulesByAction,
}

/// Print the rules every scope currently stores.
#[instrument(level = Level::TRACE, skip(engine))]
pub fn run(engine: &PermissionEngine, json: bool) -> Result<bool> {
    let views: BTreeMap<Scope, ScopeView> = engine
        .read_all()
        .into_iter()
        .map(|(scope, rules)| {
            let path = engine.store().resolve_path(scope).ok();
            (scope, ScopeView { path, rules })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(true);
    }

    for (scope, view) in &views {
        let path = view
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(unresolved)".into());
        println!("{} {}", style::header(scope.as_str()), style::dim(&path));
        if view.rules.values().all(Vec::is_empty) {
            println!("  {}", style::dim("(no rules)"));
        }
        for action in Action::ALL {
            for rule in view.rules.get(&action).into_iter().flatten() {
                println!("  {:<5} {rule}", style::action(action));
            }
        }
    }
    Ok(true)
}
