use anyhow::Result;
use plugin_permissions::{Plan, PermissionEngine, Scope};
use tracing::{Level, instrument};

use crate::style;

/// Print the categories plugins request and the conflicts with `scope`.
#[instrument(level = Level::TRACE, skip(engine))]
pub fn run(engine: &PermissionEngine, scope: Scope, json: bool) -> Result<bool> {
    let plan = engine.plan(scope);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(true)
}

fn print_plan(plan: &Plan) {
    if plan.categories.is_empty() {
        println!("{}", style::dim("No plugins request permissions."));
        return;
    }

    println!("{}", style::header("Requested permissions"));
    println!("{}", style::dim("─────────────────────"));
    for (key, category) in &plan.categories {
        println!(
            "  {} {}  suggested: {}",
            style::bold(&category.label),
            style::cyan(&format!("[{key}]")),
            style::action(category.suggested)
        );
        println!("    {}", style::dim(&category.description));
        for rule in &category.rules {
            println!("    - {rule}");
        }
        println!(
            "    {}",
            style::dim(&format!("requested by {}", category.sources.join(", ")))
        );
    }

    if plan.conflicts.is_empty() {
        return;
    }
    println!();
    println!(
        "{}",
        style::header(&format!("Conflicts with {} settings", plan.scope))
    );
    println!("{}", style::dim("─────────────────────"));
    for conflict in &plan.conflicts {
        println!(
            "  {}  {} -> {}  {}",
            conflict.rule,
            style::action(conflict.current_action),
            style::action(conflict.proposed_action),
            style::dim(&format!("({})", conflict.category))
        );
    }
}
