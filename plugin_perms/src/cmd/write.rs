use anyhow::{Context, Result, bail};
use plugin_permissions::{Action, PermissionEngine, RulesByAction, Scope, WriteStrategy};
use tracing::{Level, instrument};

use super::apply::report_write;

/// Rules given on the command line, one list per action.
#[derive(Debug)]
pub struct RuleArgs<'a> {
    pub allow: &'a [String],
    pub ask: &'a [String],
    pub deny: &'a [String],
}

impl RuleArgs<'_> {
    /// Only actions with at least one rule are included, so `replace` leaves
    /// the other keys alone.
    fn into_rules(self) -> RulesByAction {
        [
            (Action::Allow, self.allow),
            (Action::Ask, self.ask),
            (Action::Deny, self.deny),
        ]
        .into_iter()
        .filter(|(_, rules)| !rules.is_empty())
        .map(|(action, rules)| (action, rules.to_vec()))
        .collect()
    }
}

/// Write explicit rules to `scope`.
#[instrument(level = Level::TRACE, skip(engine))]
pub fn run(
    engine: &PermissionEngine,
    scope: Scope,
    strategy: WriteStrategy,
    args: RuleArgs<'_>,
) -> Result<bool> {
    let rules = args.into_rules();
    if rules.is_empty() {
        bail!("nothing to write; pass at least one --allow, --ask or --deny rule");
    }

    let path = engine.store().resolve_path(scope)?;
    let written = engine
        .write(scope, &rules, strategy)
        .with_context(|| format!("failed to write {} settings", scope))?;

    report_write(&path, written);
    Ok(true)
}
