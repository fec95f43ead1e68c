//! Aggregation of plugin declarations into categorized policy.
//!
//! Two independent operations live here:
//!
//! - [`deduplicate_and_categorize`] folds every plugin's declared rules into
//!   one [`Category`] per category key, removing duplicate rules and rules
//!   that a broader wildcard already covers.
//! - [`detect_conflicts`] compares a stored policy against a proposed one and
//!   reports every rule the two file under different actions.
//!
//! Both are total: malformed declaration entries are skipped one at a time
//! and never abort the aggregation.
//!
//! ```rust
//! use plugin_permissions::aggregate::{deduplicate_and_categorize, subsumes};
//! use plugin_permissions::Declaration;
//! use serde_json::json;
//!
//! assert!(subsumes("Bash(git:*)", "Bash(git commit:*)"));
//!
//! let decls: Vec<Declaration> = serde_json::from_value(json!([
//!     {"name": "A", "permissions": {"git": {"rules": ["Bash(git:*)"], "suggested": "allow"}}},
//!     {"name": "B", "permissions": {"git": {"rules": ["Bash(git commit:*)"], "suggested": "deny"}}},
//! ])).unwrap();
//!
//! let categories = deduplicate_and_categorize(&decls);
//! assert_eq!(categories["git"].rules, vec!["Bash(git:*)"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{Level, debug, instrument};

use crate::catalog;
use crate::rule::split_rule;
use crate::types::{Action, Categories, Category, Conflict, Declaration, RulesByAction};

/// How a category's suggested action is chosen when plugins disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionPolicy {
    /// The most permissive suggestion wins (`allow` over `ask` over `deny`).
    #[default]
    MostPermissive,
    /// The most restrictive suggestion wins (`deny` over `ask` over `allow`).
    MostRestrictive,
}

impl SuggestionPolicy {
    /// Returns true if `candidate` should replace `current`.
    ///
    /// Equal priorities never replace, so the first suggestion seen wins ties.
    pub fn prefers(self, candidate: Action, current: Action) -> bool {
        match self {
            SuggestionPolicy::MostPermissive => candidate.priority() < current.priority(),
            SuggestionPolicy::MostRestrictive => candidate.priority() > current.priority(),
        }
    }
}

/// Suggested action for a category that no plugin gave a usable suggestion for.
const DEFAULT_SUGGESTION: Action = Action::Ask;

#[derive(Debug, Default)]
struct CategoryAccumulator {
    rule_lists: Vec<Vec<String>>,
    sources: BTreeSet<String>,
    suggested: Option<Action>,
}

/// Merges declarations into categories using the most-permissive policy.
#[instrument(level = Level::TRACE, skip(declarations))]
pub fn deduplicate_and_categorize(declarations: &[Declaration]) -> Categories {
    deduplicate_and_categorize_with(declarations, SuggestionPolicy::default())
}

/// Merges declarations into categories.
///
/// For every category key seen in any declaration this collects the rules,
/// the contributing plugin names and the suggested action chosen by
/// `policy`, then reduces the rules with [`merge_rules`].
#[instrument(level = Level::TRACE, skip(declarations))]
pub fn deduplicate_and_categorize_with(
    declarations: &[Declaration],
    policy: SuggestionPolicy,
) -> Categories {
    let mut accumulators: BTreeMap<String, CategoryAccumulator> = BTreeMap::new();

    for declaration in declarations {
        for (key, entry) in &declaration.permissions {
            let Some(entry) = entry.as_object() else {
                debug!(plugin = %declaration.name, category = %key, "skipping non-object category entry");
                continue;
            };

            let slot = accumulators.entry(key.clone()).or_default();
            slot.sources.insert(declaration.name.clone());
            slot.rule_lists.push(declared_rules(&declaration.name, key, entry));

            if let Some(candidate) = declared_suggestion(&declaration.name, key, entry) {
                match slot.suggested {
                    Some(current) if !policy.prefers(candidate, current) => {}
                    _ => slot.suggested = Some(candidate),
                }
            }
        }
    }

    accumulators
        .into_iter()
        .map(|(key, slot)| {
            let (label, description) = catalog::describe(&key);
            let category = Category {
                label,
                description,
                rules: merge_rules(&slot.rule_lists),
                suggested: slot.suggested.unwrap_or(DEFAULT_SUGGESTION),
                sources: slot.sources.into_iter().collect(),
            };
            (key, category)
        })
        .collect()
}

fn declared_rules(plugin: &str, category: &str, entry: &Map<String, Value>) -> Vec<String> {
    match entry.get("rules") {
        Some(Value::Array(rules)) => rules
            .iter()
            .filter_map(|rule| match rule {
                Value::String(rule) => Some(rule.clone()),
                other => {
                    debug!(plugin, category, rule = %other, "skipping non-string rule");
                    None
                }
            })
            .collect(),
        None => Vec::new(),
        Some(other) => {
            debug!(plugin, category, rules = %other, "skipping non-list rules");
            Vec::new()
        }
    }
}

fn declared_suggestion(plugin: &str, category: &str, entry: &Map<String, Value>) -> Option<Action> {
    let value = entry.get("suggested")?;
    match value.as_str().map(str::parse::<Action>) {
        Some(Ok(action)) => Some(action),
        _ => {
            debug!(plugin, category, suggested = %value, "ignoring unrecognised suggested action");
            None
        }
    }
}

/// Unions rule lists and drops every rule covered by a broader one.
///
/// The result is sorted and contains no duplicates. When two distinct rules
/// cover each other (`Read(a*)` and `Read(a**)`), the lexicographically
/// smaller one is kept.
pub fn merge_rules<L, S>(lists: impl IntoIterator<Item = L>) -> Vec<String>
where
    L: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let union: BTreeSet<String> = lists
        .into_iter()
        .flatten()
        .map(|rule| rule.as_ref().to_string())
        .collect();

    union
        .iter()
        .filter(|narrow| {
            !union.iter().any(|broad| {
                broad != *narrow
                    && subsumes(broad, narrow)
                    && (!subsumes(narrow, broad) || broad < *narrow)
            })
        })
        .cloned()
        .collect()
}

/// Returns true if `broad` covers everything `narrow` covers.
///
/// Both rules must name the same tool. Then:
///
/// - a pattern of exactly `*` covers every use of the tool;
/// - if both patterns end in `:*`, `broad` covers `narrow` when narrow's
///   prefix starts with broad's prefix (`git:*` covers `git commit:*`);
/// - otherwise, if broad's pattern ends in `*`, it covers any pattern that
///   starts with broad's pattern minus the `*` (`src/*` covers `src/a.py`).
///
/// Rules that do not have the `Tool(pattern)` shape never subsume anything.
pub fn subsumes(broad: &str, narrow: &str) -> bool {
    let (Some((broad_tool, broad_pattern)), Some((narrow_tool, narrow_pattern))) =
        (split_rule(broad), split_rule(narrow))
    else {
        return false;
    };

    if broad_tool != narrow_tool {
        return false;
    }

    if broad_pattern == "*" {
        return true;
    }

    if let (Some(broad_prefix), Some(narrow_prefix)) =
        (broad_pattern.strip_suffix(":*"), narrow_pattern.strip_suffix(":*"))
    {
        return narrow_prefix.starts_with(broad_prefix);
    }

    match broad_pattern.strip_suffix('*') {
        Some(stem) => narrow_pattern.starts_with(stem),
        None => false,
    }
}

/// Files each category's rules under its suggested action.
pub fn proposed_policy(categories: &Categories) -> RulesByAction {
    let mut policy = RulesByAction::new();
    for category in categories.values() {
        if category.rules.is_empty() {
            continue;
        }
        policy
            .entry(category.suggested)
            .or_default()
            .extend(category.rules.iter().cloned());
    }
    for rules in policy.values_mut() {
        rules.sort();
        rules.dedup();
    }
    policy
}

/// Reports every rule in `proposed` that `current` files under a different
/// action.
///
/// Each side is flattened `allow`, `ask`, `deny` in that order, so a rule
/// listed twice on one side takes its last action. Rules present on only
/// one side are not conflicts. The result is sorted by rule.
#[instrument(level = Level::TRACE, skip(current, proposed))]
pub fn detect_conflicts(current: &RulesByAction, proposed: &RulesByAction) -> Vec<Conflict> {
    let current = flatten(current);
    let proposed = flatten(proposed);

    proposed
        .into_iter()
        .filter_map(|(rule, proposed_action)| {
            let current_action = *current.get(rule)?;
            (current_action != proposed_action).then(|| Conflict {
                rule: rule.to_string(),
                current_action,
                proposed_action,
                category: infer_category(rule).to_string(),
            })
        })
        .collect()
}

fn flatten(policy: &RulesByAction) -> BTreeMap<&str, Action> {
    let mut lookup = BTreeMap::new();
    for action in Action::ALL {
        for rule in policy.get(&action).into_iter().flatten() {
            lookup.insert(rule.as_str(), action);
        }
    }
    lookup
}

/// Guesses the category a rule belongs to from its tool and pattern.
pub fn infer_category(rule: &str) -> &'static str {
    let (tool, pattern) = split_rule(rule).unwrap_or((rule, ""));

    if tool.starts_with("mcp__") {
        return "mcp";
    }

    match tool {
        "Edit" | "Write" | "MultiEdit" | "NotebookEdit" => "file-edit",
        "Read" | "Glob" | "Grep" | "LS" | "NotebookRead" => "file-read",
        "Bash" if pattern.starts_with("git") => "git",
        "Bash" if pattern.starts_with("docker") => "docker",
        _ => "terminal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn declarations(value: Value) -> Vec<Declaration> {
        serde_json::from_value(value).unwrap()
    }

    fn policy(value: Value) -> RulesByAction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_subsumes_colon_prefix() {
        assert!(subsumes("Bash(git:*)", "Bash(git commit:*)"));
        assert!(!subsumes("Bash(git commit:*)", "Bash(git:*)"));
    }

    #[test]
    fn test_subsumes_star_covers_tool() {
        assert!(subsumes("Edit(*)", "Edit(src/main.rs)"));
        assert!(subsumes("Bash(*)", "Bash(git:*)"));
        assert!(!subsumes("Edit(*)", "Write(src/main.rs)"));
    }

    #[test]
    fn test_subsumes_trailing_star() {
        assert!(subsumes("Read(src/*)", "Read(src/lib/mod.py)"));
        assert!(subsumes("Read(src/*)", "Read(src/*.py)"));
        assert!(!subsumes("Read(src/*)", "Read(tests/a.py)"));
        assert!(!subsumes("Read(src/a.py)", "Read(src/a.py:*)"));
    }

    #[test]
    fn test_subsumes_requires_same_tool_and_shape() {
        assert!(!subsumes("Bash(git:*)", "Read(git:*)"));
        assert!(!subsumes("Bash(git:*)", "Bash(git status)"));
        assert!(!subsumes("Bash", "Bash(git:*)"));
        assert!(!subsumes("Bash(*)", "garbage"));
    }

    #[test]
    fn test_merge_rules_dedups_and_sorts() {
        let merged = merge_rules([
            vec!["Read(b)", "Bash(git:*)"],
            vec!["Bash(git commit:*)", "Read(b)", "Bash(npm test)"],
        ]);
        assert_eq!(merged, vec!["Bash(git:*)", "Bash(npm test)", "Read(b)"]);
    }

    #[test]
    fn test_merge_rules_keeps_one_of_mutually_covering_rules() {
        let merged = merge_rules([vec!["Read(a**)", "Read(a*)"]]);
        assert_eq!(merged, vec!["Read(a*)"]);
    }

    #[test]
    fn test_merge_rules_empty() {
        let merged = merge_rules(Vec::<Vec<String>>::new());
        assert!(merged.is_empty());
    }

    #[test]
    fn test_categorize_subsumption_and_permissive_suggestion() {
        let decls = declarations(json!([
            {"name": "A", "permissions": {"git": {"rules": ["Bash(git:*)"], "suggested": "allow"}}},
            {"name": "B", "permissions": {"git": {"rules": ["Bash(git commit:*)"], "suggested": "deny"}}},
        ]));

        let categories = deduplicate_and_categorize(&decls);
        let git = &categories["git"];
        assert_eq!(git.rules, vec!["Bash(git:*)"]);
        assert_eq!(git.suggested, Action::Allow);
        assert_eq!(git.sources, vec!["A", "B"]);
        assert_eq!(git.label, "Git operations");
    }

    #[test]
    fn test_categorize_first_seen_wins_ties() {
        let decls = declarations(json!([
            {"name": "A", "permissions": {"terminal": {"rules": ["Bash(make:*)"], "suggested": "ask"}}},
            {"name": "B", "permissions": {"terminal": {"rules": ["Bash(cargo:*)"], "suggested": "ask"}}},
        ]));

        let categories = deduplicate_and_categorize(&decls);
        assert_eq!(categories["terminal"].suggested, Action::Ask);
        assert_eq!(categories["terminal"].rules, vec!["Bash(cargo:*)", "Bash(make:*)"]);
    }

    #[test]
    fn test_categorize_most_restrictive_policy() {
        let decls = declarations(json!([
            {"name": "A", "permissions": {"git": {"rules": ["Bash(git:*)"], "suggested": "allow"}}},
            {"name": "B", "permissions": {"git": {"rules": [], "suggested": "deny"}}},
        ]));

        let categories = deduplicate_and_categorize_with(&decls, SuggestionPolicy::MostRestrictive);
        assert_eq!(categories["git"].suggested, Action::Deny);
    }

    #[test]
    fn test_categorize_unknown_category_gets_label() {
        let decls = declarations(json!([
            {"name": "cloud", "permissions": {"cloud-deploy": {"rules": ["Bash(terraform:*)"], "suggested": "ask"}}},
        ]));

        let categories = deduplicate_and_categorize(&decls);
        assert_eq!(categories["cloud-deploy"].label, "Cloud Deploy");
    }

    #[test]
    fn test_categorize_skips_malformed_entries() {
        let decls = declarations(json!([
            {"name": "broken", "permissions": {
                "git": "not an object",
                "docker": {"rules": "Bash(docker:*)", "suggested": "allow"},
                "file-read": {"rules": ["Read(*)", 7, null], "suggested": "sometimes"},
            }},
            {"name": "fine", "permissions": {"git": {"rules": ["Bash(git status)"], "suggested": "ask"}}},
        ]));

        let categories = deduplicate_and_categorize(&decls);

        assert_eq!(categories["git"].sources, vec!["fine"]);
        assert_eq!(categories["git"].rules, vec!["Bash(git status)"]);

        assert!(categories["docker"].rules.is_empty());
        assert_eq!(categories["docker"].suggested, Action::Allow);

        assert_eq!(categories["file-read"].rules, vec!["Read(*)"]);
        assert_eq!(categories["file-read"].suggested, DEFAULT_SUGGESTION);
    }

    #[test]
    fn test_categorize_empty_input() {
        assert!(deduplicate_and_categorize(&[]).is_empty());
    }

    #[test]
    fn test_proposed_policy_groups_by_suggestion() {
        let decls = declarations(json!([
            {"name": "A", "permissions": {
                "git": {"rules": ["Bash(git:*)"], "suggested": "allow"},
                "file-read": {"rules": ["Read(*)"], "suggested": "allow"},
                "docker": {"rules": ["Bash(docker:*)"], "suggested": "deny"},
            }},
        ]));

        let proposed = proposed_policy(&deduplicate_and_categorize(&decls));
        assert_eq!(
            proposed,
            policy(json!({"allow": ["Bash(git:*)", "Read(*)"], "deny": ["Bash(docker:*)"]}))
        );
    }

    #[test]
    fn test_detect_conflicts_single() {
        let conflicts = detect_conflicts(
            &policy(json!({"allow": ["Bash(git:*)"]})),
            &policy(json!({"deny": ["Bash(git:*)"]})),
        );

        assert_eq!(
            conflicts,
            vec![Conflict {
                rule: "Bash(git:*)".into(),
                current_action: Action::Allow,
                proposed_action: Action::Deny,
                category: "git".into(),
            }]
        );
    }

    #[test]
    fn test_detect_conflicts_ignores_one_sided_and_agreeing_rules() {
        let conflicts = detect_conflicts(
            &policy(json!({"allow": ["Read(*)", "Bash(ls)"], "deny": ["Edit(*)"]})),
            &policy(json!({"allow": ["Read(*)", "Write(*)"], "ask": ["Edit(*)"]})),
        );

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].rule, "Edit(*)");
        assert_eq!(conflicts[0].current_action, Action::Deny);
        assert_eq!(conflicts[0].proposed_action, Action::Ask);
        assert_eq!(conflicts[0].category, "file-edit");
    }

    #[test]
    fn test_detect_conflicts_last_action_wins_within_side() {
        let conflicts = detect_conflicts(
            &policy(json!({"allow": ["Bash(docker:*)"], "deny": ["Bash(docker:*)"]})),
            &policy(json!({"allow": ["Bash(docker:*)"]})),
        );

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].current_action, Action::Deny);
        assert_eq!(conflicts[0].category, "docker");
    }

    #[test]
    fn test_detect_conflicts_empty() {
        assert!(detect_conflicts(&RulesByAction::new(), &RulesByAction::new()).is_empty());
    }

    #[test]
    fn test_infer_category() {
        assert_eq!(infer_category("Write(src/a.rs)"), "file-edit");
        assert_eq!(infer_category("Grep(*)"), "file-read");
        assert_eq!(infer_category("Bash(git push:*)"), "git");
        assert_eq!(infer_category("Bash(docker compose up)"), "docker");
        assert_eq!(infer_category("mcp__github__create_issue(*)"), "mcp");
        assert_eq!(infer_category("mcp__github__create_issue"), "mcp");
        assert_eq!(infer_category("Bash(npm test)"), "terminal");
        assert_eq!(infer_category("WebFetch"), "terminal");
    }

    #[test]
    fn test_infer_category_prefixes_only_apply_to_bash() {
        assert_eq!(infer_category("WebFetch(github.com/x)"), "terminal");
        assert_eq!(infer_category("Task(docker-helper)"), "terminal");
        assert_eq!(infer_category("Bash(github-cli:*)"), "git");
    }

    proptest! {
        #[test]
        fn prop_merge_rules_idempotent_under_duplicate_lists(
            rules in proptest::collection::vec("(Bash|Read)\\([a-c* :]{1,6}\\)", 0..12),
        ) {
            let once = merge_rules([rules.clone()]);
            let twice = merge_rules([rules.clone(), rules]);
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(merge_rules([once.clone()]), once);
        }
    }
}
