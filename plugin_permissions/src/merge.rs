//! Merge and replace strategies over a settings document.
//!
//! A settings document is a JSON object. Only the `allow`, `ask` and `deny`
//! keys are ever touched; everything else is carried through unchanged and in
//! its original order.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::types::{Action, RulesByAction, WriteStrategy};

/// A settings file's top-level JSON object.
pub type SettingsDocument = Map<String, Value>;

/// Returns the string rules filed under `action`.
///
/// A missing key, a non-list value and non-string entries all read as
/// nothing.
pub fn rules_for(document: &SettingsDocument, action: Action) -> Vec<String> {
    match document.get(action.as_str()) {
        Some(Value::Array(rules)) => rules
            .iter()
            .filter_map(|rule| rule.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Extracts the policy from a document.
///
/// Only action keys that hold a list appear in the result.
pub fn policy_of(document: &SettingsDocument) -> RulesByAction {
    Action::ALL
        .into_iter()
        .filter(|action| matches!(document.get(action.as_str()), Some(Value::Array(_))))
        .map(|action| (action, rules_for(document, action)))
        .collect()
}

/// Applies new rules to a document in place.
///
/// - [`WriteStrategy::Merge`]: for every action with at least one new rule,
///   the bucket becomes the set union of existing and new rules.
/// - [`WriteStrategy::Replace`]: for every action present in `rules`, the
///   bucket becomes exactly the new rules.
///
/// Buckets are written deduplicated and sorted.
pub fn apply_rules(document: &mut SettingsDocument, rules: &RulesByAction, strategy: WriteStrategy) {
    for (action, new_rules) in rules {
        let bucket: BTreeSet<String> = match strategy {
            WriteStrategy::Merge if new_rules.is_empty() => continue,
            WriteStrategy::Merge => rules_for(document, *action)
                .into_iter()
                .chain(new_rules.iter().cloned())
                .collect(),
            WriteStrategy::Replace => new_rules.iter().cloned().collect(),
        };

        document.insert(
            action.as_str().to_string(),
            Value::Array(bucket.into_iter().map(Value::String).collect()),
        );
    }
}
