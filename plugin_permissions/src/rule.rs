//! Rule grammar validation.
//!
//! A rule names a tool and a pattern for that tool:
//!
//! - `Bash(git commit:*)` - any command starting with `git commit`
//! - `Read(src/*.py)` - a file glob
//! - `Edit(*)` - every use of the tool
//!
//! The grammar is deliberately narrow. Rules longer than [`MAX_RULE_LEN`] or
//! containing anything outside ASCII are rejected before the grammar is even
//! consulted, which rules out homoglyphs, zero-width characters and bidi
//! overrides.
//!
//! ```rust
//! use plugin_permissions::{rule::validate, RuleError};
//!
//! assert!(validate("Bash(git:*)").is_ok());
//! assert!(matches!(validate("Bash(ls; rm -rf /)"), Err(RuleError::Malformed(_))));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{Level, instrument};

use crate::error::RuleError;

/// Maximum length of a rule, in characters.
pub const MAX_RULE_LEN: usize = 500;

static RULE_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]\w*\([A-Za-z0-9_.*:/ -]+\)$").expect("rule grammar is a valid regex")
});

/// Checks a single rule against the length limit, the ASCII restriction and
/// the `Tool(pattern)` grammar, in that order.
#[instrument(level = Level::TRACE)]
pub fn validate(rule: &str) -> Result<(), RuleError> {
    let len = rule.chars().count();
    if len > MAX_RULE_LEN {
        return Err(RuleError::too_long(len));
    }

    if let Some((position, character)) = rule.chars().enumerate().find(|(_, c)| !c.is_ascii()) {
        return Err(RuleError::NonAscii {
            position,
            character,
        });
    }

    if !RULE_GRAMMAR.is_match(rule) {
        return Err(RuleError::Malformed(rule.to_string()));
    }

    Ok(())
}

/// Validates a JSON value, rejecting anything that is not a string.
#[instrument(level = Level::TRACE)]
pub fn validate_value(value: &Value) -> Result<(), RuleError> {
    match value {
        Value::String(rule) => validate(rule),
        other => Err(RuleError::NotAString(json_kind(other).to_string())),
    }
}

/// Validates every rule, stopping at the first failure.
///
/// On failure, returns the offending rule along with the reason.
pub fn validate_many<'a, I>(rules: I) -> Result<(), (&'a str, RuleError)>
where
    I: IntoIterator<Item = &'a str>,
{
    for rule in rules {
        validate(rule).map_err(|e| (rule, e))?;
    }
    Ok(())
}

/// Returns true if the rule passes [`validate`].
pub fn is_valid(rule: &str) -> bool {
    validate(rule).is_ok()
}

/// Splits `Tool(pattern)` into its tool and pattern.
///
/// This only checks the outer shape: a non-empty identifier-like tool name,
/// an opening parenthesis and a closing one at the very end.
pub fn split_rule(rule: &str) -> Option<(&str, &str)> {
    let open = rule.find('(')?;
    let inner = rule.strip_suffix(')')?;
    let tool = &rule[..open];
    if tool.is_empty() || !tool.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((tool, &inner[open + 1..]))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
