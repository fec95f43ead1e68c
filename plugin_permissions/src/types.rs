//! Type definitions shared across the engine.
//!
//! Actions, scopes and strategies parse from their lowercase names and fail
//! on anything else. Declarations keep the raw JSON they were scanned from so
//! the aggregator can skip malformed entries one at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SettingsError;

/// The decision a rule is filed under.
///
/// Ordered by permissiveness: `Allow` < `Ask` < `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Permission is granted without confirmation.
    Allow,
    /// Permission requires user confirmation.
    Ask,
    /// Permission is explicitly denied.
    Deny,
}

impl Action {
    /// All actions, most permissive first.
    pub const ALL: [Action; 3] = [Action::Allow, Action::Ask, Action::Deny];

    /// Numeric priority; lower is more permissive.
    pub fn priority(self) -> u8 {
        match self {
            Action::Allow => 0,
            Action::Ask => 1,
            Action::Deny => 2,
        }
    }

    /// The key this action is stored under in a settings file.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Ask => "ask",
            Action::Deny => "deny",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Action::Allow),
            "ask" => Ok(Action::Ask),
            "deny" => Ok(Action::Deny),
            other => Err(SettingsError::UnknownAction(other.to_string())),
        }
    }
}

/// A storage location for persisted policy.
///
/// Each scope maps to exactly one settings file. Precedence between scopes is
/// decided by whatever enforces the rules, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// `~/.claude/settings.json`
    User,
    /// `<project>/.claude/settings.json`
    Project,
    /// `<project>/.claude/settings.local.json`
    Local,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::User, Scope::Project, Scope::Local];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Project => "project",
            Scope::Local => "local",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Scope::User),
            "project" => Ok(Scope::Project),
            "local" => Ok(Scope::Local),
            other => Err(SettingsError::UnknownScope(other.to_string())),
        }
    }
}

/// How new rules are combined with what a settings file already holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStrategy {
    /// Union new rules into the existing bucket for each action.
    #[default]
    Merge,
    /// Overwrite the buckets for the actions present in the new rules.
    Replace,
}

impl fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStrategy::Merge => f.write_str("merge"),
            WriteStrategy::Replace => f.write_str("replace"),
        }
    }
}

impl FromStr for WriteStrategy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(WriteStrategy::Merge),
            "replace" => Ok(WriteStrategy::Replace),
            other => Err(SettingsError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Rules grouped by the action they are filed under.
pub type RulesByAction = BTreeMap<Action, Vec<String>>;

/// One plugin's self-reported permissions, as found in its manifest.
///
/// `permissions` maps a category key to `{"rules": [...], "suggested": ...}`.
/// It is kept as raw JSON; the aggregator skips entries with the wrong shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Display name of the plugin.
    pub name: String,
    /// Category key to declared rules and suggested action.
    #[serde(default)]
    pub permissions: Map<String, Value>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, permissions: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }

    /// Returns the declared category keys.
    pub fn category_keys(&self) -> impl Iterator<Item = &str> {
        self.permissions.keys().map(String::as_str)
    }
}

/// A group of related rules assembled from every declaring plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Human label, e.g. "File editing".
    pub label: String,
    /// One-line description shown next to the label.
    pub description: String,
    /// Deduplicated, subsumption-reduced, sorted rules.
    pub rules: Vec<String>,
    /// The action suggested for the whole category.
    pub suggested: Action,
    /// Sorted, unique names of the plugins that asked for this category.
    pub sources: Vec<String>,
}

/// Categories keyed by category key.
pub type Categories = BTreeMap<String, Category>;

/// A rule that two policies file under different actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub rule: String,
    pub current_action: Action,
    pub proposed_action: Action,
    /// Best-effort category, inferred from the rule text.
    pub category: String,
}
