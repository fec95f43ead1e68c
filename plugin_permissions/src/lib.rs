//! # Plugin Permissions
//!
//! Collects the permission rules that installed plugins ask for, folds them
//! into a small set of reviewable categories, and writes the user's decisions
//! into allow/ask/deny settings files.
//!
//! ## Overview
//!
//! Plugins declare permissions in their manifest, grouped by category:
//!
//! ```json
//! {
//!   "name": "git-helper",
//!   "permissions": {
//!     "git": { "rules": ["Bash(git:*)"], "suggested": "allow" }
//!   }
//! }
//! ```
//!
//! The engine works in stages:
//!
//! 1. [`scan`] walks the plugin cache and yields one [`Declaration`] per plugin.
//! 2. [`aggregate`] merges declarations into [`Category`] values, dropping
//!    rules a broader wildcard already covers, and compares policies to find
//!    [`Conflict`]s.
//! 3. [`io`] reads and atomically writes the settings file for each [`Scope`]:
//!
//!    - **User** (`~/.claude/settings.json`)
//!    - **Project** (`.claude/settings.json`)
//!    - **Local** (`.claude/settings.local.json`)
//!
//! Nothing here enforces the rules; it only writes them down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use plugin_permissions::{Action, PathResolver, PermissionEngine, Scope, WriteStrategy};
//!
//! let engine = PermissionEngine::new(PathResolver::new());
//!
//! // Phase one: what do plugins want, and what does it clash with?
//! let plan = engine.plan(Scope::Local);
//! for (key, category) in &plan.categories {
//!     println!("{key}: {} ({})", category.label, category.suggested);
//! }
//!
//! // Phase two: apply the user's choices.
//! let choices = BTreeMap::from([("git".to_string(), Action::Allow)]);
//! engine.apply(Scope::Local, &choices, WriteStrategy::Merge)?;
//! # Ok::<(), plugin_permissions::WriteError>(())
//! ```

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod io;
pub mod merge;
pub mod paths;
pub mod rule;
pub mod scan;
pub mod types;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{Level, info, instrument};

pub use aggregate::{SuggestionPolicy, detect_conflicts, subsumes};
pub use error::{Result, RuleError, SettingsError, SkipReason, WriteError};
pub use io::SettingsStore;
pub use paths::PathResolver;
pub use rule::validate;
pub use scan::{DeclarationScanner, ScanReport};
pub use types::{
    Action, Categories, Category, Conflict, Declaration, RulesByAction, Scope, WriteStrategy,
};

/// Everything a caller needs to ask the user about one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The scope the plan was computed against.
    pub scope: Scope,
    /// Categories requested by installed plugins.
    pub categories: Categories,
    /// Rules whose suggested action differs from what the scope stores.
    pub conflicts: Vec<Conflict>,
}

/// High-level entry point wiring the scanner, aggregator and settings store.
///
/// # Example
///
/// ```rust
/// use plugin_permissions::{PathResolver, PermissionEngine, Scope};
///
/// let resolver = PathResolver::new()
///     .with_home("/custom/home")
///     .with_project("/custom/project")
///     .with_cache_root("/custom/cache");
///
/// let engine = PermissionEngine::new(resolver);
/// assert!(engine.scan().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    store: SettingsStore,
    cache_root: Option<std::path::PathBuf>,
    suggestion_policy: SuggestionPolicy,
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::new(PathResolver::new())
    }
}

impl PermissionEngine {
    /// Creates an engine that resolves every path through `resolver`.
    pub fn new(resolver: PathResolver) -> Self {
        let cache_root = resolver.plugin_cache_root().ok();
        Self {
            store: SettingsStore::with_resolver(resolver),
            cache_root,
            suggestion_policy: SuggestionPolicy::default(),
        }
    }

    /// Chooses how disagreeing suggestions are resolved.
    pub fn with_suggestion_policy(mut self, policy: SuggestionPolicy) -> Self {
        self.suggestion_policy = policy;
        self
    }

    /// Returns the settings store.
    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Returns a scanner over the plugin cache, if a cache root is known.
    pub fn scanner(&self) -> Option<DeclarationScanner> {
        self.cache_root.as_ref().map(DeclarationScanner::new)
    }

    /// Scans the plugin cache and reports skipped candidates.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn scan_report(&self) -> ScanReport {
        self.scanner()
            .map(|scanner| scanner.scan_report())
            .unwrap_or_default()
    }

    /// Returns the declarations found in the plugin cache.
    pub fn scan(&self) -> Vec<Declaration> {
        self.scan_report().declarations
    }

    /// Scans and aggregates into categories.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn categorize(&self) -> Categories {
        aggregate::deduplicate_and_categorize_with(&self.scan(), self.suggestion_policy)
    }

    /// Builds the phase one plan for a scope: categories plus the conflicts
    /// their suggested actions would cause with what the scope stores.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn plan(&self, scope: Scope) -> Plan {
        let categories = self.categorize();
        let proposed = aggregate::proposed_policy(&categories);
        let conflicts = detect_conflicts(&self.store.read(scope), &proposed);
        Plan {
            scope,
            categories,
            conflicts,
        }
    }

    /// Reads the policy stored for every scope.
    pub fn read_all(&self) -> BTreeMap<Scope, RulesByAction> {
        self.store.read_all()
    }

    /// Writes explicit rules to a scope.
    pub fn write(
        &self,
        scope: Scope,
        rules: &RulesByAction,
        strategy: WriteStrategy,
    ) -> std::result::Result<bool, WriteError> {
        self.store.write(scope, rules, strategy)
    }

    /// Applies phase two choices: each chosen category's rules are filed
    /// under the chosen action and written to `scope`.
    ///
    /// Categories are recomputed from a fresh scan. A choice naming a
    /// category the scan did not produce aborts before anything is written.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn apply(
        &self,
        scope: Scope,
        choices: &BTreeMap<String, Action>,
        strategy: WriteStrategy,
    ) -> std::result::Result<bool, WriteError> {
        let categories = self.categorize();
        let rules = rules_for_choices(&categories, choices)?;
        let written = self.store.write(scope, &rules, strategy)?;
        info!(%scope, %strategy, categories = choices.len(), written, "applied permission choices");
        Ok(written)
    }
}

/// Files the rules of each chosen category under the chosen action.
pub fn rules_for_choices(
    categories: &Categories,
    choices: &BTreeMap<String, Action>,
) -> std::result::Result<RulesByAction, WriteError> {
    let mut rules = RulesByAction::new();
    for (key, action) in choices {
        let category = categories
            .get(key)
            .ok_or_else(|| WriteError::UnknownCategory(key.clone()))?;
        rules
            .entry(*action)
            .or_default()
            .extend(category.rules.iter().cloned());
    }
    for bucket in rules.values_mut() {
        bucket.sort();
        bucket.dedup();
    }
    Ok(rules)
}
