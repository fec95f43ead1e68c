use std::fmt::Display;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use plugin_permissions::{Scope, WriteStrategy};

#[derive(Parser, Debug)]
#[command(name = "plugin-perms")]
#[command(version)]
#[command(about = "Review and apply the permissions installed plugins ask for")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Home directory holding user settings and the plugin cache
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Project directory holding project and local settings
    #[arg(long, global = true, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Plugin cache to scan instead of <home>/.claude/plugins/cache
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, Default, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab_case")]
pub enum ScopeArg {
    User,
    Project,
    #[default]
    Local,
}

impl Display for ScopeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Scope::from(*self).fmt(f)
    }
}

impl From<ScopeArg> for Scope {
    fn from(val: ScopeArg) -> Self {
        match val {
            ScopeArg::User => Scope::User,
            ScopeArg::Project => Scope::Project,
            ScopeArg::Local => Scope::Local,
        }
    }
}

#[derive(Clone, Debug, Default, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab_case")]
pub enum StrategyArg {
    #[default]
    Merge,
    Replace,
}

impl Display for StrategyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        WriteStrategy::from(*self).fmt(f)
    }
}

impl From<StrategyArg> for WriteStrategy {
    fn from(val: StrategyArg) -> Self {
        match val {
            StrategyArg::Merge => WriteStrategy::Merge,
            StrategyArg::Replace => WriteStrategy::Replace,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List plugins that declare permissions
    Scan {
        /// Output as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Show requested permission categories and conflicts with a scope
    Plan {
        /// Settings scope to compare against
        #[arg(long, default_value_t)]
        scope: ScopeArg,

        /// Output as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Suggest the most restrictive action when plugins disagree
        #[arg(long)]
        most_restrictive: bool,
    },

    /// Apply per-category choices to a scope
    ///
    /// Choices are a JSON object mapping category keys to "allow", "ask" or
    /// "deny", read from a file or from stdin.
    Apply {
        /// Settings scope to write
        #[arg(long, default_value_t)]
        scope: ScopeArg,

        /// How to combine with rules already in the file
        #[arg(long, default_value_t)]
        strategy: StrategyArg,

        /// Path to the choices JSON, or "-" for stdin
        #[arg(long, default_value = "-", value_name = "FILE")]
        choices: String,
    },

    /// Write explicit rules to a scope
    Write {
        /// Settings scope to write
        #[arg(long, default_value_t)]
        scope: ScopeArg,

        /// How to combine with rules already in the file
        #[arg(long, default_value_t)]
        strategy: StrategyArg,

        /// Rule to allow (repeatable)
        #[arg(long, value_name = "RULE")]
        allow: Vec<String>,

        /// Rule that requires confirmation (repeatable)
        #[arg(long, value_name = "RULE")]
        ask: Vec<String>,

        /// Rule to deny (repeatable)
        #[arg(long, value_name = "RULE")]
        deny: Vec<String>,
    },

    /// Show the rules stored in every scope
    Show {
        /// Output as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Check rules against the rule grammar
    Validate {
        #[arg(required = true, value_name = "RULE")]
        rules: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_defaults_to_local_scope() {
        let cli = Cli::try_parse_from(["plugin-perms", "plan"]).unwrap();
        match cli.command {
            Commands::Plan {
                scope,
                json,
                most_restrictive,
            } => {
                assert_eq!(scope, ScopeArg::Local);
                assert!(!json);
                assert!(!most_restrictive);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_roots_after_subcommand() {
        let cli = Cli::try_parse_from([
            "plugin-perms",
            "apply",
            "--scope",
            "project",
            "--strategy",
            "replace",
            "--home",
            "/h",
            "--cache-dir",
            "/c",
        ])
        .unwrap();

        assert_eq!(cli.home, Some(PathBuf::from("/h")));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/c")));
        assert!(matches!(
            cli.command,
            Commands::Apply {
                scope: ScopeArg::Project,
                strategy: StrategyArg::Replace,
                ref choices,
            } if choices == "-"
        ));
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        assert!(Cli::try_parse_from(["plugin-perms", "plan", "--scope", "system"]).is_err());
    }

    #[test]
    fn test_validate_requires_rules() {
        assert!(Cli::try_parse_from(["plugin-perms", "validate"]).is_err());
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(Scope::from(ScopeArg::User), Scope::User);
        assert_eq!(WriteStrategy::from(StrategyArg::Replace), WriteStrategy::Replace);
        assert_eq!(ScopeArg::Local.to_string(), "local");
    }
}
