use std::process::ExitCode;

use clap::Parser;
use plugin_permissions::{PathResolver, PermissionEngine, SuggestionPolicy};
use tracing::{error, info};

mod cli;
mod cmd;
mod errors;
mod style;
mod tracing_init;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_init::init_tracing(cli.verbose);
    info!(args = ?std::env::args().collect::<Vec<_>>(), "plugin-perms started");

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(command = ?cli.command, "{e:#}");
            errors::display_error(&e, cli.verbose);
            ExitCode::FAILURE
        }
    }
}

/// Dispatches a subcommand. `Ok(false)` means the command ran but found
/// something invalid, which still exits non-zero.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let engine = build_engine(cli);

    match &cli.command {
        Commands::Scan { json } => cmd::scan::run(&engine, *json, cli.verbose),
        Commands::Plan {
            scope,
            json,
            most_restrictive,
        } => {
            let engine = if *most_restrictive {
                engine.with_suggestion_policy(SuggestionPolicy::MostRestrictive)
            } else {
                engine
            };
            cmd::plan::run(&engine, (*scope).into(), *json)
        }
        Commands::Apply {
            scope,
            strategy,
            choices,
        } => cmd::apply::run(&engine, (*scope).into(), (*strategy).into(), choices),
        Commands::Write {
            scope,
            strategy,
            allow,
            ask,
            deny,
        } => cmd::write::run(
            &engine,
            (*scope).into(),
            (*strategy).into(),
            cmd::write::RuleArgs { allow, ask, deny },
        ),
        Commands::Show { json } => cmd::show::run(&engine, *json),
        Commands::Validate { rules } => cmd::validate::run(rules),
    }
}

/// Builds the engine from the global directory overrides.
fn build_engine(cli: &Cli) -> PermissionEngine {
    let mut resolver = PathResolver::new();
    if let Some(home) = cli.home.clone().or_else(dirs::home_dir) {
        resolver = resolver.with_home(home);
    }
    if let Some(project) = &cli.project {
        resolver = resolver.with_project(project);
    }
    if let Some(cache) = &cli.cache_dir {
        resolver = resolver.with_cache_root(cache);
    }
    PermissionEngine::new(resolver)
}
