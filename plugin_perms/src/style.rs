//! TTY-aware color helpers for CLI output.
//!
//! Built on the [`console`] crate, which detects whether stdout/stderr is a
//! terminal and respects `NO_COLOR`.

use console::Style;
use plugin_permissions::Action;

fn out() -> Style {
    Style::new()
}

fn err() -> Style {
    Style::new().for_stderr()
}

/// Bold text (for names and titles).
pub fn bold(text: &str) -> String {
    out().bold().apply_to(text).to_string()
}

/// Dim / muted text (for secondary information).
pub fn dim(text: &str) -> String {
    out().dim().apply_to(text).to_string()
}

/// Bold cyan, for section headers.
pub fn header(text: &str) -> String {
    out().cyan().bold().apply_to(text).to_string()
}

/// Cyan (for labels and keys).
pub fn cyan(text: &str) -> String {
    out().cyan().apply_to(text).to_string()
}

/// Green, for success.
pub fn green(text: &str) -> String {
    out().green().apply_to(text).to_string()
}

/// Red, for failures.
pub fn red(text: &str) -> String {
    out().red().apply_to(text).to_string()
}

/// Bold red on stderr.
pub fn err_red_bold(text: &str) -> String {
    err().red().bold().apply_to(text).to_string()
}

/// Dim on stderr.
pub fn err_dim(text: &str) -> String {
    err().dim().apply_to(text).to_string()
}

/// Bold cyan on stderr (hints).
pub fn err_cyan_bold(text: &str) -> String {
    err().cyan().bold().apply_to(text).to_string()
}

/// Colorize an action: allow green, ask yellow, deny red.
pub fn action(action: Action) -> String {
    let style = match action {
        Action::Allow => out().green(),
        Action::Ask => out().yellow(),
        Action::Deny => out().red(),
    };
    style.apply_to(action.as_str()).to_string()
}
