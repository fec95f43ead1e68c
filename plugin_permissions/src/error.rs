//! Error types for the plugin permissions library.
//!
//! Reads and scans are best-effort and report problems through
//! [`SkipReason`]; writes are strict and report through [`WriteError`].

use std::path::PathBuf;
use thiserror::Error;

use crate::rule::MAX_RULE_LEN;
use crate::types::Action;

/// Why a single rule string was rejected by the grammar validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The value handed to the validator was not a string.
    #[error("rule must be a string, got {0}")]
    NotAString(String),

    /// The rule exceeds the maximum length.
    #[error("rule is {len} characters long, exceeding the {max} character limit")]
    TooLong { len: usize, max: usize },

    /// The rule contains a character outside the ASCII range.
    #[error("rule contains non-ASCII character {character:?} at position {position}")]
    NonAscii { position: usize, character: char },

    /// The rule does not match `Tool(pattern)`.
    #[error(
        "rule {0:?} does not match Tool(pattern); patterns may only contain letters, digits and _ . * : / - or spaces"
    )]
    Malformed(String),
}

impl RuleError {
    pub(crate) fn too_long(len: usize) -> Self {
        RuleError::TooLong {
            len,
            max: MAX_RULE_LEN,
        }
    }
}

/// Why the scanner skipped a candidate plugin.
///
/// Skips are never fatal; they are logged and collected in the scan report.
#[derive(Error, Debug)]
pub enum SkipReason {
    /// The entry is a symbolic link and is not followed.
    #[error("{0} is a symbolic link")]
    Symlink(PathBuf),

    /// The entry resolves to a location outside the cache root.
    #[error("{0} resolves outside the plugin cache")]
    OutsideRoot(PathBuf),

    /// The manifest path exists but is not a regular file.
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    /// The manifest could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest exceeds the size limit.
    #[error("manifest {path} is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The manifest is not valid JSON.
    #[error("failed to parse manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest is valid JSON but not an object.
    #[error("manifest {0} is not a JSON object")]
    NotAnObject(PathBuf),

    /// The manifest declares no permission categories.
    #[error("manifest {0} declares no permissions")]
    NoPermissions(PathBuf),
}

/// Errors that abort a settings write.
///
/// When any of these is returned the target settings file is unchanged.
#[derive(Error, Debug)]
pub enum WriteError {
    /// A rule failed validation; nothing was written.
    #[error("refusing to write invalid {action} rule {rule:?}: {source}")]
    InvalidRule {
        action: Action,
        rule: String,
        #[source]
        source: RuleError,
    },

    /// A choice named a category that the current scan did not produce.
    #[error("no category named {0:?} in the current scan")]
    UnknownCategory(String),

    /// The settings path could not be resolved.
    #[error(transparent)]
    Path(#[from] SettingsError),

    /// Failed to create the settings directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the temporary file next to the target.
    #[error("failed to write settings to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the settings document.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to rename the temporary file over the target.
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    /// An actionable suggestion for the user, when one applies.
    pub fn help(&self) -> Option<String> {
        match self {
            WriteError::InvalidRule { .. } => Some(
                "rules look like Tool(pattern), e.g. Bash(git status:*) or Read(src/*)".into(),
            ),
            WriteError::UnknownCategory(_) => {
                Some("run `plugin-perms plan` to list the categories plugins request".into())
            }
            WriteError::Path(e) => e.help(),
            _ => None,
        }
    }
}

impl SettingsError {
    /// An actionable suggestion for the user, when one applies.
    pub fn help(&self) -> Option<String> {
        match self {
            SettingsError::NoHomeDirectory => Some("pass --home or set $HOME".into()),
            SettingsError::NoProjectDirectory(_) => Some("pass --project".into()),
            _ => None,
        }
    }
}

/// Errors from path resolution and from parsing names given by callers.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to determine home directory.
    #[error("could not determine home directory")]
    NoHomeDirectory,

    /// Failed to determine project directory.
    #[error("could not determine project directory: {0}")]
    NoProjectDirectory(String),

    /// Scope name is not one of user, project or local.
    #[error("unknown settings scope {0:?} (expected user, project or local)")]
    UnknownScope(String),

    /// Action name is not one of allow, ask or deny.
    #[error("unknown action {0:?} (expected allow, ask or deny)")]
    UnknownAction(String),

    /// Strategy name is not merge or replace.
    #[error("unknown write strategy {0:?} (expected merge or replace)")]
    UnknownStrategy(String),
}

/// Result type alias for path and name resolution.
pub type Result<T> = std::result::Result<T, SettingsError>;
