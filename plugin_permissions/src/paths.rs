//! Path resolution for settings files and the plugin cache.
//!
//! Every root can be overridden, so tests and callers inject temporary
//! directories instead of relying on `$HOME` or the working directory.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, SettingsError};
use crate::types::Scope;

/// The name of the settings directory.
const CLAUDE_DIR: &str = ".claude";

/// The name of the shared settings file.
const SETTINGS_FILE: &str = "settings.json";

/// The name of the local, uncommitted settings file.
const SETTINGS_LOCAL_FILE: &str = "settings.local.json";

/// Plugin cache location relative to the settings directory in `$HOME`.
const PLUGIN_CACHE: &[&str] = &["plugins", "cache"];

/// Resolver for settings and plugin cache paths.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    /// Override for the home directory.
    home_override: Option<PathBuf>,

    /// Override for the project directory.
    project_override: Option<PathBuf>,

    /// Override for the plugin cache root.
    cache_override: Option<PathBuf>,
}

impl PathResolver {
    /// Creates a PathResolver with default paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom home directory.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_override = Some(home.into());
        self
    }

    /// Uses a custom project directory.
    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project_override = Some(project.into());
        self
    }

    /// Uses a custom plugin cache root.
    pub fn with_cache_root(mut self, cache: impl Into<PathBuf>) -> Self {
        self.cache_override = Some(cache.into());
        self
    }

    /// Returns the home directory path.
    pub fn home_dir(&self) -> Result<PathBuf> {
        if let Some(ref home) = self.home_override {
            return Ok(home.clone());
        }

        env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .ok_or(SettingsError::NoHomeDirectory)
    }

    /// Returns the project directory path.
    ///
    /// If not explicitly set, uses the nearest ancestor of the current
    /// directory containing `.claude`, then `.git`, then the current
    /// directory itself.
    pub fn project_dir(&self) -> Result<PathBuf> {
        if let Some(ref project) = self.project_override {
            return Ok(project.clone());
        }

        let cwd =
            env::current_dir().map_err(|e| SettingsError::NoProjectDirectory(e.to_string()))?;

        if let Some(path) = find_ancestor_with(&cwd, CLAUDE_DIR) {
            return Ok(path);
        }

        if let Some(path) = find_ancestor_with(&cwd, ".git") {
            return Ok(path);
        }

        Ok(cwd)
    }

    /// Returns the settings file for a scope.
    pub fn resolve_path(&self, scope: Scope) -> Result<PathBuf> {
        match scope {
            Scope::User => Ok(self.home_dir()?.join(CLAUDE_DIR).join(SETTINGS_FILE)),
            Scope::Project => Ok(self.project_dir()?.join(CLAUDE_DIR).join(SETTINGS_FILE)),
            Scope::Local => Ok(self
                .project_dir()?
                .join(CLAUDE_DIR)
                .join(SETTINGS_LOCAL_FILE)),
        }
    }

    /// Returns the root directory scanned for plugin manifests.
    pub fn plugin_cache_root(&self) -> Result<PathBuf> {
        if let Some(ref cache) = self.cache_override {
            return Ok(cache.clone());
        }

        let mut root = self.home_dir()?.join(CLAUDE_DIR);
        root.extend(PLUGIN_CACHE);
        Ok(root)
    }
}

/// Finds the nearest ancestor directory containing the given name.
fn find_ancestor_with(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(name).exists())
        .map(Path::to_path_buf)
}
