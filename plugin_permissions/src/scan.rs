//! Plugin manifest discovery.
//!
//! Plugins live two levels below the cache root, one directory per
//! marketplace and one per plugin:
//!
//! ```text
//! <cache>/<marketplace>/<plugin>/.claude-plugin/plugin.json
//! ```
//!
//! Scanning is best-effort. A plugin whose manifest is missing, oversized,
//! malformed, symlinked or resolves outside the cache is skipped and logged;
//! the rest of the scan carries on.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{Level, debug, instrument, warn};

use crate::error::SkipReason;
use crate::io::read_bounded;
use crate::types::Declaration;

/// Directory that marks a plugin and holds its manifest.
pub const MARKER_DIR: &str = ".claude-plugin";

/// Manifest file name inside [`MARKER_DIR`].
pub const MANIFEST_FILE: &str = "plugin.json";

/// Largest manifest that will be read, in bytes.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

const PERMISSIONS_KEY: &str = "permissions";

/// Result of scanning the plugin cache.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// One declaration per plugin that declares permissions.
    pub declarations: Vec<Declaration>,

    /// Candidates that were skipped, with the reason.
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

/// Scanner over a single trusted plugin cache directory.
#[derive(Debug, Clone)]
pub struct DeclarationScanner {
    root: PathBuf,
}

impl DeclarationScanner {
    /// Creates a scanner rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root this scanner walks.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns every plugin that declares at least one permission category.
    ///
    /// Never fails: an unreadable root yields an empty list.
    pub fn scan(&self) -> Vec<Declaration> {
        self.scan_report().declarations
    }

    /// Scans the cache and reports both declarations and skipped candidates.
    #[instrument(level = Level::TRACE, skip(self), fields(root = %self.root.display()))]
    pub fn scan_report(&self) -> ScanReport {
        let mut report = ScanReport::default();

        let root = match fs::canonicalize(&self.root) {
            Ok(root) => root,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "plugin cache unavailable");
                return report;
            }
        };

        for plugin_dir in candidate_dirs(&root, &mut report) {
            match scan_candidate(&root, &plugin_dir) {
                Ok(declaration) => {
                    debug!(plugin = %declaration.name, path = %plugin_dir.display(), "found permission declaration");
                    report.declarations.push(declaration);
                }
                Err(reason) => {
                    log_skip(&reason);
                    report.skipped.push((plugin_dir, reason));
                }
            }
        }

        report
    }
}

/// Lists `<root>/<marketplace>/<plugin>` directories that contain the marker.
fn candidate_dirs(root: &Path, report: &mut ScanReport) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    for marketplace in child_dirs(root, report) {
        for plugin_dir in child_dirs(&marketplace, report) {
            if fs::symlink_metadata(plugin_dir.join(MARKER_DIR)).is_ok() {
                candidates.push(plugin_dir);
            }
        }
    }

    candidates
}

/// Lists subdirectories of `dir` in name order, skipping symbolic links.
fn child_dirs(dir: &Path, report: &mut ScanReport) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read plugin cache directory");
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_symlink() => {
                let reason = SkipReason::Symlink(path.clone());
                log_skip(&reason);
                report.skipped.push((path, reason));
            }
            Ok(file_type) if file_type.is_dir() => dirs.push(path),
            _ => {}
        }
    }

    dirs.sort();
    dirs
}

/// Reads one plugin's manifest into a declaration.
fn scan_candidate(root: &Path, plugin_dir: &Path) -> Result<Declaration, SkipReason> {
    let marker = plugin_dir.join(MARKER_DIR);
    let manifest_path = marker.join(MANIFEST_FILE);

    for path in [plugin_dir, marker.as_path(), manifest_path.as_path()] {
        ensure_contained(root, path)?;
    }

    let manifest = read_manifest(&manifest_path)?;

    let permissions = match manifest.get(PERMISSIONS_KEY) {
        Some(Value::Object(permissions)) if !permissions.is_empty() => permissions.clone(),
        _ => return Err(SkipReason::NoPermissions(manifest_path)),
    };

    let name = manifest
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            plugin_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

    Ok(Declaration::new(name, permissions))
}

/// Rejects symbolic links and anything that resolves outside `root`.
fn ensure_contained(root: &Path, path: &Path) -> Result<(), SkipReason> {
    let unreadable = |source| SkipReason::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::symlink_metadata(path).map_err(unreadable)?;
    if metadata.file_type().is_symlink() {
        return Err(SkipReason::Symlink(path.to_path_buf()));
    }

    let resolved = fs::canonicalize(path).map_err(unreadable)?;
    if !resolved.starts_with(root) {
        return Err(SkipReason::OutsideRoot(path.to_path_buf()));
    }

    Ok(())
}

fn read_manifest(path: &Path) -> Result<serde_json::Map<String, Value>, SkipReason> {
    let unreadable = |source| SkipReason::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    // Opening a FIFO or device blocks, so only regular files are opened.
    if !fs::symlink_metadata(path).map_err(unreadable)?.is_file() {
        return Err(SkipReason::NotAFile(path.to_path_buf()));
    }

    let file = File::open(path).map_err(unreadable)?;
    let size = file.metadata().map_err(unreadable)?.len();
    let too_large = |size| SkipReason::TooLarge {
        path: path.to_path_buf(),
        size,
        limit: MAX_MANIFEST_BYTES,
    };
    if size > MAX_MANIFEST_BYTES {
        return Err(too_large(size));
    }

    let content = read_bounded(file, MAX_MANIFEST_BYTES)
        .map_err(unreadable)?
        .ok_or_else(|| too_large(MAX_MANIFEST_BYTES + 1))?;

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(manifest)) => Ok(manifest),
        Ok(_) => Err(SkipReason::NotAnObject(path.to_path_buf())),
        Err(source) => Err(SkipReason::Malformed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn log_skip(reason: &SkipReason) {
    match reason {
        SkipReason::NoPermissions(_) => debug!(%reason, "skipping plugin"),
        SkipReason::Unreadable { source, .. } if source.kind() == ErrorKind::NotFound => {
            debug!(%reason, "skipping plugin")
        }
        _ => warn!(%reason, "skipping plugin"),
    }
}
