//! Reading and writing per-scope settings files.
//!
//! Reads are best-effort: a missing, empty, oversized or malformed file reads
//! as an empty policy, because having no configuration is normal. Writes are
//! strict: every rule is validated first, and the file is replaced through a
//! sibling temporary file and an atomic rename, so readers only ever see the
//! old or the new content.
//!
//! There is no cross-process locking. Two concurrent writers to the same
//! scope race, and the last rename wins.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{Level, debug, instrument, warn};

use crate::error::{Result, WriteError};
use crate::merge::{self, SettingsDocument};
use crate::paths::PathResolver;
use crate::rule;
use crate::types::{RulesByAction, Scope, WriteStrategy};

/// Largest settings file that will be read, in bytes.
pub const MAX_SETTINGS_BYTES: u64 = 1024 * 1024;

/// Reads a settings document, treating every failure as an empty document.
///
/// Returns `None` only when the file does not exist.
#[instrument(level = Level::TRACE)]
pub fn read_document_from_path(path: &Path) -> Option<SettingsDocument> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => {
            // Opening a FIFO or device blocks, so only regular files are opened.
            warn!(path = %path.display(), "settings path is not a regular file, treating as empty");
            return Some(SettingsDocument::new());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "settings file unreadable, treating as empty");
            return Some(SettingsDocument::new());
        }
    }

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "settings file unreadable, treating as empty");
            return Some(SettingsDocument::new());
        }
    };

    let content = match read_bounded(file, MAX_SETTINGS_BYTES) {
        Ok(Some(content)) => content,
        Ok(None) => {
            warn!(path = %path.display(), limit = MAX_SETTINGS_BYTES, "settings file too large, treating as empty");
            return Some(SettingsDocument::new());
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "settings file unreadable, treating as empty");
            return Some(SettingsDocument::new());
        }
    };

    if content.trim().is_empty() {
        debug!(path = %path.display(), "settings file is empty");
        return Some(SettingsDocument::new());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(document)) => Some(document),
        Ok(_) => {
            warn!(path = %path.display(), "settings file is not a JSON object, treating as empty");
            Some(SettingsDocument::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "settings file is malformed, treating as empty");
            Some(SettingsDocument::new())
        }
    }
}

/// Reads at most `limit` bytes of UTF-8 text.
///
/// Returns `Ok(None)` if the reader holds more than `limit` bytes.
pub(crate) fn read_bounded(reader: impl Read, limit: u64) -> std::io::Result<Option<String>> {
    let mut content = String::new();
    reader.take(limit + 1).read_to_string(&mut content)?;
    if content.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(content))
}

/// Writes a document by writing a temporary file in the same directory and
/// renaming it over `path`.
///
/// Creates parent directories if they don't exist. On failure the temporary
/// file is removed and `path` is left as it was.
#[instrument(level = Level::TRACE, skip(document))]
pub fn write_document_atomic(
    path: &Path,
    document: &SettingsDocument,
) -> std::result::Result<(), WriteError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(parent).map_err(|e| WriteError::CreateDir {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let mut content = serde_json::to_string_pretty(document)?;
    content.push('\n');

    // Dropping the temp file on any early return deletes it.
    let mut temp = NamedTempFile::new_in(parent).map_err(|e| WriteError::Io {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let io_error = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Ok(existing) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(io_error)?;
    }
    temp.write_all(content.as_bytes()).map_err(io_error)?;
    temp.flush().map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;

    temp.persist(path).map_err(|e| WriteError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Settings reader/writer that uses a PathResolver for path resolution.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    resolver: PathResolver,
}

impl SettingsStore {
    /// Creates a SettingsStore with default path resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a SettingsStore with a custom PathResolver.
    pub fn with_resolver(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Returns a reference to the path resolver.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Returns the settings file for a scope.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn resolve_path(&self, scope: Scope) -> Result<PathBuf> {
        self.resolver.resolve_path(scope)
    }

    /// Reads the policy stored for a scope.
    ///
    /// Never fails; any problem reading the file yields an empty policy.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn read(&self, scope: Scope) -> RulesByAction {
        let path = match self.resolve_path(scope) {
            Ok(path) => path,
            Err(e) => {
                warn!(%scope, error = %e, "cannot resolve settings path, treating as empty");
                return RulesByAction::new();
            }
        };

        read_document_from_path(&path)
            .map(|document| merge::policy_of(&document))
            .unwrap_or_default()
    }

    /// Reads the policy stored for every scope.
    #[instrument(level = Level::TRACE, skip(self))]
    pub fn read_all(&self) -> BTreeMap<Scope, RulesByAction> {
        Scope::ALL
            .into_iter()
            .map(|scope| (scope, self.read(scope)))
            .collect()
    }

    /// Writes rules to a scope's settings file.
    ///
    /// Every rule is validated before the file is touched; a single invalid
    /// rule aborts the write. Existing content is loaded best-effort, then
    /// updated with `strategy`. Returns `Ok(false)` if the file already held
    /// exactly the resulting content and nothing was written.
    #[instrument(level = Level::TRACE, skip(self, rules))]
    pub fn write(
        &self,
        scope: Scope,
        rules: &RulesByAction,
        strategy: WriteStrategy,
    ) -> std::result::Result<bool, WriteError> {
        for (action, bucket) in rules {
            for candidate in bucket {
                rule::validate(candidate).map_err(|source| WriteError::InvalidRule {
                    action: *action,
                    rule: candidate.clone(),
                    source,
                })?;
            }
        }

        let path = self.resolve_path(scope)?;
        let existing = read_document_from_path(&path);
        let existed = existing.is_some();
        let existing = existing.unwrap_or_default();

        let mut document = existing.clone();
        merge::apply_rules(&mut document, rules, strategy);

        if existed && document == existing {
            debug!(%scope, path = %path.display(), "settings unchanged, skipping write");
            return Ok(false);
        }

        write_document_atomic(&path, &document)?;
        debug!(%scope, %strategy, path = %path.display(), "settings written");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::types::Action;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, SettingsStore) {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new()
            .with_home(temp.path().join("home"))
            .with_project(temp.path().join("project"));

        (temp, SettingsStore::with_resolver(resolver))
    }

    fn rules(value: Value) -> RulesByAction {
        serde_json::from_value(value).unwrap()
    }

    fn seed(store: &SettingsStore, scope: Scope, content: &str) -> PathBuf {
        let path = store.resolve_path(scope).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_read_missing_is_empty() {
        let (_temp, store) = setup_test_store();
        for (_, policy) in store.read_all() {
            assert!(policy.is_empty());
        }
        assert_eq!(store.read_all().len(), 3);
    }

    #[test]
    fn test_read_bad_files_are_empty() {
        let (_temp, store) = setup_test_store();

        seed(&store, Scope::User, "");
        seed(&store, Scope::Project, "{ not json");
        seed(&store, Scope::Local, "[\"Read(*)\"]");

        for (scope, policy) in store.read_all() {
            assert!(policy.is_empty(), "{scope} should read as empty");
        }
    }

    #[test]
    fn test_read_oversized_is_empty() {
        let (_temp, store) = setup_test_store();
        let padding = " ".repeat(MAX_SETTINGS_BYTES as usize);
        seed(&store, Scope::User, &format!("{{\"allow\": [\"Read(*)\"]}}{padding}"));

        assert!(store.read(Scope::User).is_empty());
    }

    #[test]
    fn test_merge_write_then_read() {
        let (_temp, store) = setup_test_store();
        seed(&store, Scope::Local, r#"{"allow": ["Bash(git:*)"]}"#);

        let written = store
            .write(Scope::Local, &rules(json!({"allow": ["Read(*)"]})), WriteStrategy::Merge)
            .unwrap();
        assert!(written);

        let policy = store.read(Scope::Local);
        assert_eq!(policy[&Action::Allow], vec!["Bash(git:*)", "Read(*)"]);
    }

    #[test]
    fn test_write_creates_missing_directories() {
        let (_temp, store) = setup_test_store();

        store
            .write(Scope::User, &rules(json!({"deny": ["Read(.env)"]})), WriteStrategy::Merge)
            .unwrap();

        assert_eq!(store.read(Scope::User), rules(json!({"deny": ["Read(.env)"]})));
    }

    #[test]
    fn test_invalid_rule_leaves_file_untouched() {
        let (_temp, store) = setup_test_store();
        let original = "{\n  \"allow\": [\"Read(*)\"],\n  \"theme\": \"dark\"\n}";
        let path = seed(&store, Scope::Project, original);

        let result = store.write(
            Scope::Project,
            &rules(json!({"allow": ["Edit(*)"], "deny": ["Bash(ls; rm -rf /)"]})),
            WriteStrategy::Merge,
        );

        match result {
            Err(WriteError::InvalidRule { action, rule, source }) => {
                assert_eq!(action, Action::Deny);
                assert_eq!(rule, "Bash(ls; rm -rf /)");
                assert!(matches!(source, RuleError::Malformed(_)));
            }
            other => panic!("expected InvalidRule, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_invalid_rule_does_not_create_file() {
        let (_temp, store) = setup_test_store();
        let path = store.resolve_path(Scope::User).unwrap();

        let result = store.write(
            Scope::User,
            &rules(json!({"allow": ["B\u{0430}sh(ls)"]})),
            WriteStrategy::Replace,
        );

        assert!(matches!(result, Err(WriteError::InvalidRule { .. })));
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[test]
    fn test_replace_preserves_other_keys() {
        let (_temp, store) = setup_test_store();
        let path = seed(
            &store,
            Scope::Local,
            r#"{"model": "opus", "allow": ["Read(*)"], "deny": ["Edit(*)"], "hooks": {"x": 1}}"#,
        );

        store
            .write(Scope::Local, &rules(json!({"allow": ["Bash(make:*)"]})), WriteStrategy::Replace)
            .unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"model": "opus", "allow": ["Bash(make:*)"], "deny": ["Edit(*)"], "hooks": {"x": 1}})
        );
        let keys: Vec<_> = written.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["model", "allow", "deny", "hooks"]);
    }

    #[test]
    fn test_write_over_malformed_file() {
        let (_temp, store) = setup_test_store();
        seed(&store, Scope::User, "{{{{");

        store
            .write(Scope::User, &rules(json!({"ask": ["Bash(rm:*)"]})), WriteStrategy::Merge)
            .unwrap();

        assert_eq!(store.read(Scope::User), rules(json!({"ask": ["Bash(rm:*)"]})));
    }

    #[test]
    fn test_unchanged_write_is_skipped() {
        let (_temp, store) = setup_test_store();
        let new_rules = rules(json!({"allow": ["Read(*)"]}));

        assert!(store.write(Scope::User, &new_rules, WriteStrategy::Merge).unwrap());
        assert!(!store.write(Scope::User, &new_rules, WriteStrategy::Merge).unwrap());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (_temp, store) = setup_test_store();

        store
            .write(Scope::Project, &rules(json!({"allow": ["Read(*)"]})), WriteStrategy::Merge)
            .unwrap();
        store
            .write(Scope::Local, &rules(json!({"deny": ["Edit(*)"]})), WriteStrategy::Merge)
            .unwrap();

        let dir = store.resolve_path(Scope::Project).unwrap();
        assert_eq!(
            dir_entries(dir.parent().unwrap()),
            vec!["settings.json", "settings.local.json"]
        );
    }

    #[test]
    fn test_failed_rename_cleans_up_temp_file() {
        let (_temp, store) = setup_test_store();
        // A directory where the settings file should be makes the rename fail.
        let path = store.resolve_path(Scope::User).unwrap();
        fs::create_dir_all(&path).unwrap();

        let result = store.write(Scope::User, &rules(json!({"allow": ["Read(*)"]})), WriteStrategy::Merge);

        assert!(matches!(result, Err(WriteError::Persist { .. })));
        assert!(path.is_dir());
        assert_eq!(dir_entries(path.parent().unwrap()), vec!["settings.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, store) = setup_test_store();
        let path = seed(&store, Scope::User, "{}");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        store
            .write(Scope::User, &rules(json!({"allow": ["Read(*)"]})), WriteStrategy::Merge)
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_special_file_is_empty() {
        let (_temp, store) = setup_test_store();
        let path = store.resolve_path(Scope::Project).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let status = std::process::Command::new("mkfifo")
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(store.read_all());
        });
        let policies = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("read blocked on a special file");

        assert!(policies.values().all(|policy| policy.is_empty()));
    }

    #[test]
    fn test_read_bounded() {
        assert_eq!(read_bounded("abc".as_bytes(), 3).unwrap().as_deref(), Some("abc"));
        assert_eq!(read_bounded("abcd".as_bytes(), 3).unwrap(), None);
    }
}
