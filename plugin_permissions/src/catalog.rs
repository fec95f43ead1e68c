//! Known permission categories and label generation for unknown ones.

/// Display metadata for a category key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

const KNOWN_CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo {
        key: "file-edit",
        label: "File editing",
        description: "Create, modify and overwrite files in the project",
    },
    CategoryInfo {
        key: "file-read",
        label: "File reading",
        description: "Read and search files in the project",
    },
    CategoryInfo {
        key: "terminal",
        label: "Terminal commands",
        description: "Run shell commands",
    },
    CategoryInfo {
        key: "git",
        label: "Git operations",
        description: "Run git commands against the repository",
    },
    CategoryInfo {
        key: "docker",
        label: "Docker",
        description: "Build, run and manage containers",
    },
    CategoryInfo {
        key: "mcp",
        label: "MCP tools",
        description: "Call tools exposed by MCP servers",
    },
    CategoryInfo {
        key: "network",
        label: "Network access",
        description: "Fetch URLs and search the web",
    },
];

/// Returns the catalogue entry for a known category key.
pub fn lookup(key: &str) -> Option<&'static CategoryInfo> {
    KNOWN_CATEGORIES.iter().find(|info| info.key == key)
}

/// Returns every known category, in display order.
pub fn known() -> &'static [CategoryInfo] {
    KNOWN_CATEGORIES
}

/// Returns `(label, description)` for any category key.
///
/// Unknown keys get a label synthesized by [`fallback_label`].
pub fn describe(key: &str) -> (String, String) {
    match lookup(key) {
        Some(info) => (info.label.to_string(), info.description.to_string()),
        None => {
            let label = fallback_label(key);
            let description = format!("Permissions for {label}");
            (label, description)
        }
    }
}

/// Builds a label from a category key: hyphens become spaces and every word
/// is title-cased (`"cloud-deploy"` → `"Cloud Deploy"`).
///
/// A word starts after any non-alphabetic character, so `"k8s-tools"`
/// becomes `"K8S Tools"`.
pub fn fallback_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len());
    let mut at_word_start = true;
    for c in key.chars() {
        let c = if c == '-' { ' ' } else { c };
        if c.is_alphabetic() {
            if at_word_start {
                label.extend(c.to_uppercase());
            } else {
                label.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            label.push(c);
            at_word_start = true;
        }
    }
    label
}
