use crate::error::{FactoryError, Result};
use crate::remote;
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const INSTALLED_DIR: &str = "MY_REPOS";
pub const NEW_PROJECTS_DIR: &str = "NEW_PROJECTS";

pub const CATALOG_FILE: &str = "repositories.yaml";
pub const SETTINGS_FILE: &str = "settings.yaml";
pub const VERSION_FILE: &str = "VERSION.md";
pub const SCREENSHOTS_DIR: &str = "TOOLS/SCREENSHOTS";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// On-disk layout of a projects-factory root: cloned repositories under
/// `MY_REPOS/`, unpublished folders under `NEW_PROJECTS/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub installed: PathBuf,
    pub new_projects: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            installed: root.join(INSTALLED_DIR),
            new_projects: root.join(NEW_PROJECTS_DIR),
            root,
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn installed_repo(&self, name: &str) -> PathBuf {
        self.installed.join(name)
    }

    pub fn new_project(&self, name: &str) -> PathBuf {
        self.new_projects.join(name)
    }

    /// The tool's own working copy, when the root is itself a git repository.
    pub fn self_repo(&self) -> Option<&Path> {
        self.root.join(".git").is_dir().then_some(self.root.as_path())
    }

    /// Folder name of the root directory.
    pub fn root_name(&self) -> Option<&str> {
        self.root.file_name().and_then(|n| n.to_str())
    }

    /// Where the local clone of a catalog repository is expected to live.
    ///
    /// The root itself houses the entry that carries the root's own name.
    pub fn expected_clone_path(&self, name: &str) -> PathBuf {
        if self.self_repo().is_some() && self.root_name() == Some(name) {
            return self.root.clone();
        }
        self.installed_repo(name)
    }

    /// Resolve a raw path or repository URL sent by the UI to a project folder.
    ///
    /// Returns `None` unless the folder exists inside one of the allowed roots
    /// (MY_REPOS, NEW_PROJECTS or the root itself).
    pub fn resolve_project_path(&self, raw: &str) -> Option<PathBuf> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let direct = expand_tilde(raw);
        let resolved = if direct.is_dir() {
            resolve(&direct)
        } else {
            let guessed = remote::repo_name_from_url(raw)
                .or_else(|| {
                    Path::new(raw)
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.trim().to_string())
                })
                .filter(|n| !n.is_empty())?;

            if self.self_repo().is_some()
                && self
                    .root_name()
                    .is_some_and(|root| root.eq_ignore_ascii_case(&guessed))
                && !self.installed_repo(&guessed).is_dir()
            {
                resolve(&self.root)
            } else if self.installed_repo(&guessed).is_dir() {
                resolve(&self.installed_repo(&guessed))
            } else if self.new_project(&guessed).is_dir() {
                resolve(&self.new_project(&guessed))
            } else {
                return None;
            }
        };

        let allowed = [
            resolve(&self.new_projects),
            resolve(&self.installed),
            resolve(&self.root),
        ];
        allowed
            .iter()
            .any(|root| resolved.starts_with(root))
            .then_some(resolved)
    }
}

/// Canonical form of a path used as a cache key; falls back to the path as
/// given when it cannot be canonicalized.
pub fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn expand_tilde(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = home::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

// ---------------------------------------------------------------------------
// Folder name validation
// ---------------------------------------------------------------------------

/// Reject anything that could escape the managed directories. A folder name
/// is a single normal path component.
pub fn validate_folder_name(name: &str) -> Result<()> {
    let invalid = || FactoryError::InvalidName(name.to_string());
    if name.is_empty() || name.trim() != name || name.contains(':') {
        return Err(invalid());
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
