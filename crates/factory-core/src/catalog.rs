//! The YAML repository catalog and the merged Project Catalog view.
//!
//! `repositories.yaml` lists the GitHub repositories owned by the configured
//! account. [`ProjectCatalog`] merges that list with the local-only folders
//! under `NEW_PROJECTS/`, annotating each row with push eligibility taken
//! from a State Cache [`Snapshot`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::cache::Snapshot;
use crate::error::Result;
use crate::github::GithubClient;
use crate::io::atomic_write;
use crate::paths::Layout;
use crate::probe::RepoState;

// ---------------------------------------------------------------------------
// CatalogRepo / CatalogFile
// ---------------------------------------------------------------------------

/// One GitHub repository as stored in `repositories.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRepo {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_at: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub repositories: Vec<CatalogRepo>,
}

impl CatalogFile {
    /// Load the catalog. A missing or empty file is an empty catalog; list
    /// entries that are not well-formed repository mappings are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    /// Load for display. A file that cannot be read or parsed is logged and
    /// treated as an empty catalog. Mutations go through [`update_catalog`],
    /// which stays strict.
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "catalog unreadable, listing no GitHub repositories");
            Self::default()
        })
    }

    pub fn parse(data: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(data)?;
        let entries = match doc.get("repositories") {
            Some(serde_yaml::Value::Sequence(items)) => items.clone(),
            _ => Vec::new(),
        };
        let repositories = entries
            .into_iter()
            .filter(|v| v.is_mapping())
            .filter_map(|v| match serde_yaml::from_value::<CatalogRepo>(v) {
                Ok(repo) => Some(repo),
                Err(e) => {
                    warn!(error = %e, "skipping malformed catalog entry");
                    None
                }
            })
            .collect();
        Ok(Self { repositories })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(path, data.as_bytes())
    }

    pub fn find(&self, name: &str) -> Option<&CatalogRepo> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Rename an entry; a URL ending in the old name is rewritten too.
    /// Returns false when no entry matched.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let Some(repo) = self.repositories.iter_mut().find(|r| r.name == old) else {
            return false;
        };
        repo.name = new.to_string();
        let trimmed = repo.url.trim_end_matches('/');
        if let Some(prefix) = trimmed.strip_suffix(old) {
            repo.url = format!("{prefix}{new}");
        }
        true
    }

    pub fn set_description(&mut self, name: &str, description: &str) -> bool {
        match self.repositories.iter_mut().find(|r| r.name == name) {
            Some(repo) => {
                repo.description = description.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.repositories.len();
        self.repositories.retain(|r| r.name != name);
        self.repositories.len() != before
    }

    pub fn replace_all(&mut self, repos: Vec<CatalogRepo>) {
        self.repositories = repos;
    }
}

/// Load, mutate and atomically rewrite the catalog at `path`. A missing file
/// is left untouched.
pub fn update_catalog<F>(path: &Path, f: F) -> Result<bool>
where
    F: FnOnce(&mut CatalogFile) -> bool,
{
    if !path.exists() {
        return Ok(false);
    }
    let mut file = CatalogFile::load(path)?;
    let changed = f(&mut file);
    if changed {
        file.save(path)?;
    }
    Ok(changed)
}

// ---------------------------------------------------------------------------
// CatalogEntry / CatalogView
// ---------------------------------------------------------------------------

/// One row of the merged catalog. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
    pub private: bool,
    pub description: String,
    pub created_at: String,
    pub is_new_project: bool,
    pub can_push: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogView {
    pub repos: Vec<CatalogEntry>,
    /// Number of GitHub-sourced rows (local-only rows follow them).
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushState {
    pub name: String,
    pub url: String,
    pub can_push: bool,
}

// ---------------------------------------------------------------------------
// ProjectCatalog
// ---------------------------------------------------------------------------

pub struct ProjectCatalog<'a> {
    layout: &'a Layout,
    username: &'a str,
}

impl<'a> ProjectCatalog<'a> {
    pub fn new(layout: &'a Layout, username: &'a str) -> Self {
        Self { layout, username }
    }

    /// The account's own repository first, then case-insensitive by name.
    pub fn sort_repos(&self, repos: &mut [CatalogRepo]) {
        repos.sort_by_cached_key(|r| (r.name != self.username, r.name.to_lowercase()));
    }

    /// GitHub-sourced rows. Push eligibility comes from the expected clone
    /// path; when nothing was scanned there, from the normalized remote URL.
    pub fn github_entries(&self, file: &CatalogFile, snapshot: &Snapshot) -> Vec<CatalogEntry> {
        let mut repos = file.repositories.clone();
        self.sort_repos(&mut repos);
        repos
            .into_iter()
            .map(|repo| {
                let name = repo.name.trim();
                let state = (!name.is_empty())
                    .then(|| snapshot.state_for_path(&self.layout.expected_clone_path(name)))
                    .flatten()
                    .or_else(|| {
                        (!repo.url.trim().is_empty())
                            .then(|| snapshot.state_for_remote(&repo.url))
                            .flatten()
                    });
                CatalogEntry {
                    can_push: can_push(state),
                    name: repo.name,
                    url: repo.url,
                    private: repo.private,
                    description: repo.description,
                    created_at: repo.created_at,
                    is_new_project: false,
                }
            })
            .collect()
    }

    /// Local-only rows: every folder under `NEW_PROJECTS/` except those whose
    /// scanned origin already points at GitHub. Lookup is by path only, and
    /// folders without `.git` were never probed so they are not push-eligible.
    pub fn local_entries(&self, snapshot: &Snapshot) -> Vec<CatalogEntry> {
        let Ok(entries) = std::fs::read_dir(&self.layout.new_projects) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()));

        dirs.into_iter()
            .filter_map(|dir| {
                let state = snapshot.state_for_path(&dir);
                if state.is_some_and(|s| s.is_github_remote) {
                    return None;
                }
                let name = dir.file_name()?.to_string_lossy().into_owned();
                Some(CatalogEntry {
                    name,
                    url: dir.to_string_lossy().replace('\\', "/"),
                    private: false,
                    description: String::new(),
                    created_at: created_at(&dir),
                    is_new_project: true,
                    can_push: can_push(state),
                })
            })
            .collect()
    }

    pub fn build(&self, file: &CatalogFile, snapshot: &Snapshot) -> CatalogView {
        let mut repos = self.github_entries(file, snapshot);
        let count = repos.len();
        repos.extend(self.local_entries(snapshot));
        CatalogView { repos, count }
    }

    /// Load the catalog file from the layout and build the merged view.
    pub fn load(&self, snapshot: &Snapshot) -> CatalogView {
        let file = CatalogFile::load_or_empty(&self.layout.catalog_path());
        self.build(&file, snapshot)
    }

    pub fn push_states(&self, snapshot: &Snapshot) -> Vec<PushState> {
        self.load(snapshot)
            .repos
            .into_iter()
            .map(|e| PushState {
                name: e.name.trim().to_string(),
                url: e.url.trim().to_string(),
                can_push: e.can_push,
            })
            .collect()
    }

    /// Replace `repositories.yaml` with the repositories `client` lists for
    /// the account. Returns how many were written.
    pub fn refresh(&self, client: &GithubClient) -> Result<usize> {
        let mut repos: Vec<CatalogRepo> = client
            .list_owned_repos()?
            .into_iter()
            .map(CatalogRepo::from)
            .collect();
        self.sort_repos(&mut repos);
        let count = repos.len();

        let mut file = CatalogFile::default();
        file.replace_all(repos);
        file.save(&self.layout.catalog_path())?;
        info!(count, "catalog refreshed from GitHub");
        Ok(count)
    }
}

fn can_push(state: Option<&RepoState>) -> bool {
    state.is_some_and(|s| s.can_push)
}

fn created_at(dir: &Path) -> String {
    std::fs::metadata(dir)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
