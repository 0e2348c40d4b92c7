//! Folder operations: install (clone), delete, rename, scaffold and publish.
//!
//! None of these touch the State Cache; callers invalidate it after a
//! successful mutation.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::update_catalog;
use crate::error::{FactoryError, Result};
use crate::git;
use crate::io::{atomic_write, ensure_dir};
use crate::paths::{validate_folder_name, Layout};
use crate::remote;
use crate::scanner::has_git_dir;

// ---------------------------------------------------------------------------
// Install
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Installed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallResult {
    pub url: String,
    pub name: String,
    pub status: InstallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Clone every URL into `MY_REPOS/<name>`. An existing target is skipped and
/// a failed clone is recorded; neither stops the batch.
pub fn install_repos(layout: &Layout, urls: &[String], timeout: Duration) -> Result<Vec<InstallResult>> {
    if urls.is_empty() {
        return Err(FactoryError::NothingSelected);
    }
    git::require("git")?;
    ensure_dir(&layout.installed)?;

    let mut results = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim().to_string();
        let name = remote::repo_name_from_url(&url).unwrap_or_default();
        let result = match validate_folder_name(&name) {
            Err(e) => InstallResult {
                url,
                name,
                status: InstallStatus::Error,
                detail: Some(e.to_string()),
            },
            Ok(()) => clone_one(layout, url, name, timeout),
        };
        results.push(result);
    }
    Ok(results)
}

fn clone_one(layout: &Layout, url: String, name: String, timeout: Duration) -> InstallResult {
    let target = layout.installed_repo(&name);
    if target.exists() {
        return InstallResult {
            url,
            name,
            status: InstallStatus::Skipped,
            detail: Some("folder already exists".to_string()),
        };
    }
    let target_arg = target.to_string_lossy().into_owned();
    match git::run_git(&layout.installed, &["clone", &url, &target_arg], timeout) {
        Ok(_) => {
            info!(%url, %name, "cloned repository");
            InstallResult {
                url,
                name,
                status: InstallStatus::Installed,
                detail: None,
            }
        }
        Err(e) => {
            warn!(%url, error = %e, "clone failed");
            // A timed-out clone can leave a partial checkout behind.
            if target.exists() {
                let _ = std::fs::remove_dir_all(&target);
            }
            InstallResult {
                url,
                name,
                status: InstallStatus::Error,
                detail: Some(e.to_string()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted,
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub name: String,
    pub status: DeleteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Delete each named folder, looking in `MY_REPOS` first, then `NEW_PROJECTS`.
pub fn delete_folders(layout: &Layout, names: &[String]) -> Result<Vec<DeleteResult>> {
    if names.is_empty() {
        return Err(FactoryError::NothingSelected);
    }
    Ok(names.iter().map(|n| delete_one(layout, n.trim())).collect())
}

fn delete_one(layout: &Layout, name: &str) -> DeleteResult {
    let mut result = DeleteResult {
        name: name.to_string(),
        status: DeleteStatus::Error,
        path: None,
        detail: None,
    };
    if let Err(e) = validate_folder_name(name) {
        result.detail = Some(e.to_string());
        return result;
    }
    let found = [layout.installed_repo(name), layout.new_project(name)]
        .into_iter()
        .find(|p| p.is_dir());
    let Some(target) = found else {
        result.status = DeleteStatus::NotFound;
        return result;
    };
    result.path = Some(target.to_string_lossy().into_owned());
    match remove_tree(&target) {
        Ok(()) => {
            info!(path = %target.display(), "deleted folder");
            result.status = DeleteStatus::Deleted;
        }
        Err(e) => {
            warn!(path = %target.display(), error = %e, "delete failed");
            result.detail = Some(e.to_string());
        }
    }
    result
}

/// `remove_dir_all`, retrying once after clearing read-only flags (git marks
/// pack files read-only).
fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(first) => {
            clear_readonly(path);
            std::fs::remove_dir_all(path).map_err(|_| first)
        }
    }
}

fn clear_readonly(path: &Path) {
    let Ok(entries) = std::fs::read_dir(path) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_dir() {
            clear_readonly(&p);
        }
        if let Ok(meta) = std::fs::metadata(&p) {
            let mut perms = meta.permissions();
            if perms.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                perms.set_readonly(false);
                let _ = std::fs::set_permissions(&p, perms);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rename
// ---------------------------------------------------------------------------

/// Rename a local-only project inside `NEW_PROJECTS` and keep the catalog in
/// step with it.
pub fn rename_local_project(layout: &Layout, old: &str, new: &str) -> Result<()> {
    validate_folder_name(old)?;
    validate_folder_name(new)?;
    let from = layout.new_project(old);
    let to = layout.new_project(new);
    if !from.is_dir() {
        return Err(FactoryError::FolderNotFound(old.to_string()));
    }
    if to.exists() {
        return Err(FactoryError::FolderExists(new.to_string()));
    }
    std::fs::rename(&from, &to)?;
    update_catalog(&layout.catalog_path(), |f| f.rename(old, new))?;
    info!(%old, %new, "renamed local project");
    Ok(())
}

/// After a GitHub rename, move the local clone to the new name and point its
/// origin at the new URL. The clone is found by its old name, by its new
/// name (already moved), or by an origin URL naming the old repository.
/// Returns the clone's final path, if one exists.
pub fn rename_installed_after_github(
    layout: &Layout,
    owner: &str,
    old: &str,
    new: &str,
    timeout: Duration,
) -> Result<Option<PathBuf>> {
    validate_folder_name(old)?;
    validate_folder_name(new)?;

    let Some(found) = find_installed_clone(layout, old, new, timeout) else {
        return Ok(None);
    };
    let target = layout.installed_repo(new);
    let path = if found != target && !target.exists() {
        std::fs::rename(&found, &target)?;
        info!(from = %found.display(), to = %target.display(), "renamed local clone");
        target
    } else {
        found
    };

    let url = remote::github_clone_url(owner, new);
    if let Err(e) = git::run_git(&path, &["remote", "set-url", "origin", &url], timeout) {
        warn!(path = %path.display(), error = %e, "could not update origin URL");
    }
    Ok(Some(path))
}

fn find_installed_clone(layout: &Layout, old: &str, new: &str, timeout: Duration) -> Option<PathBuf> {
    for name in [old, new] {
        let p = layout.installed_repo(name);
        if p.is_dir() {
            return Some(p);
        }
    }
    let entries = std::fs::read_dir(&layout.installed).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && has_git_dir(p))
        .find(|p| {
            git::run_git(p, &["remote", "get-url", "origin"], timeout)
                .ok()
                .and_then(|url| remote::repo_name_from_url(&url))
                .is_some_and(|n| n.eq_ignore_ascii_case(old))
        })
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Scaffold a new folder under `NEW_PROJECTS`. Without a name the first free
/// `project-N` is used. Returns the folder name.
pub fn create_project(layout: &Layout, name: Option<&str>) -> Result<String> {
    ensure_dir(&layout.new_projects)?;
    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => {
            validate_folder_name(n)?;
            if layout.new_project(n).exists() {
                return Err(FactoryError::FolderExists(n.to_string()));
            }
            n.to_string()
        }
        None => (1..)
            .map(|i| format!("project-{i}"))
            .find(|n| !layout.new_project(n).exists())
            .unwrap_or_default(),
    };

    let dir = layout.new_project(&name);
    std::fs::create_dir(&dir)?;
    atomic_write(&dir.join("README.md"), format!("# {name}\n").as_bytes())?;
    info!(%name, "created project folder");
    Ok(name)
}

// ---------------------------------------------------------------------------
// Publish
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    fn flag(self) -> &'static str {
        match self {
            Visibility::Public => "--public",
            Visibility::Private => "--private",
        }
    }
}

impl FromStr for Visibility {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(FactoryError::InvalidRequest(format!(
                "invalid visibility '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub name: String,
    pub repo: String,
    pub visibility: Visibility,
    pub commit_message: String,
}

/// First commit message of a freshly published project.
pub fn initial_commit_message(name: &str) -> String {
    format!("v0.0.1 - {name} started {}", Local::now().format("%d.%m.%Y"))
}

/// Move `NEW_PROJECTS/<name>` into `MY_REPOS`, commit it and create the
/// GitHub repository with `gh`. Any failure moves the folder back.
pub fn publish_to_github(
    layout: &Layout,
    owner: &str,
    name: &str,
    description: &str,
    visibility: Visibility,
    timeout: Duration,
) -> Result<Published> {
    validate_folder_name(name)?;
    let source = layout.new_project(name);
    if !source.is_dir() {
        return Err(FactoryError::FolderNotFound(name.to_string()));
    }
    let target = layout.installed_repo(name);
    if target.exists() {
        return Err(FactoryError::FolderExists(format!("MY_REPOS/{name}")));
    }
    git::require("git")?;
    git::require("gh")?;

    ensure_dir(&layout.installed)?;
    std::fs::rename(&source, &target)?;

    let commit_message = initial_commit_message(name);
    let repo = if owner.is_empty() || owner == "Unknown" {
        name.to_string()
    } else {
        format!("{owner}/{name}")
    };

    let outcome = commit_and_create(&target, &repo, &commit_message, description, visibility, timeout);
    if let Err(e) = outcome {
        if target.exists() && !source.exists() {
            if let Err(rollback) = std::fs::rename(&target, &source) {
                error!(%name, error = %rollback, "rollback after failed publish did not complete");
            }
        }
        return Err(e);
    }

    info!(%repo, ?visibility, "published project to GitHub");
    Ok(Published {
        name: name.to_string(),
        repo,
        visibility,
        commit_message,
    })
}

fn commit_and_create(
    dir: &Path,
    repo: &str,
    message: &str,
    description: &str,
    visibility: Visibility,
    timeout: Duration,
) -> Result<()> {
    if !has_git_dir(dir) {
        git::run_git(dir, &["init"], timeout)?;
    }
    git::run_git(dir, &["add", "."], timeout)?;
    git::run_git(dir, &["commit", "--allow-empty", "-m", message], timeout)?;

    let description = match description.trim() {
        "" => "Local project folder",
        d => d,
    };
    git::run_program(
        "gh",
        dir,
        &[
            "repo",
            "create",
            repo,
            visibility.flag(),
            "--description",
            description,
            "--source",
            ".",
            "--remote",
            "origin",
            "--push",
        ],
        timeout,
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogFile, CatalogRepo};
    use crate::probe::tests::{init_repo, set_origin};
    use std::process::Command;
    use tempfile::TempDir;

    const T: Duration = Duration::from_secs(30);

    fn commit_all(dir: &Path) {
        for args in [vec!["add", "."], vec!["commit", "-q", "-m", "init"]] {
            let ok = Command::new("git")
                .args(&args)
                .current_dir(dir)
                .status()
                .unwrap()
                .success();
            assert!(ok);
        }
    }

    #[test]
    fn create_project_picks_first_free_number() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        std::fs::create_dir_all(layout.new_project("project-1")).unwrap();

        let name = create_project(&layout, None).unwrap();
        assert_eq!(name, "project-2");
        let readme = std::fs::read_to_string(layout.new_project("project-2").join("README.md")).unwrap();
        assert_eq!(readme, "# project-2\n");
    }

    #[test]
    fn create_project_with_name_rejects_duplicates_and_paths() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        assert_eq!(create_project(&layout, Some("demo")).unwrap(), "demo");
        assert!(matches!(
            create_project(&layout, Some("demo")),
            Err(FactoryError::FolderExists(_))
        ));
        assert!(matches!(
            create_project(&layout, Some("../escape")),
            Err(FactoryError::InvalidName(_))
        ));
    }

    #[test]
    fn delete_searches_installed_then_new_projects() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        std::fs::create_dir_all(layout.installed_repo("foo")).unwrap();
        std::fs::create_dir_all(layout.new_project("bar")).unwrap();

        let names = vec!["foo".into(), "bar".into(), "ghost".into(), "..".into()];
        let results = delete_folders(&layout, &names).unwrap();
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                DeleteStatus::Deleted,
                DeleteStatus::Deleted,
                DeleteStatus::NotFound,
                DeleteStatus::Error
            ]
        );
        assert!(!layout.installed_repo("foo").exists());
        assert!(!layout.new_project("bar").exists());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        assert!(matches!(delete_folders(&layout, &[]), Err(FactoryError::NothingSelected)));
        assert!(matches!(
            install_repos(&layout, &[], T),
            Err(FactoryError::NothingSelected)
        ));
    }

    #[test]
    fn install_clones_skips_and_reports() {
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream/widget");
        init_repo(&upstream);
        std::fs::write(upstream.join("a.txt"), "a").unwrap();
        commit_all(&upstream);

        let layout = Layout::new(tmp.path().join("root"));
        let url = upstream.to_string_lossy().into_owned();
        let missing = tmp.path().join("upstream/nothing").to_string_lossy().into_owned();

        let results = install_repos(&layout, &[url.clone(), missing], T).unwrap();
        assert_eq!(results[0].name, "widget");
        assert_eq!(results[0].status, InstallStatus::Installed);
        assert!(layout.installed_repo("widget").join("a.txt").exists());
        assert_eq!(results[1].status, InstallStatus::Error);
        assert!(results[1].detail.is_some());

        let again = install_repos(&layout, &[url], T).unwrap();
        assert_eq!(again[0].status, InstallStatus::Skipped);
    }

    #[test]
    fn rename_local_updates_catalog() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        std::fs::create_dir_all(layout.new_project("draft")).unwrap();
        let mut file = CatalogFile::default();
        file.replace_all(vec![CatalogRepo {
            name: "draft".into(),
            url: "https://github.com/acme/draft".into(),
            private: false,
            description: String::new(),
            created_at: String::new(),
        }]);
        file.save(&layout.catalog_path()).unwrap();

        rename_local_project(&layout, "draft", "final").unwrap();
        assert!(layout.new_project("final").is_dir());
        let file = CatalogFile::load(&layout.catalog_path()).unwrap();
        assert_eq!(file.repositories[0].url, "https://github.com/acme/final");

        assert!(matches!(
            rename_local_project(&layout, "draft", "x"),
            Err(FactoryError::FolderNotFound(_))
        ));
    }

    #[test]
    fn rename_after_github_finds_clone_by_origin() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        let clone = layout.installed_repo("local-copy");
        init_repo(&clone);
        set_origin(&clone, "https://github.com/acme/old-name.git");

        let path = rename_installed_after_github(&layout, "acme", "old-name", "new-name", T)
            .unwrap()
            .unwrap();
        assert_eq!(path, layout.installed_repo("new-name"));
        let origin = git::run_git(&path, &["remote", "get-url", "origin"], T).unwrap();
        assert_eq!(origin.trim(), "https://github.com/acme/new-name.git");
    }

    #[test]
    fn rename_after_github_without_clone_is_noop() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        assert!(rename_installed_after_github(&layout, "acme", "a", "b", T)
            .unwrap()
            .is_none());
    }

    #[test]
    fn visibility_parsing() {
        assert_eq!("".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!(" Private ".parse::<Visibility>().unwrap(), Visibility::Private);
        assert!("internal".parse::<Visibility>().is_err());
    }

    #[test]
    fn publish_rejects_missing_or_taken_folders() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        assert!(matches!(
            publish_to_github(&layout, "acme", "nope", "", Visibility::Public, T),
            Err(FactoryError::FolderNotFound(_))
        ));

        std::fs::create_dir_all(layout.new_project("dup")).unwrap();
        std::fs::create_dir_all(layout.installed_repo("dup")).unwrap();
        assert!(matches!(
            publish_to_github(&layout, "acme", "dup", "", Visibility::Public, T),
            Err(FactoryError::FolderExists(_))
        ));
    }

    #[test]
    fn initial_commit_message_format() {
        let msg = initial_commit_message("demo");
        assert!(msg.starts_with("v0.0.1 - demo started "));
        let date = msg.rsplit(' ').next().unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[2..3], ".");
    }
}
