//! Commit-and-push workflow for a single working copy.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FactoryError, Result};
use crate::git;
use crate::scanner::has_git_dir;
use crate::version;

/// Where the commit message comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionMode {
    /// Reuse the last line of `VERSION.md`.
    #[default]
    UseExisting,
    /// Append a freshly generated version line and use it.
    GenerateVersion,
}

impl FromStr for VersionMode {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "use_existing" => Ok(VersionMode::UseExisting),
            "generate_version" => Ok(VersionMode::GenerateVersion),
            other => Err(FactoryError::InvalidRequest(format!(
                "invalid version_mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub path: String,
    pub branch: String,
    pub message: String,
    /// True when the first push was rejected and a rebase was needed.
    pub rebased: bool,
}

/// Stage everything, commit with a version-line message and push the current
/// branch to `origin`, rebasing once on a non-fast-forward rejection.
///
/// `fallback_message` is used only when generating a version yields nothing.
pub fn push_repository(
    repo: &Path,
    mode: VersionMode,
    fallback_message: &str,
    timeout: Duration,
) -> Result<PushOutcome> {
    if !has_git_dir(repo) {
        return Err(FactoryError::NotARepository(repo.display().to_string()));
    }
    git::require("git")?;

    let message = match mode {
        VersionMode::GenerateVersion => {
            let line = version::generate_version_line(repo, None, false, timeout)?;
            if line.trim().is_empty() {
                fallback_message.to_string()
            } else {
                line
            }
        }
        VersionMode::UseExisting => {
            version::last_version_line(repo)?.ok_or(FactoryError::NoVersionLine)?
        }
    };

    git::run_git(repo, &["add", "."], timeout)?;
    match git::run_git(repo, &["commit", "-m", &message], timeout) {
        Ok(_) => {}
        Err(FactoryError::CommandFailed { detail, .. }) if nothing_to_commit(&detail) => {
            info!(path = %repo.display(), "nothing to commit, pushing existing commits");
        }
        Err(e) => return Err(e),
    }

    let branch = git::current_branch(repo, timeout);
    let rebased = match git::run_git(repo, &["push", "origin", &branch], timeout) {
        Ok(_) => false,
        Err(FactoryError::CommandFailed { detail, .. }) if git::is_non_fast_forward(&detail) => {
            warn!(path = %repo.display(), %branch, "push rejected, rebasing onto origin");
            git::run_git(repo, &["pull", "--rebase", "origin", &branch], timeout)?;
            git::run_git(repo, &["push", "origin", &branch], timeout)?;
            true
        }
        Err(e) => return Err(e),
    };

    info!(path = %repo.display(), %branch, %message, "pushed repository");
    Ok(PushOutcome {
        path: repo.display().to_string(),
        branch,
        message,
        rebased,
    })
}

fn nothing_to_commit(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("nothing to commit") || lower.contains("no changes added to commit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::tests::{init_repo, set_origin};
    use std::process::Command;
    use tempfile::TempDir;

    const T: Duration = Duration::from_secs(30);

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    /// A working copy whose origin is a local bare repository.
    fn repo_with_bare_origin(tmp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let bare = tmp.path().join("origin.git");
        std::fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "-q", "--bare"]);

        let work = tmp.path().join("work");
        init_repo(&work);
        set_origin(&work, bare.to_str().unwrap());
        (work, bare)
    }

    #[test]
    fn version_mode_parsing() {
        assert_eq!("".parse::<VersionMode>().unwrap(), VersionMode::UseExisting);
        assert_eq!(
            "Generate_Version".parse::<VersionMode>().unwrap(),
            VersionMode::GenerateVersion
        );
        assert!("yolo".parse::<VersionMode>().is_err());
    }

    #[test]
    fn not_a_repository() {
        let tmp = TempDir::new().unwrap();
        let err = push_repository(tmp.path(), VersionMode::UseExisting, "update", T).unwrap_err();
        assert!(matches!(err, FactoryError::NotARepository(_)));
    }

    #[test]
    fn use_existing_requires_version_line() {
        let tmp = TempDir::new().unwrap();
        let (work, _) = repo_with_bare_origin(&tmp);
        let err = push_repository(&work, VersionMode::UseExisting, "update", T).unwrap_err();
        assert!(matches!(err, FactoryError::NoVersionLine));
    }

    #[test]
    fn pushes_with_last_version_line() {
        let tmp = TempDir::new().unwrap();
        let (work, bare) = repo_with_bare_origin(&tmp);
        std::fs::write(work.join("VERSION.md"), "v0.0.1 - first push\n").unwrap();

        let outcome = push_repository(&work, VersionMode::UseExisting, "update", T).unwrap();
        assert_eq!(outcome.message, "v0.0.1 - first push");
        assert!(!outcome.rebased);

        let log = git(&bare, &["log", "--format=%s", &outcome.branch]);
        assert_eq!(log.trim(), "v0.0.1 - first push");
    }

    #[test]
    fn generate_version_appends_and_commits() {
        let tmp = TempDir::new().unwrap();
        let (work, bare) = repo_with_bare_origin(&tmp);
        std::fs::write(work.join("VERSION.md"), "v0.3.0 - base\n").unwrap();
        std::fs::write(work.join("notes.txt"), "hi").unwrap();

        let outcome = push_repository(&work, VersionMode::GenerateVersion, "update", T).unwrap();
        assert!(outcome.message.starts_with("v0.3.1 - "));
        let log = git(&bare, &["log", "--format=%s", &outcome.branch]);
        assert_eq!(log.trim(), outcome.message);
    }

    #[test]
    fn rejected_push_is_rebased() {
        let tmp = TempDir::new().unwrap();
        let (work, bare) = repo_with_bare_origin(&tmp);
        std::fs::write(work.join("VERSION.md"), "v0.0.1 - one\n").unwrap();
        let first = push_repository(&work, VersionMode::UseExisting, "update", T).unwrap();

        // Another clone pushes a commit the working copy does not have.
        let other = tmp.path().join("other");
        git(tmp.path(), &["clone", "-q", bare.to_str().unwrap(), other.to_str().unwrap()]);
        git(&other, &["config", "user.email", "dev@example.com"]);
        git(&other, &["config", "user.name", "Dev"]);
        git(&other, &["config", "commit.gpgsign", "false"]);
        std::fs::write(other.join("remote.txt"), "from elsewhere").unwrap();
        git(&other, &["add", "."]);
        git(&other, &["commit", "-q", "-m", "remote change"]);
        git(&other, &["push", "-q", "origin", &first.branch]);

        std::fs::write(work.join("local.txt"), "local").unwrap();
        std::fs::write(work.join("VERSION.md"), "v0.0.1 - one\nv0.0.2 - two\n").unwrap();
        let second = push_repository(&work, VersionMode::UseExisting, "update", T).unwrap();
        assert!(second.rebased);

        let log = git(&bare, &["log", "--format=%s", &second.branch]);
        let subjects: Vec<_> = log.lines().collect();
        assert_eq!(subjects, vec!["v0.0.2 - two", "remote change", "v0.0.1 - one"]);
    }
}
