//! Git Probe: best-effort inspection of a single working copy.
//!
//! A probe runs two independent git calls (`git status --porcelain` and
//! `git remote get-url origin`). Each yields a [`ProbeOutcome`]; a timeout or
//! a failure downgrades the corresponding field to false/absent and is never
//! surfaced to callers as an error.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::FactoryError;
use crate::git;
use crate::remote;

// ---------------------------------------------------------------------------
// RepoState
// ---------------------------------------------------------------------------

/// Derived state of one working copy, recomputed on every scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepoState {
    pub has_uncommitted: bool,
    pub has_origin: bool,
    pub is_github_remote: bool,
    pub can_push: bool,
}

impl RepoState {
    /// `can_push` is always `has_uncommitted && has_origin`.
    pub fn new(has_uncommitted: bool, has_origin: bool, is_github_remote: bool) -> Self {
        Self {
            has_uncommitted,
            has_origin,
            is_github_remote,
            can_push: has_uncommitted && has_origin,
        }
    }
}

// ---------------------------------------------------------------------------
// ProbeOutcome
// ---------------------------------------------------------------------------

/// Result of a single git call made by a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome<T> {
    Ok(T),
    TimedOut,
    Failed(String),
}

impl<T> ProbeOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ProbeOutcome::Ok(v) => Some(v),
            ProbeOutcome::TimedOut | ProbeOutcome::Failed(_) => None,
        }
    }
}

impl<T> From<crate::error::Result<T>> for ProbeOutcome<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(v) => ProbeOutcome::Ok(v),
            Err(FactoryError::CommandTimedOut { .. }) => ProbeOutcome::TimedOut,
            Err(e) => ProbeOutcome::Failed(e.to_string()),
        }
    }
}

/// What a probe learned about one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub state: RepoState,
    /// Raw origin URL, when one is configured.
    pub remote_url: Option<String>,
}

impl ProbeReport {
    /// Fold the two call outcomes into a state. Anything but `Ok` counts as
    /// false/absent.
    pub fn from_outcomes(
        status: ProbeOutcome<String>,
        origin: ProbeOutcome<String>,
    ) -> Self {
        let has_uncommitted = status.ok().is_some_and(|out| !out.trim().is_empty());
        let remote_url = origin
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let is_github = remote_url.as_deref().is_some_and(remote::is_github_remote);
        Self {
            state: RepoState::new(has_uncommitted, remote_url.is_some(), is_github),
            remote_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Inspect one candidate directory. Implementations block and must not panic
/// on a malfunctioning repository.
pub trait Probe: Send + Sync {
    fn probe(&self, dir: &Path) -> ProbeReport;
}

/// The production probe: shells out to the git CLI.
#[derive(Debug, Clone)]
pub struct GitProbe {
    timeout: Duration,
}

impl GitProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn status(&self, dir: &Path) -> ProbeOutcome<String> {
        git::run_git(dir, &["status", "--porcelain"], self.timeout).into()
    }

    pub fn origin_url(&self, dir: &Path) -> ProbeOutcome<String> {
        git::run_git(dir, &["remote", "get-url", "origin"], self.timeout).into()
    }
}

impl Probe for GitProbe {
    fn probe(&self, dir: &Path) -> ProbeReport {
        let status = self.status(dir);
        let origin = self.origin_url(dir);
        for (call, outcome) in [("status", &status), ("origin", &origin)] {
            match outcome {
                ProbeOutcome::Ok(_) => {}
                ProbeOutcome::TimedOut => {
                    debug!(dir = %dir.display(), call, "git probe timed out");
                }
                ProbeOutcome::Failed(reason) => {
                    debug!(dir = %dir.display(), call, %reason, "git probe failed");
                }
            }
        }
        ProbeReport::from_outcomes(status, origin)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
