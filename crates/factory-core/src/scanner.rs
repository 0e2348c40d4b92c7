//! Repository Scanner: enumerate candidate working copies and probe each.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use tracing::info;

use crate::paths::{self, Layout};
use crate::probe::{Probe, ProbeReport};

/// Upper bound on concurrent probes in one scan.
pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone)]
pub struct Scanner {
    roots: Vec<PathBuf>,
    self_repo: Option<PathBuf>,
    workers: usize,
}

impl Scanner {
    pub fn new(roots: Vec<PathBuf>, self_repo: Option<PathBuf>) -> Self {
        Self {
            roots,
            self_repo,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Scan `MY_REPOS`, `NEW_PROJECTS` and the root itself.
    pub fn from_layout(layout: &Layout) -> Self {
        Self::new(
            vec![layout.installed.clone(), layout.new_projects.clone()],
            Some(layout.root.clone()),
        )
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Every direct subdirectory of a root that contains `.git`, plus the
    /// self repository when it has one. Anything else is skipped silently.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for root in &self.roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir() && has_git_dir(p))
                .collect();
            dirs.sort();
            out.extend(dirs);
        }
        if let Some(own) = self.self_repo.as_ref().filter(|p| has_git_dir(p)) {
            out.push(own.clone());
        }
        out
    }

    /// Probe every candidate with a bounded pool of worker threads. Results
    /// are keyed by resolved path. One candidate's probe never affects another.
    pub fn scan(&self, probe: &dyn Probe) -> Vec<(PathBuf, ProbeReport)> {
        let candidates = self.candidates();
        let workers = self.workers.min(candidates.len()).max(1);
        let next = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(candidates.len()));

        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(dir) = candidates.get(i) else {
                        break;
                    };
                    let report = probe.probe(dir);
                    results
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push((paths::resolve(dir), report));
                });
            }
        });

        let mut results = results.into_inner().unwrap_or_else(|e| e.into_inner());
        results.sort_by(|a, b| a.0.cmp(&b.0));
        info!(candidates = results.len(), "scanned local repositories");
        results
    }
}

pub fn has_git_dir(dir: &Path) -> bool {
    dir.join(".git").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::RepoState;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingProbe {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl Probe for RecordingProbe {
        fn probe(&self, dir: &Path) -> ProbeReport {
            self.seen.lock().unwrap().push(dir.to_path_buf());
            if dir.ends_with("broken") {
                // A misbehaving repository still yields a (downgraded) report.
                return ProbeReport {
                    state: RepoState::default(),
                    remote_url: None,
                };
            }
            ProbeReport {
                state: RepoState::new(true, true, true),
                remote_url: Some("https://github.com/acme/x.git".into()),
            }
        }
    }

    fn layout_with(dirs: &[(&str, bool)]) -> (TempDir, Layout) {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        for (rel, git) in dirs {
            let p = layout.root.join(rel);
            std::fs::create_dir_all(&p).unwrap();
            if *git {
                std::fs::create_dir_all(p.join(".git")).unwrap();
            }
        }
        (tmp, layout)
    }

    #[test]
    fn directories_without_git_are_not_candidates() {
        let (_tmp, layout) = layout_with(&[
            ("MY_REPOS/foo", true),
            ("MY_REPOS/plain", false),
            ("NEW_PROJECTS/bar", false),
            ("NEW_PROJECTS/baz", true),
        ]);
        std::fs::write(layout.installed.join("file.txt"), "x").unwrap();

        let names: Vec<String> = Scanner::from_layout(&layout)
            .candidates()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["foo", "baz"]);
    }

    #[test]
    fn self_repo_included_only_with_git() {
        let (_tmp, layout) = layout_with(&[]);
        assert!(Scanner::from_layout(&layout).candidates().is_empty());

        std::fs::create_dir_all(layout.root.join(".git")).unwrap();
        assert_eq!(Scanner::from_layout(&layout).candidates(), vec![layout.root.clone()]);
    }

    #[test]
    fn missing_roots_are_skipped() {
        let scanner = Scanner::new(vec![PathBuf::from("/nonexistent/for/sure")], None);
        assert!(scanner.candidates().is_empty());
    }

    #[test]
    fn scan_probes_every_candidate() {
        let (_tmp, layout) = layout_with(&[
            ("MY_REPOS/a", true),
            ("MY_REPOS/broken", true),
            ("MY_REPOS/c", true),
            ("NEW_PROJECTS/bar", false),
        ]);
        let probe = RecordingProbe {
            seen: Mutex::new(Vec::new()),
        };
        let results = Scanner::from_layout(&layout).with_workers(2).scan(&probe);

        assert_eq!(results.len(), 3);
        assert_eq!(probe.seen.lock().unwrap().len(), 3);
        assert!(!probe
            .seen
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.ends_with("bar")));
        for (_, report) in &results {
            assert_eq!(
                report.state.can_push,
                report.state.has_uncommitted && report.state.has_origin
            );
        }
    }
}
