//! State Cache: a process-wide, TTL-bounded snapshot of every scanned
//! repository's [`RepoState`], keyed by resolved path and by normalized
//! remote URL.
//!
//! The snapshot is immutable and swapped whole behind a mutex, so a reader
//! always sees both maps from the same scan. Refreshes are single-flight:
//! callers that find the cache stale queue on a refresh lock, and whoever
//! gets it second reuses the scan the first one just finished.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::info;

use crate::paths;
use crate::probe::{Probe, RepoState};
use crate::remote::normalize_remote_url;
use crate::scanner::Scanner;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Result of one scan pass. Both maps are built together and never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub by_path: HashMap<PathBuf, RepoState>,
    pub by_remote: HashMap<String, RepoState>,
    /// Raw origin URL of every scanned copy that has one.
    pub origins: HashMap<PathBuf, String>,
}

impl Snapshot {
    pub fn build(scanner: &Scanner, probe: &dyn Probe) -> Self {
        let mut snap = Snapshot::default();
        for (path, report) in scanner.scan(probe) {
            if let Some(url) = &report.remote_url {
                snap.by_remote.insert(normalize_remote_url(url), report.state);
                snap.origins.insert(path.clone(), url.clone());
            }
            snap.by_path.insert(path, report.state);
        }
        snap
    }

    pub fn state_for_path(&self, path: &Path) -> Option<&RepoState> {
        self.by_path.get(&paths::resolve(path))
    }

    pub fn state_for_remote(&self, url: &str) -> Option<&RepoState> {
        self.by_remote.get(&normalize_remote_url(url))
    }

    /// Origin URLs of the copies directly under `dir`, sorted, without a
    /// trailing `.git` or slash.
    pub fn origins_under(&self, dir: &Path) -> Vec<String> {
        let dir = paths::resolve(dir);
        let mut urls: Vec<String> = self
            .origins
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir.as_path()))
            .map(|(_, url)| {
                let url = url.trim().trim_end_matches('/');
                url.strip_suffix(".git").unwrap_or(url).to_string()
            })
            .collect();
        urls.sort();
        urls
    }
}

// ---------------------------------------------------------------------------
// StateCache
// ---------------------------------------------------------------------------

struct Inner {
    snapshot: Arc<Snapshot>,
    expires_at: Option<Instant>,
    /// Bumped every time a new snapshot is stored.
    generation: u64,
    /// Bumped by `invalidate()`.
    epoch: u64,
}

pub struct StateCache {
    scanner: Scanner,
    probe: Arc<dyn Probe>,
    ttl: Duration,
    inner: Mutex<Inner>,
    refresh: Mutex<()>,
    scans: AtomicU64,
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("ttl", &self.ttl)
            .field("scans", &self.scan_count())
            .finish_non_exhaustive()
    }
}

impl StateCache {
    pub fn new(scanner: Scanner, probe: Arc<dyn Probe>, ttl: Duration) -> Self {
        Self {
            scanner,
            probe,
            ttl,
            inner: Mutex::new(Inner {
                snapshot: Arc::new(Snapshot::default()),
                expires_at: None,
                generation: 0,
                epoch: 0,
            }),
            refresh: Mutex::new(()),
            scans: AtomicU64::new(0),
        }
    }

    /// Current states. Rescans when `force_refresh` is set or the TTL has
    /// elapsed; otherwise hands back the cached snapshot unchanged.
    ///
    /// Refreshes are single-flight. A forced caller that queued behind a scan
    /// already in flight takes that scan's result instead of starting its
    /// own, even though the scan may have probed some directories before the
    /// caller arrived.
    pub fn get_states(&self, force_refresh: bool) -> Arc<Snapshot> {
        let seen_generation = {
            let inner = self.lock_inner();
            if !force_refresh && is_fresh(&inner) {
                return Arc::clone(&inner.snapshot);
            }
            inner.generation
        };

        let _refreshing = self.refresh.lock().unwrap_or_else(|e| e.into_inner());

        // Someone else stored a snapshot while we queued. Reuse it if it is
        // still valid; a forced refresh accepts a scan that completed while
        // it waited.
        {
            let inner = self.lock_inner();
            if inner.generation != seen_generation && is_fresh(&inner) {
                return Arc::clone(&inner.snapshot);
            }
        }

        let epoch = self.lock_inner().epoch;
        let snapshot = Arc::new(Snapshot::build(&self.scanner, self.probe.as_ref()));
        self.scans.fetch_add(1, Ordering::Relaxed);
        info!(
            paths = snapshot.by_path.len(),
            remotes = snapshot.by_remote.len(),
            "repository state cache refreshed"
        );

        let mut inner = self.lock_inner();
        inner.snapshot = Arc::clone(&snapshot);
        inner.generation += 1;
        // An invalidation that landed mid-scan may describe changes this scan
        // missed, so leave the cache stale.
        inner.expires_at = (inner.epoch == epoch).then(|| Instant::now() + self.ttl);
        snapshot
    }

    /// Force the next `get_states` call to rescan. Call after any operation
    /// that changes repositories on disk.
    pub fn invalidate(&self) {
        let mut inner = self.lock_inner();
        inner.expires_at = None;
        inner.epoch += 1;
    }

    /// Number of scans performed since construction.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn is_fresh(inner: &Inner) -> bool {
    inner.expires_at.is_some_and(|at| Instant::now() < at)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::paths::Layout;
    use crate::probe::ProbeReport;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use tempfile::TempDir;

    /// Fake probe driven by marker files instead of git:
    /// `DIRTY` marks uncommitted changes and `ORIGIN` holds the remote URL.
    pub(crate) struct FakeProbe {
        pub calls: AtomicUsize,
        pub delay: Duration,
    }

    impl FakeProbe {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    impl Probe for FakeProbe {
        fn probe(&self, dir: &Path) -> ProbeReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            let dirty = dir.join("DIRTY").exists();
            let origin = std::fs::read_to_string(dir.join("ORIGIN"))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let github = origin
                .as_deref()
                .is_some_and(crate::remote::is_github_remote);
            ProbeReport {
                state: RepoState::new(dirty, origin.is_some(), github),
                remote_url: origin,
            }
        }
    }

    pub(crate) fn fake_repo(dir: &Path, dirty: bool, origin: Option<&str>) {
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        if dirty {
            std::fs::write(dir.join("DIRTY"), "").unwrap();
        }
        if let Some(url) = origin {
            std::fs::write(dir.join("ORIGIN"), url).unwrap();
        }
    }

    fn cache_for(layout: &Layout, probe: Arc<FakeProbe>, ttl: Duration) -> StateCache {
        StateCache::new(Scanner::from_layout(layout), probe, ttl)
    }

    #[test]
    fn snapshot_is_keyed_by_path_and_remote() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        let foo = layout.installed_repo("foo");
        fake_repo(&foo, true, Some("https://github.com/acme/foo.git"));

        let cache = cache_for(&layout, Arc::new(FakeProbe::new()), Duration::from_secs(60));
        let snap = cache.get_states(false);

        let by_path = snap.state_for_path(&foo).unwrap();
        let by_remote = snap.state_for_remote("HTTPS://GITHUB.COM/acme/foo/").unwrap();
        assert_eq!(by_path, by_remote);
        assert!(by_path.can_push);
        assert_eq!(
            snap.origins_under(&layout.installed),
            vec!["https://github.com/acme/foo".to_string()]
        );
        assert!(snap.origins_under(&layout.new_projects).is_empty());
    }

    #[test]
    fn non_ascii_origin_does_not_break_the_scan() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fake_repo(&layout.installed_repo("foo"), true, Some("/srv/git/項目"));
        fake_repo(&layout.installed_repo("bar"), true, Some("/srv/git/bär.git"));

        let cache = cache_for(&layout, Arc::new(FakeProbe::new()), Duration::from_secs(60));
        let snap = cache.get_states(false);

        assert_eq!(snap.by_path.len(), 2);
        assert!(snap.state_for_remote("/srv/git/項目/").is_some());
        assert!(snap.state_for_remote("/srv/git/bär").is_some());
    }

    #[test]
    fn cached_snapshot_served_within_ttl() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fake_repo(&layout.installed_repo("foo"), false, None);

        let probe = Arc::new(FakeProbe::new());
        let cache = cache_for(&layout, probe.clone(), Duration::from_secs(60));
        let first = cache.get_states(false);

        // Disk changes inside the TTL window are not observed.
        fake_repo(&layout.installed_repo("late"), true, None);
        let second = cache.get_states(false);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.scan_count(), 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_rescan() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fake_repo(&layout.installed_repo("foo"), false, None);

        let cache = cache_for(&layout, Arc::new(FakeProbe::new()), Duration::from_secs(60));
        let first = cache.get_states(false);
        cache.invalidate();
        let second = cache.get_states(false);

        assert_eq!(cache.scan_count(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn force_refresh_rescans_even_when_fresh() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        let cache = cache_for(&layout, Arc::new(FakeProbe::new()), Duration::from_secs(60));

        cache.get_states(false);
        cache.get_states(true);
        assert_eq!(cache.scan_count(), 2);
    }

    #[test]
    fn expired_cache_rescans() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        let cache = cache_for(&layout, Arc::new(FakeProbe::new()), Duration::from_millis(20));

        cache.get_states(false);
        thread::sleep(Duration::from_millis(40));
        cache.get_states(false);
        assert_eq!(cache.scan_count(), 2);
    }

    #[test]
    fn concurrent_stale_readers_share_one_scan() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fake_repo(&layout.installed_repo("foo"), true, None);

        let probe = Arc::new(FakeProbe {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
        });
        let cache = Arc::new(cache_for(&layout, probe, Duration::from_secs(60)));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_states(false))
            })
            .collect();
        let snaps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.scan_count(), 1);
        assert!(snaps.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn forced_caller_queued_behind_a_scan_reuses_it() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        fake_repo(&layout.installed_repo("foo"), false, None);

        let probe = Arc::new(FakeProbe {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(300),
        });
        let cache = Arc::new(cache_for(&layout, probe, Duration::from_secs(60)));

        let first = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_states(false))
        };
        thread::sleep(Duration::from_millis(50));
        let forced = cache.get_states(true);
        let first = first.join().unwrap();

        assert_eq!(cache.scan_count(), 1);
        assert!(Arc::ptr_eq(&first, &forced));

        // Once nothing is in flight, force rescans again.
        cache.get_states(true);
        assert_eq!(cache.scan_count(), 2);
    }
}
