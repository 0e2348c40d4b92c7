use std::path::PathBuf;
use std::sync::Arc;

use factory_core::cache::StateCache;
use factory_core::github::{GithubClient, DEFAULT_API_BASE};
use factory_core::paths::Layout;
use factory_core::probe::{GitProbe, Probe};
use factory_core::scanner::Scanner;
use factory_core::settings::{GithubIdentity, Settings};

/// Shared application state passed to all route handlers.
///
/// The State Cache is built once here and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub layout: Arc<Layout>,
    pub settings: Arc<Settings>,
    pub identity: Arc<GithubIdentity>,
    pub cache: Arc<StateCache>,
    pub github_api_base: Arc<str>,
}

impl AppState {
    pub fn new(root: PathBuf, settings: Settings, identity: GithubIdentity) -> Self {
        let probe = Arc::new(GitProbe::new(settings.timeouts.git_remote()));
        Self::with_probe(root, settings, identity, probe)
    }

    /// Build the state around a custom probe (tests use a fake one).
    pub fn with_probe(
        root: PathBuf,
        settings: Settings,
        identity: GithubIdentity,
        probe: Arc<dyn Probe>,
    ) -> Self {
        let layout = Layout::new(root);
        let cache = StateCache::new(Scanner::from_layout(&layout), probe, settings.cache.ttl());
        Self {
            layout: Arc::new(layout),
            settings: Arc::new(settings),
            identity: Arc::new(identity),
            cache: Arc::new(cache),
            github_api_base: Arc::from(DEFAULT_API_BASE),
        }
    }

    /// Point the GitHub client at another API base (a mock server in tests).
    pub fn with_github_api_base(mut self, base: impl Into<String>) -> Self {
        self.github_api_base = Arc::from(base.into());
        self
    }

    /// A GitHub client for the configured account. Blocking: call from
    /// inside `spawn_blocking` only.
    pub fn github(&self) -> factory_core::Result<GithubClient> {
        GithubClient::with_api_base(
            &self.github_api_base,
            &self.identity.username,
            self.identity.token.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_stores_layout_and_ttl() {
        let mut settings = Settings::default();
        settings.cache.git_state_ttl_sec = 42;
        let state = AppState::new(
            PathBuf::from("/tmp/factory"),
            settings,
            GithubIdentity::new(Some("octo".into()), None),
        );
        assert_eq!(state.layout.installed, PathBuf::from("/tmp/factory/MY_REPOS"));
        assert_eq!(state.cache.ttl().as_secs(), 42);
        assert_eq!(state.identity.username, "octo");
        assert_eq!(&*state.github_api_base, DEFAULT_API_BASE);
    }
}
