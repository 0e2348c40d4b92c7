use crate::error::{FactoryError, Result};
use crate::paths::{Layout, SETTINGS_FILE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Per-operation subprocess timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_refresh")]
    pub refresh: u64,
    #[serde(default = "default_create_project")]
    pub create_project: u64,
    #[serde(default = "default_install_per_repo")]
    pub install_per_repo: u64,
    #[serde(default = "default_rename")]
    pub rename: u64,
    #[serde(default = "default_git_remote")]
    pub git_remote: u64,
    #[serde(default = "default_git_push")]
    pub git_push: u64,
}

fn default_refresh() -> u64 {
    120
}

fn default_create_project() -> u64 {
    120
}

fn default_install_per_repo() -> u64 {
    300
}

fn default_rename() -> u64 {
    60
}

fn default_git_remote() -> u64 {
    5
}

fn default_git_push() -> u64 {
    120
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            create_project: default_create_project(),
            install_per_repo: default_install_per_repo(),
            rename: default_rename(),
            git_remote: default_git_remote(),
            git_push: default_git_push(),
        }
    }
}

impl Timeouts {
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh)
    }

    pub fn git_remote(&self) -> Duration {
        Duration::from_secs(self.git_remote)
    }

    pub fn git_push(&self) -> Duration {
        Duration::from_secs(self.git_push)
    }

    pub fn install_per_repo(&self) -> Duration {
        Duration::from_secs(self.install_per_repo)
    }

    pub fn create_project(&self) -> Duration {
        Duration::from_secs(self.create_project)
    }

    pub fn rename(&self) -> Duration {
        Duration::from_secs(self.rename)
    }
}

// ---------------------------------------------------------------------------
// CacheSettings / UiSettings / ServerSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_git_state_ttl")]
    pub git_state_ttl_sec: u64,
}

fn default_git_state_ttl() -> u64 {
    10
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            git_state_ttl_sec: default_git_state_ttl(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.git_state_ttl_sec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_push_message")]
    pub default_push_message: String,
}

fn default_push_message() -> String {
    "update".to_string()
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            default_push_message: default_push_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5999
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Contents of `settings.yaml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub ui: UiSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Load `settings.yaml` from the layout root. A missing file yields the
    /// defaults.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.settings_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(data).map_err(|e| {
            FactoryError::InvalidSettings(format!("{SETTINGS_FILE}: {e}"))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Every timeout and the cache TTL must be at least one second.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        let checks = [
            ("timeouts.refresh", t.refresh),
            ("timeouts.create_project", t.create_project),
            ("timeouts.install_per_repo", t.install_per_repo),
            ("timeouts.rename", t.rename),
            ("timeouts.git_remote", t.git_remote),
            ("timeouts.git_push", t.git_push),
            ("cache.git_state_ttl_sec", self.cache.git_state_ttl_sec),
        ];
        for (key, value) in checks {
            if value < 1 {
                return Err(FactoryError::InvalidSettings(format!(
                    "{key} must be an integer >= 1"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GithubIdentity
// ---------------------------------------------------------------------------

/// The GitHub account the catalog belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubIdentity {
    pub username: String,
    pub token: Option<String>,
}

impl GithubIdentity {
    pub fn new(username: Option<String>, token: Option<String>) -> Self {
        let username = username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { username, token }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
