pub mod delete;
pub mod install;
pub mod new;
pub mod push;
pub mod refresh;
pub mod repos;
pub mod serve;
pub mod states;
pub mod version;

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use factory_core::cache::Snapshot;
use factory_core::paths::Layout;
use factory_core::probe::GitProbe;
use factory_core::scanner::Scanner;
use factory_core::settings::{GithubIdentity, Settings};

/// Everything a subcommand needs: where the tree lives, how it is tuned and
/// which GitHub account it belongs to.
pub struct Ctx {
    pub layout: Layout,
    pub settings: Settings,
    pub identity: GithubIdentity,
    pub json: bool,
}

impl Ctx {
    pub fn load(root: PathBuf, identity: GithubIdentity, json: bool) -> anyhow::Result<Self> {
        let layout = Layout::new(root);
        let settings = Settings::load(&layout)
            .with_context(|| format!("failed to load settings under {}", layout.root.display()))?;
        Ok(Self {
            layout,
            settings,
            identity,
            json,
        })
    }

    pub fn probe(&self) -> GitProbe {
        GitProbe::new(self.settings.timeouts.git_remote())
    }

    /// One fresh scan. A CLI process lives for a single command, so there is
    /// no cache to consult.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::build(&Scanner::from_layout(&self.layout), &self.probe())
    }

    /// A directory named on the command line: used as-is when it exists,
    /// otherwise looked up by project name the way the web UI does.
    pub fn project_dir(&self, raw: &str) -> anyhow::Result<PathBuf> {
        let direct = PathBuf::from(raw);
        if direct.is_dir() {
            return Ok(direct);
        }
        self.layout
            .resolve_project_path(raw)
            .ok_or_else(|| anyhow!("project not found: {raw}"))
    }
}
