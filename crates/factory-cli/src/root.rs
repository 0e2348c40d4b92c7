use std::path::{Path, PathBuf};

use factory_core::paths::SETTINGS_FILE;

/// Resolve the projects-factory root directory.
///
/// Priority:
/// 1. `--root` flag / `FACTORY_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of `cwd` holding `settings.yaml`
/// 3. Nearest ancestor of `cwd` holding `.git/`
/// 4. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd)
}

fn find_root_from(start: &Path) -> PathBuf {
    nearest(start, |dir| dir.join(SETTINGS_FILE).is_file())
        .or_else(|| nearest(start, |dir| dir.join(".git").is_dir()))
        .unwrap_or_else(|| start.to_path_buf())
}

fn nearest(start: &Path, marker: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|dir| marker(dir)).map(Path::to_path_buf)
}
