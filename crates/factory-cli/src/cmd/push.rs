use anyhow::Result;
use factory_core::push::{push_repository, VersionMode};

use super::Ctx;
use crate::output::print_json;

pub fn run(ctx: &Ctx, path: &str, generate: bool, message: Option<&str>) -> Result<()> {
    let dir = ctx.project_dir(path)?;
    let mode = if generate {
        VersionMode::GenerateVersion
    } else {
        VersionMode::UseExisting
    };
    let fallback = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&ctx.settings.ui.default_push_message);

    let outcome = push_repository(&dir, mode, fallback, ctx.settings.timeouts.git_push())?;

    if ctx.json {
        print_json(&outcome)?;
    } else {
        let rebased = if outcome.rebased { " (after rebase)" } else { "" };
        println!(
            "Pushed {} to origin/{}{rebased}: {}",
            outcome.path, outcome.branch, outcome.message
        );
    }
    Ok(())
}
