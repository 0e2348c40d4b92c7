use anyhow::Result;
use factory_core::version::generate_version_line;

use super::Ctx;
use crate::output::print_json;

pub fn run(ctx: &Ctx, path: &str, message: Option<&str>, dry_run: bool) -> Result<()> {
    let dir = ctx.project_dir(path)?;
    let line = generate_version_line(&dir, message, dry_run, ctx.settings.timeouts.git_push())?;

    if ctx.json {
        print_json(&serde_json::json!({
            "path": dir.to_string_lossy(),
            "line": line,
            "written": !dry_run,
        }))?;
    } else {
        println!("{line}");
    }
    Ok(())
}
