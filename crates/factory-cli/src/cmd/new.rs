use anyhow::Result;
use factory_core::folders::create_project;

use super::Ctx;
use crate::output::print_json;

pub fn run(ctx: &Ctx, name: Option<&str>) -> Result<()> {
    let folder = create_project(&ctx.layout, name)?;
    let path = ctx.layout.new_project(&folder);

    if ctx.json {
        print_json(&serde_json::json!({
            "folder_name": folder,
            "path": path.to_string_lossy(),
        }))?;
    } else {
        println!("Created {}", path.display());
    }
    Ok(())
}
