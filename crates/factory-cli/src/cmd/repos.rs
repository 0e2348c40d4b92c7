use anyhow::Result;
use factory_core::catalog::ProjectCatalog;

use super::Ctx;
use crate::output::{flag, print_json, print_table};

pub fn run(ctx: &Ctx) -> Result<()> {
    let snapshot = ctx.snapshot();
    let view = ProjectCatalog::new(&ctx.layout, &ctx.identity.username).load(&snapshot);

    if ctx.json {
        return print_json(&view);
    }
    if view.repos.is_empty() {
        println!("No repositories. Run `projects-factory refresh` to fetch them from GitHub.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = view
        .repos
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                if r.is_new_project { "local" } else { "github" }.to_string(),
                flag(r.private),
                flag(r.can_push),
                r.url.clone(),
            ]
        })
        .collect();
    print_table(&["NAME", "SOURCE", "PRIVATE", "PUSH", "URL"], &rows);
    println!(
        "\n{} on GitHub, {} local",
        view.count,
        view.repos.len() - view.count
    );
    Ok(())
}
