use anyhow::Result;
use factory_core::catalog::ProjectCatalog;
use factory_core::github::GithubClient;

use super::Ctx;
use crate::output::print_json;

pub fn run(ctx: &Ctx) -> Result<()> {
    let client = GithubClient::new(&ctx.identity.username, ctx.identity.token.as_deref())?
        .with_timeout(ctx.settings.timeouts.refresh());
    let count = ProjectCatalog::new(&ctx.layout, &ctx.identity.username).refresh(&client)?;

    if ctx.json {
        print_json(&serde_json::json!({ "count": count }))?;
    } else {
        println!(
            "Fetched {count} repositories into {}",
            ctx.layout.catalog_path().display()
        );
    }
    Ok(())
}
