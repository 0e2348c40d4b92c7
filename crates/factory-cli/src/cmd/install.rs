use anyhow::{bail, Result};
use factory_core::folders::{install_repos, InstallStatus};

use super::Ctx;
use crate::output::{print_json, print_table};

pub fn run(ctx: &Ctx, urls: &[String]) -> Result<()> {
    let results = install_repos(&ctx.layout, urls, ctx.settings.timeouts.install_per_repo())?;

    if ctx.json {
        print_json(&results)?;
    } else {
        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                let status = match r.status {
                    InstallStatus::Installed => "installed",
                    InstallStatus::Skipped => "skipped",
                    InstallStatus::Error => "error",
                };
                vec![
                    r.name.clone(),
                    status.to_string(),
                    r.detail.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["NAME", "STATUS", "DETAIL"], &rows);
    }

    let failed = results
        .iter()
        .filter(|r| r.status == InstallStatus::Error)
        .count();
    if failed > 0 {
        bail!("{failed} of {} repositories failed to install", results.len());
    }
    Ok(())
}
