use anyhow::{bail, Result};
use factory_core::folders::{delete_folders, DeleteStatus};

use super::Ctx;
use crate::output::{print_json, print_table};

pub fn run(ctx: &Ctx, names: &[String]) -> Result<()> {
    let results = delete_folders(&ctx.layout, names)?;

    if ctx.json {
        print_json(&results)?;
    } else {
        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                let status = match r.status {
                    DeleteStatus::Deleted => "deleted",
                    DeleteStatus::NotFound => "not found",
                    DeleteStatus::Error => "error",
                };
                vec![
                    r.name.clone(),
                    status.to_string(),
                    r.path.clone().or_else(|| r.detail.clone()).unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["NAME", "STATUS", "DETAIL"], &rows);
    }

    if results.iter().any(|r| r.status == DeleteStatus::Error) {
        bail!("some folders could not be deleted");
    }
    Ok(())
}
