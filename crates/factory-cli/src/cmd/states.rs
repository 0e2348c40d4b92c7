use anyhow::Result;
use factory_core::probe::RepoState;
use factory_core::scanner::Scanner;
use serde::Serialize;

use super::Ctx;
use crate::output::{flag, print_json, print_table};

#[derive(Serialize)]
struct StateRow {
    path: String,
    remote_url: Option<String>,
    #[serde(flatten)]
    state: RepoState,
}

pub fn run(ctx: &Ctx) -> Result<()> {
    let rows: Vec<StateRow> = Scanner::from_layout(&ctx.layout)
        .scan(&ctx.probe())
        .into_iter()
        .map(|(path, report)| StateRow {
            path: path.to_string_lossy().into_owned(),
            remote_url: report.remote_url,
            state: report.state,
        })
        .collect();

    if ctx.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No git working copies found.");
        return Ok(());
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.path.clone(),
                flag(r.state.has_uncommitted),
                flag(r.state.is_github_remote),
                flag(r.state.can_push),
                r.remote_url.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["PATH", "DIRTY", "GITHUB", "PUSH", "ORIGIN"], &table);
    Ok(())
}
