use crate::workspace::Workspace;
use banditlog_ledger::BanditPaths;
use std::path::{Path, PathBuf};

pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(repo_root)?;
    let cfg = &ws.config;

    println!("Workspace: {}", ws.paths.dir.display());
    match &cfg.sheet_id {
        Some(id) => println!("Spreadsheet: {id}"),
        None => println!("Spreadsheet: (not set)"),
    }
    let token = if cfg.access_token.is_some() { "set" } else { "(not set)" };
    println!("Access token: {token}");
    println!(
        "Worksheets: {} / {}",
        cfg.log_worksheet, cfg.summary_worksheet
    );
    println!(
        "Flush every {} row(s), up to {} attempt(s) from {}ms backoff",
        cfg.flush_threshold, cfg.max_retries, cfg.base_backoff_ms
    );

    let exports = pending_exports(&ws.paths)?;
    if exports.is_empty() {
        println!("Unsent exports: none");
    } else {
        println!("Unsent exports: {}", exports.len());
        for path in &exports {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

/// CSV files in the exports directory, sorted by name.
fn pending_exports(paths: &BanditPaths) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !paths.exports_dir.is_dir() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(&paths.exports_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
