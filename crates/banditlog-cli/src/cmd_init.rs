use banditlog_ledger::{BanditPaths, ExperimentConfig};
use std::path::Path;

pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = BanditPaths::discover(repo_root);

    if paths.is_initialized() {
        paths.ensure_layout()?;
        println!("Already initialized at {}", paths.dir.display());
        return Ok(());
    }

    paths.ensure_layout()?;
    if !paths.config_json.exists() {
        ExperimentConfig::write_default(&paths)?;
    }

    println!("Initialized {}", paths.dir.display());
    println!("  next: banditlog config set sheet_id <spreadsheet id>");
    println!(
        "        export {}=<oauth token>",
        banditlog_ledger::config::ENV_ACCESS_TOKEN
    );
    Ok(())
}
