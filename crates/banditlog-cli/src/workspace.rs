use banditlog_ledger::{AppendLog, BanditPaths, ExperimentConfig};
use banditlog_sheets::SheetsClient;
use std::path::Path;

/// An initialized `.banditlog/` workspace and its loaded configuration.
pub struct Workspace {
    pub paths: BanditPaths,
    pub config: ExperimentConfig,
}

impl Workspace {
    /// Find the nearest workspace at or above `start` and load its config.
    pub fn open(start: &Path) -> anyhow::Result<Self> {
        let root = BanditPaths::find_root(start).ok_or_else(|| {
            anyhow::anyhow!("No .banditlog/ workspace found. Run `banditlog init` first.")
        })?;
        let paths = BanditPaths::discover(root);
        paths.ensure_layout()?;
        let config = ExperimentConfig::load(&paths)?;
        tracing::debug!(root = %paths.root.display(), "opened workspace");
        Ok(Self { paths, config })
    }

    /// Append log for one participant, writing to the configured spreadsheet.
    pub fn open_log(&self, participant_id: &str) -> AppendLog<SheetsClient> {
        AppendLog::new(
            SheetsClient::from_config(&self.config),
            self.config.log_settings(),
        )
        .with_summary_marker(self.paths.summary_marker(participant_id))
    }
}
