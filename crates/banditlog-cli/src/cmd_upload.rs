use crate::workspace::Workspace;
use anyhow::Context;
use banditlog_core::{LogRecord, SummaryRecord};
use banditlog_ledger::{export, AppendLog, Clock, LogSettings, RemoteSheet, SummaryOutcome};
use banditlog_ledger::WorkspaceLock;
use banditlog_sheets::SheetsClient;
use std::path::Path;

/// `banditlog upload [--summary] <file>`
///
/// Re-sends rows from a fallback export. An export under `.banditlog/exports/`
/// is removed once every row in it has been accepted.
pub fn execute(repo_root: &Path, file: &Path, summary: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(repo_root)?;
    let _lock = WorkspaceLock::acquire(&ws.paths)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;

    if summary {
        let rows: Vec<SummaryRecord> = export::parse_csv(&text)
            .with_context(|| format!("{} is not a summary export", file.display()))?;
        upload_summaries(&rows, |pid| ws.open_log(pid))?;
    } else {
        let rows: Vec<LogRecord> = export::parse_csv(&text)
            .with_context(|| format!("{} is not a log export", file.display()))?;
        let settings = LogSettings {
            flush_threshold: usize::MAX,
            ..ws.config.log_settings()
        };
        let mut log = AppendLog::new(SheetsClient::from_config(&ws.config), settings);
        let sent = upload_logs(&mut log, rows)?;
        println!("✓ Uploaded {sent} log row(s)");
    }

    let exports = ws.paths.exports_dir.canonicalize()?;
    if file.canonicalize()?.starts_with(exports) {
        std::fs::remove_file(file)
            .with_context(|| format!("cannot remove {}", file.display()))?;
        println!("  removed {}", file.display());
    }
    Ok(())
}

/// Send every row as a single batch.
fn upload_logs<S: RemoteSheet, C: Clock>(
    log: &mut AppendLog<S, C>,
    rows: Vec<LogRecord>,
) -> anyhow::Result<usize> {
    if rows.is_empty() {
        anyhow::bail!("export holds no rows");
    }
    let total = rows.len();
    for row in rows {
        log.enqueue(row)?;
    }
    log.flush()?;
    Ok(total)
}

/// Save each participant's summary once. Rows already marked as saved are skipped.
fn upload_summaries<S, C, F>(rows: &[SummaryRecord], mut open_log: F) -> anyhow::Result<()>
where
    S: RemoteSheet,
    C: Clock,
    F: FnMut(&str) -> AppendLog<S, C>,
{
    if rows.is_empty() {
        anyhow::bail!("export holds no rows");
    }
    for row in rows {
        let mut log = open_log(&row.participant_id);
        match log.save_summary(row)? {
            SummaryOutcome::Saved => println!("✓ Summary saved for {}", row.participant_id),
            SummaryOutcome::AlreadySaved => {
                println!("  summary for {} was already saved", row.participant_id)
            }
        }
    }
    Ok(())
}
