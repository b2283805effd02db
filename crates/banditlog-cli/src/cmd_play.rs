use crate::workspace::Workspace;
use banditlog_core::reward::{random_choice, RewardModel};
use banditlog_core::{new_participant_id, now_unix, Choice, SessionRecorder, SummaryRecord};
use banditlog_ledger::{AppendLog, FlushError, FlushOutcome, RemoteSheet, SummaryOutcome};
use banditlog_ledger::{BanditPaths, Clock, WorkspaceLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

pub struct PlayParams<'a> {
    pub repo_root: &'a Path,
    pub participant: Option<&'a str>,
    /// Scripted choices such as `"AABBC"`. Random choices fill any remaining rounds.
    pub choices: Option<&'a str>,
    pub rounds: Option<u32>,
    pub seed: Option<u64>,
}

pub fn execute(params: &PlayParams<'_>) -> anyhow::Result<()> {
    let ws = Workspace::open(params.repo_root)?;
    let _lock = WorkspaceLock::acquire(&ws.paths)?;

    let script = match params.choices {
        Some(s) => Choice::parse_sequence(s)?,
        None => Vec::new(),
    };
    let rounds = resolve_rounds(params.rounds, &script, ws.config.n_rounds)?;
    let participant = params
        .participant
        .map(str::to_string)
        .unwrap_or_else(new_participant_id);

    let mut log = ws.open_log(&participant);
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("Participant {participant}: {rounds} rounds");
    let session = Session {
        paths: &ws.paths,
        window: ws.config.window,
        recorder: SessionRecorder::new(participant, rounds),
        model: RewardModel::default(),
    };
    session.run(&mut log, &script, &mut rng)
}

/// Rounds to play: explicit flag, else the script length, else the configured limit.
fn resolve_rounds(flag: Option<u32>, script: &[Choice], configured: u32) -> anyhow::Result<u32> {
    let rounds = match flag {
        Some(n) => n,
        None if !script.is_empty() => script.len() as u32,
        None => configured,
    };
    if rounds == 0 {
        anyhow::bail!("a session needs at least one round");
    }
    if script.len() > rounds as usize {
        anyhow::bail!(
            "{} scripted choices exceed the {rounds}-round limit",
            script.len()
        );
    }
    Ok(rounds)
}

struct Session<'a> {
    paths: &'a BanditPaths,
    window: usize,
    recorder: SessionRecorder,
    model: RewardModel,
}

impl Session<'_> {
    fn run<S: RemoteSheet, C: Clock>(
        mut self,
        log: &mut AppendLog<S, C>,
        script: &[Choice],
        rng: &mut StdRng,
    ) -> anyhow::Result<()> {
        let rounds = self.recorder.round_limit();
        for i in 0..rounds as usize {
            let choice = script
                .get(i)
                .copied()
                .unwrap_or_else(|| random_choice(rng));
            let reward = self.model.draw(choice, rng);
            let record = self.recorder.produce_record(choice, reward, now_unix())?;
            let ctx = self.recorder.context();
            println!(
                "  round {:>3}  {choice}  +{reward:.2}  total {:.2}  switches {}",
                record.round,
                ctx.total_reward(),
                ctx.switch_count()
            );
            let outcome = log.enqueue(record);
            self.report(log, outcome, None)?;
        }

        let outcome = log.flush();
        self.report(log, outcome, None)?;

        let summary = self
            .recorder
            .produce_summary(self.window)
            .ok_or_else(|| anyhow::anyhow!("session ended before the round limit"))?;
        match log.save_summary(&summary) {
            Ok(SummaryOutcome::Saved) => println!(
                "✓ Summary saved: total {:.2}, switches {} (first {}, last {})",
                summary.total_reward,
                summary.switches_total,
                summary.switches_first_window,
                summary.switches_last_window
            ),
            Ok(SummaryOutcome::AlreadySaved) => {
                println!("Summary for {} was already saved", summary.participant_id)
            }
            Err(e) => self.fail(log, e, Some(&summary))?,
        }

        self.write_fallback(log, Some(&summary))?;
        Ok(())
    }

    /// Print a flush outcome. Structural failures export what is pending and stop the session.
    fn report<S: RemoteSheet, C: Clock>(
        &self,
        log: &AppendLog<S, C>,
        outcome: Result<FlushOutcome, FlushError>,
        summary: Option<&SummaryRecord>,
    ) -> anyhow::Result<()> {
        match outcome {
            Ok(FlushOutcome::Flushed { rows }) => println!("  ✓ saved {rows} row(s)"),
            Ok(FlushOutcome::Pending { .. } | FlushOutcome::Empty) => {}
            Err(e) => self.fail(log, e, summary)?,
        }
        Ok(())
    }

    fn fail<S: RemoteSheet, C: Clock>(
        &self,
        log: &AppendLog<S, C>,
        err: FlushError,
        summary: Option<&SummaryRecord>,
    ) -> anyhow::Result<()> {
        if err.is_recoverable() {
            eprintln!("  ! warning: {err}");
            eprintln!("    rows stay buffered and are retried on the next flush");
            return Ok(());
        }
        self.write_fallback(log, summary)?;
        Err(anyhow::anyhow!(err).context("cannot write to the spreadsheet; check sheet_id and credentials"))
    }

    /// Export whatever the remote store has not confirmed. No-op when everything is saved.
    fn write_fallback<S: RemoteSheet, C: Clock>(
        &self,
        log: &AppendLog<S, C>,
        summary: Option<&SummaryRecord>,
    ) -> anyhow::Result<()> {
        let participant = self.recorder.context().participant_id();
        if !log.pending().is_empty() {
            let path = BanditPaths::first_free(self.paths.log_export(participant));
            banditlog_store::write_atomic(&path, log.export_pending().as_bytes())?;
            eprintln!(
                "  {} unsaved row(s) exported to {}",
                log.pending().len(),
                path.display()
            );
            eprintln!("  retry later with: banditlog upload {}", path.display());
        }
        if let Some(summary) = summary.filter(|_| !log.is_summary_persisted()) {
            let path = BanditPaths::first_free(self.paths.summary_export(participant));
            banditlog_store::write_atomic(&path, log.export_summary(summary).as_bytes())?;
            eprintln!("  unsaved summary exported to {}", path.display());
            eprintln!(
                "  retry later with: banditlog upload --summary {}",
                path.display()
            );
        }
        Ok(())
    }
}
