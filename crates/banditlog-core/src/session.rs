use crate::switches::{count_switches, switches_first_window, switches_last_window};
use crate::types::{round_cents, Choice, LogRecord, RecordError, SummaryRecord};
use serde::{Deserialize, Serialize};

/// Mutable per-participant state for one experiment run.
///
/// Created at session start, reset on an explicit user request, dropped at session end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    participant_id: String,
    round: u32,
    last_choice: Option<Choice>,
    total_reward: f64,
    switch_count: u32,
    history: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<i64>,
}

impl SessionContext {
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            ..Default::default()
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Number of rounds completed so far.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn last_choice(&self) -> Option<Choice> {
        self.last_choice
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    pub fn history(&self) -> &[Choice] {
        &self.history
    }

    pub fn completed_at(&self) -> Option<i64> {
        self.completed_at
    }

    pub fn set_participant_id(&mut self, participant_id: impl Into<String>) {
        self.participant_id = participant_id.into();
    }

    /// Discard all progress and start over under a new participant id.
    pub fn reset(&mut self, participant_id: impl Into<String>) {
        *self = Self::new(participant_id);
    }

    /// Apply one completed round. Returns the new round number and cumulative switch count.
    fn advance(&mut self, choice: Choice, reward: f64) -> (u32, u32) {
        if self.last_choice.is_some_and(|prev| prev != choice) {
            self.switch_count += 1;
        }
        self.round += 1;
        self.last_choice = Some(choice);
        self.total_reward += reward;
        self.history.push(choice);
        (self.round, self.switch_count)
    }
}

/// Produces log rows for a run of `round_limit` rounds.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    ctx: SessionContext,
    round_limit: u32,
}

impl SessionRecorder {
    pub fn new(participant_id: impl Into<String>, round_limit: u32) -> Self {
        Self {
            ctx: SessionContext::new(participant_id),
            round_limit,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn round_limit(&self) -> u32 {
        self.round_limit
    }

    pub fn is_complete(&self) -> bool {
        self.ctx.round >= self.round_limit
    }

    /// Start over with a fresh participant id, keeping the round limit.
    pub fn reset(&mut self, participant_id: impl Into<String>) {
        self.ctx.reset(participant_id);
    }

    /// Record one completed round and build its log row.
    pub fn produce_record(
        &mut self,
        choice: Choice,
        reward: f64,
        timestamp: i64,
    ) -> Result<LogRecord, RecordError> {
        if self.is_complete() {
            return Err(RecordError::RoundLimitReached {
                limit: self.round_limit,
            });
        }
        let (round, switch_count) = self.ctx.advance(choice, reward);
        if self.is_complete() {
            self.ctx.completed_at = Some(timestamp);
        }
        Ok(LogRecord {
            timestamp,
            participant_id: self.ctx.participant_id.clone(),
            round,
            choice,
            reward,
            switch_count,
        })
    }

    /// Summary row for a completed run, or `None` while rounds remain.
    ///
    /// Depends only on accumulated history, so repeated calls return identical rows.
    pub fn produce_summary(&self, window: usize) -> Option<SummaryRecord> {
        let timestamp = self.ctx.completed_at?;
        let history = &self.ctx.history;
        Some(SummaryRecord {
            timestamp,
            participant_id: self.ctx.participant_id.clone(),
            total_reward: round_cents(self.ctx.total_reward),
            switches_total: count_switches(history),
            switches_first_window: switches_first_window(history, window),
            switches_last_window: switches_last_window(history, window),
        })
    }
}
