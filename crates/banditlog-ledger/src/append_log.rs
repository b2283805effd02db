use crate::export;
use crate::remote::{RemoteError, RemoteSheet};
use crate::retry::{Clock, RetryError, RetryPolicy, SystemClock};
use banditlog_core::{Cell, LogRecord, SheetRow, SummaryRecord, LOG_HEADER, SUMMARY_HEADER};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

/// Scalar settings of an append log. Fixed for the lifetime of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub log_worksheet: String,
    pub summary_worksheet: String,
    /// Buffer length that triggers a flush from `enqueue`. Values below 1 are treated as 1.
    pub flush_threshold: usize,
    pub retry: RetryPolicy,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_worksheet: "logs".to_string(),
            summary_worksheet: "summary".to_string(),
            flush_threshold: 15,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered.
    Empty,
    /// Record buffered, threshold not reached.
    Pending { buffered: usize },
    /// The whole buffer was appended remotely and cleared.
    Flushed { rows: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    Saved,
    AlreadySaved,
}

/// A flush that did not reach the remote store. Buffered records are never dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlushError {
    /// Transient failures on every attempt. The caller may flush again later.
    #[error("remote store unavailable after {attempts} attempts; {pending} row(s) kept for retry: {detail}")]
    Exhausted {
        attempts: u32,
        pending: usize,
        detail: String,
    },
    /// Configuration or permission problem that retrying cannot fix.
    #[error("remote store rejected the write; {pending} row(s) kept: {detail}")]
    Structural { pending: usize, detail: String },
}

impl FlushError {
    fn from_retry(err: RetryError, pending: usize) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => FlushError::Exhausted {
                attempts,
                pending,
                detail: last.detail().to_string(),
            },
            RetryError::Fatal { error, .. } => FlushError::Structural {
                pending,
                detail: error.detail().to_string(),
            },
        }
    }

    /// Whether a later flush could succeed without operator intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FlushError::Exhausted { .. })
    }

    pub fn pending(&self) -> usize {
        match self {
            FlushError::Exhausted { pending, .. } | FlushError::Structural { pending, .. } => {
                *pending
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Target {
    Log,
    Summary,
}

/// Single-writer buffered append log over a remote spreadsheet.
///
/// Rows are buffered in arrival order and appended as one batch when the buffer
/// reaches `flush_threshold` or on an explicit [`flush`](Self::flush). Transient
/// remote failures are retried per the [`RetryPolicy`]; whatever cannot be
/// delivered stays buffered and can be exported as CSV at any time.
pub struct AppendLog<S, C = SystemClock> {
    sink: S,
    clock: C,
    rng: StdRng,
    settings: LogSettings,
    buffer: Vec<LogRecord>,
    log_ready: bool,
    summary_ready: bool,
    persisted: bool,
    summary_marker: Option<PathBuf>,
}

impl<S: RemoteSheet> AppendLog<S, SystemClock> {
    pub fn new(sink: S, settings: LogSettings) -> Self {
        Self::with_clock(sink, SystemClock, settings)
    }
}

impl<S: RemoteSheet, C: Clock> AppendLog<S, C> {
    pub fn with_clock(sink: S, clock: C, settings: LogSettings) -> Self {
        Self {
            sink,
            clock,
            rng: StdRng::from_entropy(),
            settings,
            buffer: Vec::new(),
            log_ready: false,
            summary_ready: false,
            persisted: false,
            summary_marker: None,
        }
    }

    /// Seed the jitter source for reproducible backoff schedules.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Mirror the summary "persisted" flag to a marker file, so a restarted
    /// session for the same participant does not append a second summary row.
    pub fn with_summary_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        let marker = marker.into();
        if marker.exists() {
            tracing::info!(marker = %marker.display(), "summary already saved in an earlier session");
            self.persisted = true;
        }
        self.summary_marker = Some(marker);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Records accepted by `enqueue` but not yet confirmed remotely.
    pub fn pending(&self) -> &[LogRecord] {
        &self.buffer
    }

    pub fn is_summary_persisted(&self) -> bool {
        self.persisted
    }

    /// Buffer one record, flushing synchronously once the threshold is reached.
    ///
    /// The record is retained even when the triggered flush fails.
    pub fn enqueue(&mut self, record: LogRecord) -> Result<FlushOutcome, FlushError> {
        if let Some(prev) = self.buffer.last() {
            if prev.participant_id == record.participant_id && record.round != prev.round + 1 {
                tracing::warn!(
                    participant = %record.participant_id,
                    previous = prev.round,
                    round = record.round,
                    "round sequence is not contiguous"
                );
            }
        }
        self.buffer.push(record);
        if self.buffer.len() >= self.settings.flush_threshold.max(1) {
            return self.flush();
        }
        Ok(FlushOutcome::Pending {
            buffered: self.buffer.len(),
        })
    }

    /// Append the whole buffer as one batch. The buffer is cleared only on success.
    pub fn flush(&mut self) -> Result<FlushOutcome, FlushError> {
        if self.buffer.is_empty() {
            return Ok(FlushOutcome::Empty);
        }
        let rows: Vec<Vec<Cell>> = self.buffer.iter().map(|r| r.cells()).collect();
        tracing::debug!(rows = rows.len(), "flushing log buffer");
        match self.append_with_retry(Target::Log, &rows) {
            Ok(()) => {
                let flushed = self.buffer.len();
                self.buffer.clear();
                tracing::info!(rows = flushed, worksheet = %self.settings.log_worksheet, "log batch appended");
                Ok(FlushOutcome::Flushed { rows: flushed })
            }
            Err(err) => Err(FlushError::from_retry(err, self.buffer.len())),
        }
    }

    /// Append the run's summary row once. Later calls are no-ops.
    pub fn save_summary(&mut self, record: &SummaryRecord) -> Result<SummaryOutcome, FlushError> {
        if self.persisted {
            return Ok(SummaryOutcome::AlreadySaved);
        }
        let rows = vec![record.cells()];
        self.append_with_retry(Target::Summary, &rows)
            .map_err(|err| FlushError::from_retry(err, 1))?;
        self.persisted = true;
        tracing::info!(participant = %record.participant_id, "summary row appended");
        if let Some(marker) = &self.summary_marker {
            let stamp = format!("{}\n", record.timestamp);
            if let Err(e) = banditlog_store::write_atomic(marker, stamp.as_bytes()) {
                tracing::warn!(marker = %marker.display(), error = %e, "cannot write summary marker");
            }
        }
        Ok(SummaryOutcome::Saved)
    }

    /// CSV of every buffered record. Never fails.
    pub fn export_pending(&self) -> String {
        export::to_csv(&self.buffer)
    }

    /// CSV of a summary row, for when [`save_summary`](Self::save_summary) failed.
    pub fn export_summary(&self, record: &SummaryRecord) -> String {
        export::to_csv(std::slice::from_ref(record))
    }

    fn append_with_retry(&mut self, target: Target, rows: &[Vec<Cell>]) -> Result<(), RetryError> {
        let (worksheet, header, ready) = match target {
            Target::Log => (&self.settings.log_worksheet, LOG_HEADER, &mut self.log_ready),
            Target::Summary => (
                &self.settings.summary_worksheet,
                SUMMARY_HEADER,
                &mut self.summary_ready,
            ),
        };
        let sink = &mut self.sink;
        self.settings
            .retry
            .run(&self.clock, &mut self.rng, |attempt| -> Result<(), RemoteError> {
                if !*ready {
                    sink.ensure_worksheet(worksheet, header)?;
                    *ready = true;
                }
                tracing::debug!(attempt, worksheet = %worksheet, rows = rows.len(), "append attempt");
                sink.append_rows(worksheet, rows)
            })
    }
}
