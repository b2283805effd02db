//! In-memory doubles for the remote store and the clock.

use crate::remote::{RemoteError, RemoteSheet};
use crate::retry::Clock;
use banditlog_core::Cell;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Records requested sleeps instead of blocking.
#[derive(Debug, Default)]
pub struct FakeClock {
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Spreadsheet double with scripted failures.
#[derive(Debug, Default)]
pub struct FakeSheet {
    /// Worksheet name -> rows, header first.
    pub worksheets: BTreeMap<String, Vec<Vec<Cell>>>,
    /// Successful batches in arrival order: (worksheet, row count).
    pub batches: Vec<(String, usize)>,
    /// Every append attempt, successful or not.
    pub append_attempts: usize,
    pub ensure_calls: usize,
    /// Outcome of the next append attempts; `None` entries succeed.
    pub script: VecDeque<Option<RemoteError>>,
    /// Returned by every append once `script` is drained.
    pub always_fail: Option<RemoteError>,
    pub ensure_fail: Option<RemoteError>,
}

impl FakeSheet {
    pub fn failing(error: RemoteError) -> Self {
        Self {
            always_fail: Some(error),
            ..Default::default()
        }
    }

    pub fn scripted(script: impl IntoIterator<Item = Option<RemoteError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Data rows (header excluded) of a worksheet.
    pub fn data_rows(&self, worksheet: &str) -> &[Vec<Cell>] {
        self.worksheets
            .get(worksheet)
            .map(|rows| rows.get(1..).unwrap_or(&[]))
            .unwrap_or(&[])
    }
}

impl RemoteSheet for FakeSheet {
    fn ensure_worksheet(&mut self, worksheet: &str, header: &[&str]) -> Result<(), RemoteError> {
        self.ensure_calls += 1;
        if let Some(err) = &self.ensure_fail {
            return Err(err.clone());
        }
        self.worksheets.entry(worksheet.to_string()).or_insert_with(|| {
            vec![header.iter().map(|h| Cell::Text(h.to_string())).collect()]
        });
        Ok(())
    }

    fn append_rows(&mut self, worksheet: &str, rows: &[Vec<Cell>]) -> Result<(), RemoteError> {
        self.append_attempts += 1;
        let scripted = self.script.pop_front();
        let failure = match scripted {
            Some(outcome) => outcome,
            None => self.always_fail.clone(),
        };
        if let Some(err) = failure {
            return Err(err);
        }
        let sheet = self
            .worksheets
            .get_mut(worksheet)
            .ok_or_else(|| RemoteError::Structural(format!("no worksheet {worksheet}")))?;
        sheet.extend(rows.iter().cloned());
        self.batches.push((worksheet.to_string(), rows.len()));
        Ok(())
    }
}
