use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header of the per-round log worksheet and the local log export.
pub const LOG_HEADER: &[&str] = &[
    "timestamp",
    "participant_id",
    "round",
    "choice",
    "reward",
    "switch_count",
];

/// Header of the per-participant summary worksheet and the local summary export.
pub const SUMMARY_HEADER: &[&str] = &[
    "timestamp",
    "participant_id",
    "total_reward",
    "switches_total",
    "switches_first_window",
    "switches_last_window",
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid value for `{field}`: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("unknown choice {0:?} (expected A, B or C)")]
    UnknownChoice(String),
    #[error("round limit of {limit} already reached")]
    RoundLimitReached { limit: u32 },
}

/// One of the three arms offered each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::A, Choice::B, Choice::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
        }
    }

    /// Parse a compact choice string such as `"AABBBC"`. Whitespace and commas are ignored.
    pub fn parse_sequence(s: &str) -> Result<Vec<Choice>, RecordError> {
        s.chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .map(|c| c.to_string().parse())
            .collect()
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Choice::A),
            "B" | "b" => Ok(Choice::B),
            "C" | "c" => Ok(Choice::C),
            other => Err(RecordError::UnknownChoice(other.to_string())),
        }
    }
}

/// A single spreadsheet cell. Serialises to a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{v}"),
            // `{}` on f64 is the shortest representation that parses back exactly.
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

/// A record that maps onto one row of a worksheet.
pub trait SheetRow: Sized {
    const HEADER: &'static [&'static str];

    /// Cells in `HEADER` order.
    fn cells(&self) -> Vec<Cell>;

    /// Rebuild a record from textual fields in `HEADER` order.
    fn from_fields(fields: &[&str]) -> Result<Self, RecordError>;
}

/// One row of the per-round experiment log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: i64,
    pub participant_id: String,
    pub round: u32,
    pub choice: Choice,
    pub reward: f64,
    pub switch_count: u32,
}

/// One row per participant, computed when the run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub timestamp: i64,
    pub participant_id: String,
    pub total_reward: f64,
    pub switches_total: u32,
    pub switches_first_window: u32,
    pub switches_last_window: u32,
}

fn check_len(fields: &[&str], expected: usize) -> Result<(), RecordError> {
    if fields.len() != expected {
        return Err(RecordError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, RecordError> {
    value.trim().parse().map_err(|_| RecordError::InvalidField {
        field,
        value: value.to_string(),
    })
}

impl SheetRow for LogRecord {
    const HEADER: &'static [&'static str] = LOG_HEADER;

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.timestamp),
            Cell::Text(self.participant_id.clone()),
            Cell::Int(i64::from(self.round)),
            Cell::Text(self.choice.to_string()),
            Cell::Float(self.reward),
            Cell::Int(i64::from(self.switch_count)),
        ]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, RecordError> {
        check_len(fields, LOG_HEADER.len())?;
        let round: u32 = parse_field("round", fields[2])?;
        if round == 0 {
            return Err(RecordError::InvalidField {
                field: "round",
                value: fields[2].to_string(),
            });
        }
        Ok(Self {
            timestamp: parse_field("timestamp", fields[0])?,
            participant_id: fields[1].to_string(),
            round,
            choice: fields[3].parse()?,
            reward: parse_field("reward", fields[4])?,
            switch_count: parse_field("switch_count", fields[5])?,
        })
    }
}

impl SheetRow for SummaryRecord {
    const HEADER: &'static [&'static str] = SUMMARY_HEADER;

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.timestamp),
            Cell::Text(self.participant_id.clone()),
            Cell::Float(self.total_reward),
            Cell::Int(i64::from(self.switches_total)),
            Cell::Int(i64::from(self.switches_first_window)),
            Cell::Int(i64::from(self.switches_last_window)),
        ]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, RecordError> {
        check_len(fields, SUMMARY_HEADER.len())?;
        Ok(Self {
            timestamp: parse_field("timestamp", fields[0])?,
            participant_id: fields[1].to_string(),
            total_reward: parse_field("total_reward", fields[2])?,
            switches_total: parse_field("switches_total", fields[3])?,
            switches_first_window: parse_field("switches_first_window", fields[4])?,
            switches_last_window: parse_field("switches_last_window", fields[5])?,
        })
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Round a reward amount to two decimals.
pub fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Generate a fresh participant id: `p_<ulid>`.
pub fn new_participant_id() -> String {
    format!("p_{}", ulid::Ulid::new().to_string().to_lowercase())
}
