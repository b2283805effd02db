//! Local CSV fallback for records the remote store has not accepted.
//!
//! Output is UTF-8, comma-delimited, header first, one record per line. Fields
//! containing a comma, quote, or line break are quoted with doubled inner quotes.

use banditlog_core::{RecordError, SheetRow};
use std::borrow::Cow;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExportError {
    #[error("export is empty (no header row)")]
    MissingHeader,
    #[error("unexpected header: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: RecordError,
    },
}

/// Serialise records to CSV. Pure and infallible.
pub fn to_csv<R: SheetRow>(records: &[R]) -> String {
    let mut out = String::new();
    push_line(&mut out, R::HEADER.iter().copied());
    for record in records {
        let cells: Vec<String> = record.cells().iter().map(|c| c.to_string()).collect();
        push_line(&mut out, cells.iter().map(String::as_str));
    }
    out
}

/// Parse CSV produced by [`to_csv`] (or edited by hand in a spreadsheet tool).
pub fn parse_csv<R: SheetRow>(text: &str) -> Result<Vec<R>, ExportError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = split_rows(text)?.into_iter();
    let (_, header) = rows.next().ok_or(ExportError::MissingHeader)?;
    let header_ok = header.len() == R::HEADER.len()
        && header.iter().zip(R::HEADER).all(|(a, b)| a.trim() == *b);
    if !header_ok {
        return Err(ExportError::HeaderMismatch {
            expected: R::HEADER.iter().map(|h| h.to_string()).collect(),
            found: header,
        });
    }
    rows.map(|(line, fields)| {
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        R::from_fields(&refs).map_err(|source| ExportError::Record { line, source })
    })
    .collect()
}

fn push_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(field));
    }
    out.push('\n');
}

fn escape(field: &str) -> Cow<'_, str> {
    let needs_quotes = field.contains([',', '"', '\n', '\r'])
        || field.starts_with(' ')
        || field.ends_with(' ');
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Split CSV text into rows of fields, tagged with the 1-based line each row starts on.
/// Blank lines are skipped.
fn split_rows(text: &str) -> Result<Vec<(usize, Vec<String>)>, ExportError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut touched = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                touched = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                touched = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if touched {
                    row.push(std::mem::take(&mut field));
                    rows.push((row_line, std::mem::take(&mut row)));
                }
                touched = false;
                line += 1;
                row_line = line;
            }
            _ => {
                field.push(c);
                touched = true;
            }
        }
    }
    if in_quotes {
        return Err(ExportError::UnterminatedQuote { line: row_line });
    }
    if touched {
        row.push(field);
        rows.push((row_line, row));
    }
    Ok(rows)
}
