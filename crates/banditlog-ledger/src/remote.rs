use banditlog_core::Cell;

/// Failure reported by a remote tabular store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Rate limiting, timeouts, dropped connections. Worth retrying.
    #[error("transient remote error: {0}")]
    Transient(String),
    /// Missing credentials, missing worksheet permissions, malformed target. Never retried.
    #[error("remote store rejected the request: {0}")]
    Structural(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            RemoteError::Transient(d) | RemoteError::Structural(d) => d,
        }
    }
}

/// An append-only spreadsheet addressed by worksheet name.
pub trait RemoteSheet {
    /// Look up `worksheet`, creating it with `header` as its first row when missing.
    fn ensure_worksheet(&mut self, worksheet: &str, header: &[&str]) -> Result<(), RemoteError>;

    /// Append `rows` to `worksheet` as one atomic batch. Row order is preserved.
    fn append_rows(&mut self, worksheet: &str, rows: &[Vec<Cell>]) -> Result<(), RemoteError>;
}

impl<T: RemoteSheet + ?Sized> RemoteSheet for &mut T {
    fn ensure_worksheet(&mut self, worksheet: &str, header: &[&str]) -> Result<(), RemoteError> {
        (**self).ensure_worksheet(worksheet, header)
    }

    fn append_rows(&mut self, worksheet: &str, rows: &[Vec<Cell>]) -> Result<(), RemoteError> {
        (**self).append_rows(worksheet, rows)
    }
}

impl<T: RemoteSheet + ?Sized> RemoteSheet for Box<T> {
    fn ensure_worksheet(&mut self, worksheet: &str, header: &[&str]) -> Result<(), RemoteError> {
        (**self).ensure_worksheet(worksheet, header)
    }

    fn append_rows(&mut self, worksheet: &str, rows: &[Vec<Cell>]) -> Result<(), RemoteError> {
        (**self).append_rows(worksheet, rows)
    }
}
