use std::time::Duration;

use banditlog_core::Cell;
use banditlog_ledger::{ExperimentConfig, RemoteError, RemoteSheet};
use serde::Deserialize;
use url::Url;

// ── Config ──

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const TIMEOUT: Duration = Duration::from_secs(10);

/// Google Sheets v4 REST client. One instance per spreadsheet.
///
/// Missing credentials are not rejected up front: every call reports them as a
/// structural [`RemoteError`], so they surface through the append log like any
/// other unrecoverable store failure.
pub struct SheetsClient {
    agent: ureq::Agent,
    base_url: String,
    spreadsheet_id: Option<String>,
    access_token: Option<String>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: Option<String>, access_token: Option<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .new_agent();
        Self {
            agent,
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id,
            access_token,
        }
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(config.sheet_id.clone(), config.access_token.clone())
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn target(&self) -> Result<(&str, String), RemoteError> {
        let id = self
            .spreadsheet_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RemoteError::Structural("no spreadsheet id configured".into()))?;
        let token = self
            .access_token
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RemoteError::Structural("no access token configured".into()))?;
        Ok((id, format!("Bearer {token}")))
    }

    /// API root plus `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let bad = |detail: String| {
            RemoteError::Structural(format!("bad url {}: {detail}", self.base_url))
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| bad(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| bad("cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Requests ──

    fn worksheet_titles(&self) -> Result<Vec<String>, RemoteError> {
        let (id, auth) = self.target()?;
        let url = self.endpoint(&[id])?;
        tracing::debug!(%url, "listing worksheets");
        let mut response = self
            .agent
            .get(url.as_str())
            .query("fields", "sheets.properties.title")
            .header("Authorization", &auth)
            .call()
            .map_err(classify)?;
        let body = response.body_mut().read_to_string().map_err(classify)?;
        parse_titles(&body)
    }

    fn add_worksheet(&self, title: &str) -> Result<(), RemoteError> {
        let (id, auth) = self.target()?;
        let url = self.endpoint(&[&format!("{id}:batchUpdate")])?;
        let body = serde_json::json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        tracing::debug!(%url, title, "creating worksheet");
        self.agent
            .post(url.as_str())
            .header("Authorization", &auth)
            .header("Content-Type", "application/json")
            .send(body.to_string())
            .map_err(classify)?;
        Ok(())
    }

    /// Create `title`. `Ok(false)` when another writer created it first.
    fn create_worksheet(&self, title: &str) -> Result<bool, RemoteError> {
        match self.add_worksheet(title) {
            Ok(()) => Ok(true),
            Err(err)
                if !err.is_transient() && self.worksheet_titles()?.iter().any(|t| t == title) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Whether row 1 of `worksheet` holds any value.
    fn has_header_row(&self, worksheet: &str) -> Result<bool, RemoteError> {
        let (id, auth) = self.target()?;
        let url = self.endpoint(&[id, "values", &a1_range(worksheet, "1:1")])?;
        tracing::debug!(%url, "reading header row");
        let mut response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &auth)
            .call()
            .map_err(classify)?;
        let body = response.body_mut().read_to_string().map_err(classify)?;
        let range: ValueRange = serde_json::from_str(&body)
            .map_err(|e| RemoteError::Transient(format!("unreadable header row: {e}")))?;
        Ok(range.values.first().is_some_and(|row| !row.is_empty()))
    }

    fn append(&self, worksheet: &str, rows: serde_json::Value) -> Result<(), RemoteError> {
        let (id, auth) = self.target()?;
        let range = format!("{}:append", a1_range(worksheet, "A1"));
        let url = self.endpoint(&[id, "values", &range])?;
        let body = serde_json::json!({ "majorDimension": "ROWS", "values": rows });
        tracing::debug!(%url, "appending rows");
        self.agent
            .post(url.as_str())
            .query("valueInputOption", "RAW")
            .query("insertDataOption", "INSERT_ROWS")
            .header("Authorization", &auth)
            .header("Content-Type", "application/json")
            .send(body.to_string())
            .map_err(classify)?;
        Ok(())
    }
}

impl RemoteSheet for SheetsClient {
    /// Creating a worksheet and writing its header are two requests. A sheet
    /// left without a header by an earlier failed attempt gets it here.
    fn ensure_worksheet(&mut self, worksheet: &str, header: &[&str]) -> Result<(), RemoteError> {
        let listed = self.worksheet_titles()?.iter().any(|t| t == worksheet);
        let created = !listed && self.create_worksheet(worksheet)?;
        if !created && self.has_header_row(worksheet)? {
            return Ok(());
        }
        tracing::debug!(worksheet, "writing header row");
        self.append(worksheet, serde_json::json!([header]))
    }

    fn append_rows(&mut self, worksheet: &str, rows: &[Vec<Cell>]) -> Result<(), RemoteError> {
        let values = serde_json::to_value(rows)
            .map_err(|e| RemoteError::Structural(format!("cannot encode rows: {e}")))?;
        self.append(worksheet, values)
    }
}

// ── Error classification ──

fn classify(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::StatusCode(code) => classify_status(code),
        ureq::Error::BadUri(detail) => RemoteError::Structural(format!("bad url: {detail}")),
        other => RemoteError::Transient(other.to_string()),
    }
}

/// Map an HTTP error status onto the transient/structural split.
pub fn classify_status(code: u16) -> RemoteError {
    match code {
        408 => RemoteError::Transient("HTTP 408 request timeout".into()),
        429 => RemoteError::Transient("HTTP 429 rate limited".into()),
        500..=599 => RemoteError::Transient(format!("HTTP {code} server error")),
        401 => RemoteError::Structural("HTTP 401 missing or expired credentials".into()),
        403 => RemoteError::Structural("HTTP 403 permission denied".into()),
        404 => RemoteError::Structural("HTTP 404 spreadsheet not found".into()),
        _ => RemoteError::Structural(format!("HTTP {code}")),
    }
}

// ── Wire helpers ──

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

/// A `values.get` response. `values` is omitted when the range is empty.
#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn parse_titles(body: &str) -> Result<Vec<String>, RemoteError> {
    let meta: SpreadsheetMeta = serde_json::from_str(body)
        .map_err(|e| RemoteError::Transient(format!("unreadable spreadsheet metadata: {e}")))?;
    Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
}

/// A1 notation scoped to `worksheet`, e.g. `'logs'!A1`.
fn a1_range(worksheet: &str, cells: &str) -> String {
    format!("'{}'!{cells}", worksheet.replace('\'', "''"))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    struct Recorded {
        request_line: String,
        authorization: Option<String>,
        body: String,
    }

    /// Serve one canned `(status, body)` response per connection, in order.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Recorded>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/v4/spreadsheets", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut content_length = 0usize;
                let mut authorization = None;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        let name = name.trim().to_ascii_lowercase();
                        if name == "content-length" {
                            content_length = value.trim().parse().unwrap();
                        } else if name == "authorization" {
                            authorization = Some(value.trim().to_string());
                        }
                    }
                }
                let mut buf = vec![0u8; content_length];
                reader.read_exact(&mut buf).unwrap();
                seen.push(Recorded {
                    request_line: request_line.trim_end().to_string(),
                    authorization,
                    body: String::from_utf8(buf).unwrap(),
                });
                let mut stream = stream;
                write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
            seen
        });
        (base, handle)
    }

    fn client(base: &str) -> SheetsClient {
        SheetsClient::new(Some("sheet123".into()), Some("tok".into())).with_base_url(base)
    }

    #[test]
    fn status_classification() {
        for code in [408, 429, 500, 502, 503] {
            assert!(classify_status(code).is_transient(), "{code}");
        }
        for code in [400, 401, 403, 404, 409] {
            assert!(!classify_status(code).is_transient(), "{code}");
        }
        assert!(classify_status(403).detail().contains("permission"));
    }

    #[test]
    fn ranges_are_quoted_and_encoded() {
        let c = client("https://x/v4/spreadsheets/");
        let range = format!("{}:append", a1_range("Bob's logs", "A1"));
        let url = c.endpoint(&["id/1", "values", &range]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://x/v4/spreadsheets/id%2F1/values/'Bob''s%20logs'!A1:append"
        );
        assert_eq!(a1_range("logs", "1:1"), "'logs'!1:1");
    }

    #[test]
    fn unusable_base_url_is_structural() {
        let err = client("not a url").endpoint(&["id"]).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn titles_parse_and_tolerate_empty() {
        let titles =
            parse_titles(r#"{"sheets":[{"properties":{"title":"logs"}},{"properties":{"title":"x"}}]}"#)
                .unwrap();
        assert_eq!(titles, vec!["logs", "x"]);
        assert!(parse_titles("{}").unwrap().is_empty());
    }

    #[test]
    fn missing_credentials_are_structural_without_network() {
        let mut c = SheetsClient::new(Some("id".into()), None);
        let err = c.append_rows("logs", &[vec![Cell::Int(1)]]).unwrap_err();
        assert_eq!(err, RemoteError::Structural("no access token configured".into()));

        let mut c = SheetsClient::new(None, Some("tok".into()));
        let err = c.ensure_worksheet("logs", &["a"]).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn append_posts_rows_in_order() {
        let (base, server) = serve(vec![(200, "{}")]);
        let mut c = client(&base);
        c.append_rows(
            "logs",
            &[
                vec![Cell::Int(1), Cell::Text("A".into()), Cell::Float(0.5)],
                vec![Cell::Int(2), Cell::Text("B".into()), Cell::Float(0.25)],
            ],
        )
        .unwrap();
        let seen = server.join().unwrap();
        let line = &seen[0].request_line;
        assert!(line.starts_with("POST /v4/spreadsheets/sheet123/values/'logs'!A1:append?"));
        assert!(line.contains("valueInputOption=RAW"));
        assert!(line.contains("insertDataOption=INSERT_ROWS"));
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok"));
        let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body["values"], serde_json::json!([[1, "A", 0.5], [2, "B", 0.25]]));
    }

    #[test]
    fn existing_worksheet_with_header_is_left_alone() {
        let (base, server) = serve(vec![
            (200, r#"{"sheets":[{"properties":{"title":"logs"}}]}"#),
            (200, r#"{"range":"'logs'!A1:B1","values":[["a","b"]]}"#),
        ]);
        client(&base).ensure_worksheet("logs", &["a", "b"]).unwrap();
        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0]
            .request_line
            .starts_with("GET /v4/spreadsheets/sheet123?fields=sheets.properties.title"));
        assert!(seen[1]
            .request_line
            .starts_with("GET /v4/spreadsheets/sheet123/values/'logs'!1:1"));
    }

    #[test]
    fn header_is_written_after_an_interrupted_bootstrap() {
        let (base, server) = serve(vec![
            (200, r#"{"sheets":[{"properties":{"title":"Sheet1"}}]}"#),
            (200, "{}"),
            (503, ""),
            (200, r#"{"sheets":[{"properties":{"title":"logs"}}]}"#),
            (200, r#"{"range":"'logs'!A1:Z1","majorDimension":"ROWS"}"#),
            (200, "{}"),
        ]);
        let mut c = client(&base);
        let first = c.ensure_worksheet("logs", &["timestamp", "round"]).unwrap_err();
        assert!(first.is_transient());
        c.ensure_worksheet("logs", &["timestamp", "round"]).unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 6);
        assert!(seen[5].request_line.contains("A1:append"));
        let header: serde_json::Value = serde_json::from_str(&seen[5].body).unwrap();
        assert_eq!(header["values"], serde_json::json!([["timestamp", "round"]]));
    }

    #[test]
    fn missing_worksheet_is_created_with_header() {
        let (base, server) = serve(vec![
            (200, r#"{"sheets":[{"properties":{"title":"Sheet1"}}]}"#),
            (200, "{}"),
            (200, "{}"),
        ]);
        client(&base).ensure_worksheet("logs", &["timestamp", "round"]).unwrap();
        let seen = server.join().unwrap();
        assert!(seen[1].request_line.contains(":batchUpdate"));
        assert!(seen[1].body.contains(r#""title":"logs""#));
        let header: serde_json::Value = serde_json::from_str(&seen[2].body).unwrap();
        assert_eq!(header["values"], serde_json::json!([["timestamp", "round"]]));
    }

    #[test]
    fn http_errors_are_classified() {
        let (base, server) = serve(vec![(429, ""), (403, "")]);
        let mut c = client(&base);
        let first = c.append_rows("logs", &[vec![Cell::Int(1)]]).unwrap_err();
        let second = c.append_rows("logs", &[vec![Cell::Int(1)]]).unwrap_err();
        server.join().unwrap();
        assert!(first.is_transient());
        assert_eq!(second, classify_status(403));
    }

    #[test]
    fn unreachable_host_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut c = client(&format!("http://{addr}/v4/spreadsheets"));
        let err = c.append_rows("logs", &[vec![Cell::Int(1)]]).unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }
}
