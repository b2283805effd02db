use std::path::{Path, PathBuf};

/// All well-known paths under `.banditlog/`.
#[derive(Debug, Clone)]
pub struct BanditPaths {
    pub root: PathBuf,
    pub dir: PathBuf,
    pub config_json: PathBuf,
    pub state_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl BanditPaths {
    /// Derive all paths from a workspace root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let dir = root.join(".banditlog");
        Self {
            config_json: dir.join("config.json"),
            state_dir: dir.join("state"),
            exports_dir: dir.join("exports"),
            lock_file: dir.join("LOCK"),
            dir,
            root,
        }
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [&self.dir, &self.state_dir, &self.exports_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.dir.is_dir()
    }

    /// Marker written once a participant's summary row is confirmed remotely.
    pub fn summary_marker(&self, participant_id: &str) -> PathBuf {
        self.state_dir
            .join(format!("{}.summary-saved", file_stem(participant_id)))
    }

    /// Fallback CSV of unflushed per-round rows.
    pub fn log_export(&self, participant_id: &str) -> PathBuf {
        self.exports_dir
            .join(format!("{}-log.csv", file_stem(participant_id)))
    }

    /// Fallback CSV of an unsaved summary row.
    pub fn summary_export(&self, participant_id: &str) -> PathBuf {
        self.exports_dir
            .join(format!("{}-summary.csv", file_stem(participant_id)))
    }

    /// `path` when nothing exists there yet, else the first free `<stem>-<n>.<ext>` beside it.
    /// Earlier unsent exports are never overwritten.
    pub fn first_free(path: PathBuf) -> PathBuf {
        if !path.exists() {
            return path;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut n = 2u32;
        loop {
            let candidate = path.with_file_name(format!("{stem}-{n}{ext}"));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Walk up from `start` looking for a directory containing `.banditlog/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".banditlog").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}

/// Participant ids are opaque; keep only filename-safe characters.
fn file_stem(participant_id: &str) -> String {
    let stem: String = participant_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "anonymous".to_string()
    } else {
        stem
    }
}
