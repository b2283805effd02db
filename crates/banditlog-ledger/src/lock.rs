use crate::paths::BanditPaths;
use banditlog_store::LockGuard;

/// Exclusive workspace lock backed by `.banditlog/LOCK`.
/// Keeps one writer per workspace; released when dropped.
pub struct WorkspaceLock {
    _guard: LockGuard,
}

impl WorkspaceLock {
    /// Try to acquire the workspace lock (non-blocking).
    pub fn acquire(paths: &BanditPaths) -> anyhow::Result<Self> {
        let guard = banditlog_store::try_lock_file(&paths.lock_file).map_err(|_| {
            anyhow::anyhow!(
                "workspace is locked by another session ({})",
                paths.lock_file.display()
            )
        })?;
        Ok(Self { _guard: guard })
    }
}
