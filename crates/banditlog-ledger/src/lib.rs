pub mod append_log;
pub mod config;
pub mod export;
pub mod lock;
pub mod paths;
pub mod remote;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use append_log::{AppendLog, FlushError, FlushOutcome, LogSettings, SummaryOutcome};
pub use config::{ConfigError, ExperimentConfig};
pub use lock::WorkspaceLock;
pub use paths::BanditPaths;
pub use remote::{RemoteError, RemoteSheet};
pub use retry::{Clock, RetryError, RetryPolicy, SystemClock};
