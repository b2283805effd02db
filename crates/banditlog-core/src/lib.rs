pub mod reward;
pub mod session;
pub mod switches;
pub mod types;

pub use session::{SessionContext, SessionRecorder};
pub use types::*;
