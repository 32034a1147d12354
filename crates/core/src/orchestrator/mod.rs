//! Job orchestrator.
//!
//! The orchestrator owns one job record per kind and exposes a narrow
//! read/intent interface:
//! - **Read**: the current job of each kind, plus a broadcast feed of changes
//! - **Intents**: submit, reset, and stop for recordings
//! - **Selection**: playlist manifest and the items chosen for batch download

mod runner;
mod types;

pub use runner::JobOrchestrator;
pub use types::OrchestratorError;
