//! Job kinds, the descriptor registry and the per-job state machine.

pub mod descriptor;
mod types;

pub use descriptor::{descriptor, JobDescriptor, TerminalStatuses};
pub use types::{FailureKind, Job, JobKind, JobState, TransitionError};
