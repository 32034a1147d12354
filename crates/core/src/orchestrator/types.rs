//! Types for the job orchestrator.

use thiserror::Error;

use crate::job::{JobKind, JobState};
use crate::service::JobServiceError;

/// Errors returned by orchestrator intents.
///
/// Failures that happen while a job is being polled are not errors here; they
/// are recorded on the job itself.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Blank input or empty selection; nothing was sent to the service.
    #[error("{0}")]
    Validation(String),

    /// The service rejected the submission or could not be reached.
    #[error("{0}")]
    Submission(JobServiceError),

    /// A job of this kind is already submitting or polling.
    #[error("a {0} job is already in progress")]
    JobInProgress(JobKind),

    /// Invalid job state for the operation.
    #[error("invalid {kind} state: expected {expected}, got {actual}")]
    InvalidState {
        kind: JobKind,
        expected: String,
        actual: JobState,
    },

    /// No job of this kind is running.
    #[error("no active {0} job")]
    NoActiveJob(JobKind),

    /// A one-shot service call failed.
    #[error("job service error: {0}")]
    Service(#[from] JobServiceError),
}
