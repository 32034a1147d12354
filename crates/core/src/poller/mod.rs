//! Poll Loop Engine.
//!
//! One generic loop drives every job kind from Polling to a terminal state.
//! Timing comes from the kind's [`JobDescriptor`](crate::job::JobDescriptor);
//! status comes from a [`StatusProbe`]; progress is pushed to a
//! [`PollObserver`].

mod engine;

pub use engine::{PollLoop, PollOutcome};

use std::sync::Arc;

use async_trait::async_trait;

use crate::job::JobKind;
use crate::service::{JobService, JobServiceError, StatusResponse};

/// A status-fetch operation for one family of jobs.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<StatusResponse, JobServiceError>;
}

/// Receives every successfully fetched status, terminal ones included.
#[async_trait]
pub trait PollObserver: Send + Sync {
    /// Returns `false` when the job is no longer the one being watched; the
    /// loop then stops without reaching a terminal outcome.
    async fn on_status(&self, status: &StatusResponse) -> bool;
}

/// Probes the generic task progress endpoint.
pub struct TaskProbe {
    service: Arc<dyn JobService>,
}

#[async_trait]
impl StatusProbe for TaskProbe {
    async fn fetch(&self, job_id: &str) -> Result<StatusResponse, JobServiceError> {
        self.service.get_status(job_id).await
    }
}

/// Probes the livestream recording status endpoint.
pub struct RecordingProbe {
    service: Arc<dyn JobService>,
}

#[async_trait]
impl StatusProbe for RecordingProbe {
    async fn fetch(&self, job_id: &str) -> Result<StatusResponse, JobServiceError> {
        Ok(self
            .service
            .get_recording_status(job_id)
            .await?
            .into_status_response())
    }
}

/// Picks the status endpoint a kind is watched through.
pub fn probe_for(kind: JobKind, service: Arc<dyn JobService>) -> Box<dyn StatusProbe> {
    match kind {
        JobKind::LivestreamRecording | JobKind::RecordingStatusWatch => {
            Box::new(RecordingProbe { service })
        }
        _ => Box::new(TaskProbe { service }),
    }
}
