//! Job kinds, lifecycle states and the per-kind job record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ResultPayload;

/// Category of a long-running server operation.
///
/// The kind decides the timing policy (see [`crate::job::descriptor`]) and the
/// shape of the terminal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "extraction")]
    Extraction,
    #[serde(rename = "conversion")]
    Conversion,
    #[serde(rename = "compression")]
    Compression,
    #[serde(rename = "youtube_download")]
    YouTubeDownload,
    #[serde(rename = "youtube_playlist")]
    YouTubePlaylist,
    #[serde(rename = "livestream_recording")]
    LivestreamRecording,
    #[serde(rename = "archive_download")]
    ArchiveDownload,
    #[serde(rename = "recording_status_watch")]
    RecordingStatusWatch,
}

impl JobKind {
    /// Every kind, in display order.
    pub const ALL: [JobKind; 8] = [
        JobKind::Extraction,
        JobKind::Conversion,
        JobKind::Compression,
        JobKind::YouTubeDownload,
        JobKind::YouTubePlaylist,
        JobKind::LivestreamRecording,
        JobKind::ArchiveDownload,
        JobKind::RecordingStatusWatch,
    ];

    /// Returns the string representation used in API paths and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extraction => "extraction",
            JobKind::Conversion => "conversion",
            JobKind::Compression => "compression",
            JobKind::YouTubeDownload => "youtube_download",
            JobKind::YouTubePlaylist => "youtube_playlist",
            JobKind::LivestreamRecording => "livestream_recording",
            JobKind::ArchiveDownload => "archive_download",
            JobKind::RecordingStatusWatch => "recording_status_watch",
        }
    }

    /// Whether the Presentation Layer may submit this kind directly.
    ///
    /// The recording watch is only ever started alongside a recording.
    pub fn is_submittable(&self) -> bool {
        !matches!(self, JobKind::RecordingStatusWatch)
    }

    /// Whether the job is fed a client-uploaded file rather than a URL.
    pub fn takes_upload(&self) -> bool {
        matches!(self, JobKind::Conversion | JobKind::Compression)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown job kind: {}", s))
    }
}

/// Client-side lifecycle of a job.
///
/// `Idle -> Submitting -> Polling -> Completed | Failed | TimedOut`, plus the
/// direct `Submitting -> Failed` edge for rejected submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Submitting => "submitting",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        }
    }

    /// Completed, Failed and TimedOut accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }

    /// Submitting or Polling.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Submitting | JobState::Polling)
    }

    fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Idle, JobState::Submitting)
                | (JobState::Submitting, JobState::Polling)
                | (JobState::Submitting, JobState::Failed)
                | (JobState::Polling, JobState::Completed)
                | (JobState::Polling, JobState::Failed)
                | (JobState::Polling, JobState::TimedOut)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service rejected the submission or could not be reached.
    Submission,
    /// A status fetch failed mid-poll.
    Transport,
    /// The service reported the job as failed.
    ServerReported,
    /// The local watch budget ran out.
    Timeout,
}

/// Rejected state-machine edge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind} transition: {from} -> {to}")]
pub struct TransitionError {
    pub kind: JobKind,
    pub from: JobState,
    pub to: JobState,
}

/// One tracked long-running server operation and its client-side state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Identifier assigned by the Job Service; absent until submission succeeds.
    pub id: Option<String>,
    pub kind: JobKind,
    pub state: JobState,
    /// Last progress reported by the service, rendered as received.
    pub progress_percent: i32,
    pub status_message: String,
    pub result: Option<ResultPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh record for a kind with nothing in flight.
    pub fn idle(kind: JobKind) -> Self {
        Self {
            id: None,
            kind,
            state: JobState::Idle,
            progress_percent: 0,
            status_message: String::new(),
            result: None,
            failure: None,
            submitted_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: JobState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                kind: self.kind,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Idle -> Submitting.
    pub fn begin_submission(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobState::Submitting)?;
        self.status_message = message.into();
        self.progress_percent = 0;
        self.submitted_at = Some(Utc::now());
        Ok(())
    }

    /// Submitting -> Polling, recording the service-assigned identifier.
    pub fn start_polling(&mut self, id: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobState::Polling)?;
        self.id = Some(id.into());
        Ok(())
    }

    /// Applies a progress update. Returns `false` (and changes nothing) unless
    /// the job is Polling.
    pub fn apply_progress(&mut self, percent: i32, message: impl Into<String>) -> bool {
        if self.state != JobState::Polling {
            return false;
        }
        self.progress_percent = percent;
        self.status_message = message.into();
        true
    }

    /// Polling -> Completed.
    pub fn complete(
        &mut self,
        result: Option<ResultPayload>,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.transition(JobState::Completed)?;
        self.result = result;
        self.status_message = message.into();
        Ok(())
    }

    /// Submitting|Polling -> Failed.
    pub fn fail(
        &mut self,
        failure: FailureKind,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.transition(JobState::Failed)?;
        self.failure = Some(failure);
        self.status_message = message.into();
        Ok(())
    }

    /// Polling -> TimedOut.
    pub fn time_out(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobState::TimedOut)?;
        self.failure = Some(FailureKind::Timeout);
        self.status_message = message.into();
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True when `id` names this job and it is still being watched.
    pub fn is_polling(&self, id: &str) -> bool {
        self.state == JobState::Polling && self.id.as_deref() == Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polling_job(kind: JobKind) -> Job {
        let mut job = Job::idle(kind);
        job.begin_submission("Starting...").unwrap();
        job.start_polling("task-1").unwrap();
        job
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("podcast".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&JobKind::YouTubeDownload).unwrap(),
            "\"youtube_download\""
        );
        let kind: JobKind = serde_json::from_str("\"recording_status_watch\"").unwrap();
        assert_eq!(kind, JobKind::RecordingStatusWatch);
    }

    #[test]
    fn test_watch_is_not_submittable() {
        assert!(!JobKind::RecordingStatusWatch.is_submittable());
        assert!(JobKind::LivestreamRecording.is_submittable());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = polling_job(JobKind::Extraction);
        assert_eq!(job.state, JobState::Polling);
        assert_eq!(job.id.as_deref(), Some("task-1"));
        assert!(job.submitted_at.is_some());

        job.complete(None, "done").unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_submission_failure_skips_polling() {
        let mut job = Job::idle(JobKind::Conversion);
        job.begin_submission("Uploading video...").unwrap();
        job.fail(FailureKind::Submission, "Upload failed").unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failure, Some(FailureKind::Submission));
        assert!(job.id.is_none());
    }

    #[test]
    fn test_no_skipping_polling_to_complete() {
        let mut job = Job::idle(JobKind::Conversion);
        job.begin_submission("Uploading video...").unwrap();
        let err = job.complete(None, "done").unwrap_err();
        assert_eq!(err.from, JobState::Submitting);
        assert_eq!(err.to, JobState::Completed);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let mut job = polling_job(JobKind::Compression);
        job.time_out("Compression timeout").unwrap();

        assert!(job.complete(None, "late").is_err());
        assert!(job.fail(FailureKind::ServerReported, "late").is_err());
        assert!(!job.apply_progress(99, "late"));
        assert_eq!(job.status_message, "Compression timeout");
        assert_eq!(job.failure, Some(FailureKind::Timeout));
    }

    #[test]
    fn test_progress_is_not_clamped() {
        let mut job = polling_job(JobKind::YouTubeDownload);
        assert!(job.apply_progress(60, "Downloading"));
        assert!(job.apply_progress(20, "Retrying"));
        assert_eq!(job.progress_percent, 20);
        assert!(job.apply_progress(140, "Odd"));
        assert_eq!(job.progress_percent, 140);
    }

    #[test]
    fn test_is_polling_checks_identity() {
        let job = polling_job(JobKind::ArchiveDownload);
        assert!(job.is_polling("task-1"));
        assert!(!job.is_polling("task-2"));
    }

    #[test]
    fn test_error_display() {
        let err = TransitionError {
            kind: JobKind::Extraction,
            from: JobState::Idle,
            to: JobState::Completed,
        };
        assert_eq!(
            err.to_string(),
            "invalid extraction transition: idle -> completed"
        );
    }
}
