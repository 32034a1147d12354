//! Mock Job Service for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::job::JobKind;
use crate::selection::PlaylistManifest;
use crate::service::{
    HistoryItem, InstagramMedia, JobService, JobServiceError, LivestreamStatus, MediaFormat,
    RecordingStatus, ResourceStream, StatusResponse, StoppedRecording, Submission, SubmitRequest,
};

/// Size of the chunks a scripted resource is streamed in.
const RESOURCE_CHUNK: usize = 4;

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    /// The request that was made.
    pub request: SubmitRequest,
    /// Identifier handed back, if the submission succeeded.
    pub job_id: Option<String>,
    /// When the request was made.
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Step<T> {
    Respond(T),
    Disconnect,
}

/// Scripted answers for one job; the last response repeats once the script
/// runs dry.
#[derive(Debug)]
struct Script<T> {
    steps: VecDeque<Step<T>>,
    last: Option<T>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: VecDeque::new(),
            last: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn next(&mut self, job_id: &str) -> Result<T, JobServiceError> {
        match self.steps.pop_front() {
            Some(Step::Respond(value)) => {
                self.last = Some(value.clone());
                Ok(value)
            }
            Some(Step::Disconnect) => Err(JobServiceError::ConnectionFailed(format!(
                "mock connection dropped while fetching {}",
                job_id
            ))),
            None => self.last.clone().ok_or_else(|| not_found(job_id)),
        }
    }
}

fn not_found(job_id: &str) -> JobServiceError {
    JobServiceError::Rejected {
        status: 404,
        detail: format!("Task {} not found", job_id),
    }
}

/// Mock implementation of the JobService trait.
///
/// Provides controllable behavior for testing:
/// - Record submissions for assertions
/// - Script status sequences per job id
/// - Simulate failures
///
/// Identifiers are handed out in order: `task-1`, `task-2`, ... for tasks and
/// `rec-1`, `rec-2`, ... for recordings, so tests can script statuses before
/// submitting.
///
/// # Example
///
/// ```rust,ignore
/// let service = MockJobService::new();
/// service.push_status("task-1", StatusResponse::new("downloading", 40, "Downloading")).await;
/// service.push_status("task-1", StatusResponse::new("completed", 100, "Done")).await;
///
/// // Submit through the orchestrator...
///
/// let submitted = service.submissions().await;
/// assert_eq!(submitted.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockJobService {
    /// Recorded submit calls.
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    /// Scripted task statuses by job id.
    statuses: Arc<RwLock<HashMap<String, Script<StatusResponse>>>>,
    /// Scripted recording statuses by recording id.
    recordings: Arc<RwLock<HashMap<String, Script<RecordingStatus>>>>,
    /// Status fetches issued, by job id.
    fetch_counts: Arc<RwLock<HashMap<String, usize>>>,
    /// Recording ids that were stopped.
    stopped: Arc<RwLock<Vec<String>>>,
    playlists: Arc<RwLock<HashMap<String, PlaylistManifest>>>,
    livestreams: Arc<RwLock<HashMap<String, LivestreamStatus>>>,
    instagram: Arc<RwLock<HashMap<String, InstagramMedia>>>,
    resources: Arc<RwLock<HashMap<(String, usize), Vec<u8>>>>,
    history: Arc<RwLock<Vec<HistoryItem>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<JobServiceError>>>,
    /// If set, submissions succeed without an identifier.
    omit_job_id: Arc<RwLock<bool>>,
    /// Counter for generating identifiers.
    id_counter: Arc<RwLock<u32>>,
}

impl Default for MockJobService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobService {
    /// Create a new mock service.
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            recordings: Arc::new(RwLock::new(HashMap::new())),
            fetch_counts: Arc::new(RwLock::new(HashMap::new())),
            stopped: Arc::new(RwLock::new(Vec::new())),
            playlists: Arc::new(RwLock::new(HashMap::new())),
            livestreams: Arc::new(RwLock::new(HashMap::new())),
            instagram: Arc::new(RwLock::new(HashMap::new())),
            resources: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            omit_job_id: Arc::new(RwLock::new(false)),
            id_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded submissions.
    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    /// Append a status to a job's script.
    pub async fn push_status(&self, job_id: &str, status: StatusResponse) {
        self.statuses
            .write()
            .await
            .entry(job_id.to_string())
            .or_default()
            .steps
            .push_back(Step::Respond(status));
    }

    /// Append a transport failure to a job's script.
    pub async fn push_disconnect(&self, job_id: &str) {
        self.statuses
            .write()
            .await
            .entry(job_id.to_string())
            .or_default()
            .steps
            .push_back(Step::Disconnect);
    }

    /// Append a recording status to a recording's script.
    pub async fn push_recording_status(&self, recording_id: &str, status: &str, details: Value) {
        let details = match details {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.recordings
            .write()
            .await
            .entry(recording_id.to_string())
            .or_default()
            .steps
            .push_back(Step::Respond(RecordingStatus {
                status: status.to_string(),
                details,
            }));
    }

    /// Number of status fetches issued for a job.
    pub async fn fetch_count(&self, job_id: &str) -> usize {
        self.fetch_counts
            .read()
            .await
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    /// Recording ids passed to `stop_recording`.
    pub async fn stopped_recordings(&self) -> Vec<String> {
        self.stopped.read().await.clone()
    }

    pub async fn set_playlist(&self, url: &str, manifest: PlaylistManifest) {
        self.playlists
            .write()
            .await
            .insert(url.to_string(), manifest);
    }

    pub async fn set_livestream(&self, url: &str, status: LivestreamStatus) {
        self.livestreams
            .write()
            .await
            .insert(url.to_string(), status);
    }

    pub async fn set_instagram(&self, url: &str, media: InstagramMedia) {
        self.instagram.write().await.insert(url.to_string(), media);
    }

    pub async fn set_resource(&self, job_id: &str, index: usize, bytes: Vec<u8>) {
        self.resources
            .write()
            .await
            .insert((job_id.to_string(), index), bytes);
    }

    pub async fn set_history(&self, items: Vec<HistoryItem>) {
        *self.history.write().await = items;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: JobServiceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Make submissions come back without an identifier.
    pub async fn set_omit_job_id(&self, omit: bool) {
        *self.omit_job_id.write().await = omit;
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<JobServiceError> {
        self.next_error.write().await.take()
    }

    async fn generate_id(&self, kind: JobKind) -> String {
        let mut counter = self.id_counter.write().await;
        *counter += 1;
        match kind {
            JobKind::LivestreamRecording => format!("rec-{}", *counter),
            _ => format!("task-{}", *counter),
        }
    }

    async fn count_fetch(&self, job_id: &str) {
        *self
            .fetch_counts
            .write()
            .await
            .entry(job_id.to_string())
            .or_default() += 1;
    }
}

#[async_trait]
impl JobService for MockJobService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, JobServiceError> {
        if let Some(err) = self.take_error().await {
            self.submissions.write().await.push(RecordedSubmission {
                request: request.clone(),
                job_id: None,
                timestamp: Utc::now(),
            });
            return Err(err);
        }

        if request.kind == JobKind::RecordingStatusWatch {
            return Err(JobServiceError::Unsupported(
                "recording watches are not submitted".to_string(),
            ));
        }
        if request.kind.takes_upload() && request.params.upload.is_none() {
            return Err(JobServiceError::Unsupported(format!(
                "{} needs an uploaded file",
                request.kind
            )));
        }

        let job_id = if *self.omit_job_id.read().await {
            None
        } else {
            Some(self.generate_id(request.kind).await)
        };

        self.submissions.write().await.push(RecordedSubmission {
            request: request.clone(),
            job_id: job_id.clone(),
            timestamp: Utc::now(),
        });

        match job_id {
            Some(job_id) => Ok(Submission {
                job_id,
                message: Some(format!("{} started", request.kind)),
            }),
            None => Err(JobServiceError::MissingJobId(request.kind)),
        }
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusResponse, JobServiceError> {
        self.count_fetch(job_id).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        match self.statuses.write().await.get_mut(job_id) {
            Some(script) => script.next(job_id),
            None => Err(not_found(job_id)),
        }
    }

    async fn get_recording_status(
        &self,
        recording_id: &str,
    ) -> Result<RecordingStatus, JobServiceError> {
        self.count_fetch(recording_id).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        match self.recordings.write().await.get_mut(recording_id) {
            Some(script) => script.next(recording_id),
            None => Err(JobServiceError::Rejected {
                status: 404,
                detail: "Recording not found".to_string(),
            }),
        }
    }

    async fn stop_recording(
        &self,
        recording_id: &str,
    ) -> Result<StoppedRecording, JobServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.stopped.write().await.push(recording_id.to_string());
        Ok(StoppedRecording {
            filename: format!("{}.mp4", recording_id),
            file_size_mb: 12.5,
            download_url: format!("/api/live/download/{}.mp4", recording_id),
        })
    }

    async fn playlist_info(&self, url: &str) -> Result<PlaylistManifest, JobServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.playlists
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| JobServiceError::Rejected {
                status: 400,
                detail: "Could not fetch playlist".to_string(),
            })
    }

    async fn livestream_status(&self, url: &str) -> Result<LivestreamStatus, JobServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self
            .livestreams
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or_else(|| LivestreamStatus {
                status: "not_live".to_string(),
                details: Map::new(),
            }))
    }

    async fn instagram(
        &self,
        url: &str,
        format: MediaFormat,
    ) -> Result<InstagramMedia, JobServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut media = self
            .instagram
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| JobServiceError::Rejected {
                status: 404,
                detail: "Could not extract video URL".to_string(),
            })?;
        media.format = format;
        Ok(media)
    }

    async fn fetch_resource(
        &self,
        job_id: &str,
        index: Option<usize>,
    ) -> Result<ResourceStream, JobServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let bytes = self
            .resources
            .read()
            .await
            .get(&(job_id.to_string(), index.unwrap_or(0)))
            .cloned()
            .ok_or_else(|| not_found(job_id))?;
        let chunks: Vec<Result<Bytes, JobServiceError>> = bytes
            .chunks(RESOURCE_CHUNK)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }

    async fn history(&self) -> Result<Vec<HistoryItem>, JobServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self.history.read().await.clone())
    }
}
