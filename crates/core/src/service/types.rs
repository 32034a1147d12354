//! Types for talking to the Job Service.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::compression::CompressionQuality;
use crate::job::JobKind;
use crate::selection::PlaylistManifest;

/// Errors that can occur while calling the Job Service.
#[derive(Debug, Error)]
pub enum JobServiceError {
    /// The service answered with a non-success status.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A submission was accepted but no job identifier came back.
    #[error("Failed to start {0}")]
    MissingJobId(JobKind),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl JobServiceError {
    /// HTTP status reported by the service, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            JobServiceError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Video or audio-only output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    #[default]
    Video,
    Audio,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Video => "video",
            MediaFormat::Audio => "audio",
        }
    }
}

fn default_quality() -> String {
    "720p".to_string()
}

fn default_true() -> bool {
    true
}

/// A media file received from a client, forwarded to the service unchanged.
#[derive(Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// User-supplied parameters for a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    /// URL for remote media, or the uploaded file's name.
    pub subject: String,
    /// Video quality (360p, 480p, 720p, 1080p, best).
    #[serde(default = "default_quality")]
    pub quality: String,
    #[serde(default)]
    pub format: MediaFormat,
    #[serde(default)]
    pub compression: CompressionQuality,
    /// Convert HLS streams to MP4 during extraction.
    #[serde(default = "default_true")]
    pub convert_hls: bool,
    /// The subject is already a direct media link.
    #[serde(default)]
    pub direct_url: bool,
    /// File content for Conversion and Compression; never read from JSON.
    #[serde(skip)]
    pub upload: Option<Upload>,
}

impl JobParameters {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            quality: default_quality(),
            format: MediaFormat::default(),
            compression: CompressionQuality::default(),
            convert_hls: true,
            direct_url: false,
            upload: None,
        }
    }

    /// Parameters for an upload job; the file name becomes the subject.
    pub fn from_upload(upload: Upload) -> Self {
        let mut params = Self::new(upload.file_name.clone());
        params.upload = Some(upload);
        params
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_format(mut self, format: MediaFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, quality: CompressionQuality) -> Self {
        self.compression = quality;
        self
    }

    pub fn with_direct_url(mut self, direct: bool) -> Self {
        self.direct_url = direct;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.subject.trim().is_empty()
    }
}

/// A fully resolved submission, as sent to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub params: JobParameters,
    /// Selected playlist items, captured by value at submit time.
    pub video_ids: Vec<String>,
}

/// Service acknowledgement of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub job_id: String,
    pub message: Option<String>,
}

/// One status fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: i32,
    #[serde(default)]
    pub message: String,
    /// Every other field; the raw result payload.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>, progress: i32, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            progress,
            message: message.into(),
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }
}

/// Recording status as reported by the recording-status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStatus {
    pub status: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl RecordingStatus {
    /// Folds the recording status into the generic status shape so the poll
    /// loop can treat it like any other job.
    pub fn into_status_response(self) -> StatusResponse {
        let message = self
            .details
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Recording {}", self.status));
        let progress = self
            .details
            .get("progress")
            .and_then(number_value)
            .map(|p| p.round() as i32)
            .unwrap_or(0);
        StatusResponse {
            status: self.status,
            progress,
            message,
            payload: self.details,
        }
    }
}

/// File produced by stopping a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppedRecording {
    pub filename: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub file_size_mb: f64,
    pub download_url: String,
}

/// Live state of a stream URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivestreamStatus {
    /// `live_now`, `upcoming`, `ended_and_archived` or `not_live`.
    pub status: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Media link extracted from an Instagram reel or post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstagramMedia {
    pub video_url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default = "default_instagram_title")]
    pub title: String,
    /// Format the caller asked for; audio still comes back as a video link.
    #[serde(default, rename = "format_type")]
    pub format: MediaFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_note: Option<String>,
}

fn default_instagram_title() -> String {
    "Instagram Video".to_string()
}

/// Body of a completed job's output, chunk by chunk.
pub type ResourceStream = BoxStream<'static, Result<Bytes, JobServiceError>>;

/// One past completed job, as kept by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub url: String,
    #[serde(default)]
    pub media_url: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
}

/// Reads a JSON number, or a string holding one.
pub(crate) fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_value(&value).unwrap_or_default())
}

fn lenient_progress<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_value(&value).map(|p| p.round() as i32).unwrap_or_default())
}

/// Trait for Job Service backends.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Starts a job and returns its identifier.
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, JobServiceError>;

    /// Current status of a job. Idempotent.
    async fn get_status(&self, job_id: &str) -> Result<StatusResponse, JobServiceError>;

    /// Current status of a livestream recording.
    async fn get_recording_status(
        &self,
        recording_id: &str,
    ) -> Result<RecordingStatus, JobServiceError>;

    /// Stops a livestream recording and returns the produced file.
    async fn stop_recording(&self, recording_id: &str)
        -> Result<StoppedRecording, JobServiceError>;

    /// Lists the items of a playlist.
    async fn playlist_info(&self, url: &str) -> Result<PlaylistManifest, JobServiceError>;

    /// Checks whether a stream is live, upcoming or archived.
    async fn livestream_status(&self, url: &str) -> Result<LivestreamStatus, JobServiceError>;

    /// Extracts the media link of an Instagram reel or post.
    async fn instagram(
        &self,
        url: &str,
        format: MediaFormat,
    ) -> Result<InstagramMedia, JobServiceError>;

    /// Streams the bytes of a completed job's output.
    async fn fetch_resource(
        &self,
        job_id: &str,
        index: Option<usize>,
    ) -> Result<ResourceStream, JobServiceError>;

    /// Recently completed jobs.
    async fn history(&self) -> Result<Vec<HistoryItem>, JobServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_response_keeps_extra_fields() {
        let status: StatusResponse = serde_json::from_value(json!({
            "task_id": "t-1",
            "status": "completed",
            "progress": 100,
            "message": "Download completed!",
            "download_url": "/api/youtube/file/a.mp4",
            "title": "A video"
        }))
        .unwrap();

        assert_eq!(status.status, "completed");
        assert_eq!(status.progress, 100);
        assert_eq!(status.payload["download_url"], "/api/youtube/file/a.mp4");
        assert!(status.payload.contains_key("task_id"));
        assert!(!status.payload.contains_key("status"));
    }

    #[test]
    fn test_status_response_tolerates_missing_progress() {
        let status: StatusResponse =
            serde_json::from_value(json!({"status": "loading"})).unwrap();
        assert_eq!(status.progress, 0);
        assert_eq!(status.message, "");
    }

    #[test]
    fn test_progress_accepts_floats_and_strings() {
        let status: StatusResponse =
            serde_json::from_value(json!({"status": "downloading", "progress": 42.6})).unwrap();
        assert_eq!(status.progress, 43);
        let status: StatusResponse =
            serde_json::from_value(json!({"status": "downloading", "progress": "12"})).unwrap();
        assert_eq!(status.progress, 12);
    }

    #[test]
    fn test_stopped_recording_accepts_string_size() {
        let stopped: StoppedRecording = serde_json::from_value(json!({
            "filename": "live.mp4",
            "file_size_mb": "12.50",
            "download_url": "/api/live/download/live.mp4"
        }))
        .unwrap();
        assert_eq!(stopped.file_size_mb, 12.5);
    }

    #[test]
    fn test_recording_status_folding() {
        let status: RecordingStatus = serde_json::from_value(json!({
            "status": "recording",
            "found": true,
            "file_size_mb": 3.2
        }))
        .unwrap();
        let folded = status.into_status_response();
        assert_eq!(folded.status, "recording");
        assert_eq!(folded.message, "Recording recording");
        assert_eq!(folded.progress, 0);
        assert_eq!(folded.payload["file_size_mb"], 3.2);
    }

    #[test]
    fn test_parameters_defaults() {
        let params: JobParameters =
            serde_json::from_value(json!({"subject": "https://example.com/v"})).unwrap();
        assert_eq!(params.quality, "720p");
        assert_eq!(params.format, MediaFormat::Video);
        assert_eq!(params.compression, CompressionQuality::Medium);
        assert!(params.convert_hls);
        assert!(!params.direct_url);
        assert_eq!(params, JobParameters::new("https://example.com/v"));
    }

    #[test]
    fn test_upload_is_never_deserialized() {
        let params: JobParameters = serde_json::from_value(json!({
            "subject": "/etc/passwd",
            "upload": {"file_name": "x", "data": [1, 2]}
        }))
        .unwrap();
        assert!(params.upload.is_none());
    }

    #[test]
    fn test_upload_parameters_use_file_name() {
        let params = JobParameters::from_upload(Upload::new("clip.mov", vec![0u8; 4]));
        assert_eq!(params.subject, "clip.mov");
        assert_eq!(params.upload.as_ref().map(Upload::len), Some(4));
        assert_eq!(
            format!("{:?}", params.upload.unwrap()),
            "Upload { file_name: \"clip.mov\", len: 4 }"
        );
    }

    #[test]
    fn test_instagram_media_defaults() {
        let media: InstagramMedia = serde_json::from_value(json!({
            "video_url": "https://cdn.example/v.mp4",
            "dimensions": {"width": 1080}
        }))
        .unwrap();
        assert_eq!(media.title, "Instagram Video");
        assert_eq!(media.format, MediaFormat::Video);
        assert_eq!(media.thumbnail, None);
    }

    #[test]
    fn test_blank_subject() {
        assert!(JobParameters::new("   ").is_blank());
        assert!(!JobParameters::new("https://x").is_blank());
    }

    #[test]
    fn test_error_display() {
        let err = JobServiceError::Rejected {
            status: 400,
            detail: "No videos selected".to_string(),
        };
        assert_eq!(err.to_string(), "No videos selected");
        assert_eq!(err.status(), Some(400));

        let err = JobServiceError::MissingJobId(JobKind::Extraction);
        assert_eq!(err.to_string(), "Failed to start extraction");
    }
}
