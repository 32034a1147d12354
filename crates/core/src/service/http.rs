//! HTTP Job Service client.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::job::JobKind;
use crate::selection::{PlaylistItem, PlaylistManifest};

use super::types::number_value;
use super::{
    HistoryItem, InstagramMedia, JobService, JobServiceError, LivestreamStatus, MediaFormat,
    RecordingStatus, ResourceStream, StatusResponse, StoppedRecording, Submission, SubmitRequest,
    Upload,
};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    recording_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistInfoResponse {
    #[serde(default)]
    playlist_title: Option<String>,
    #[serde(default)]
    videos: Vec<PlaylistVideo>,
}

#[derive(Debug, Deserialize)]
struct PlaylistVideo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<HistoryItem>,
}

/// Job Service client speaking the service's REST API.
pub struct HttpJobService {
    client: Client,
    config: ServiceConfig,
}

impl HttpJobService {
    /// Create a new client.
    pub fn new(config: ServiceConfig) -> Result<Self, JobServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| JobServiceError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint)
    }

    /// Send a request, turning non-success statuses into `Rejected`.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, JobServiceError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                JobServiceError::Timeout
            } else if e.is_connect() {
                JobServiceError::ConnectionFailed(e.to_string())
            } else {
                JobServiceError::InvalidResponse(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status));

        debug!("Job Service rejected request ({}): {}", status, detail);
        Err(JobServiceError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, JobServiceError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| JobServiceError::InvalidResponse(e.to_string()))
    }

    /// Multipart form carrying the client's file as the `file` part.
    fn upload_form(upload: &Upload) -> multipart::Form {
        debug!("Uploading {} ({} bytes)", upload.file_name, upload.len());
        let part = multipart::Part::stream_with_length(upload.data.clone(), upload.len() as u64)
            .file_name(upload.file_name.clone());
        multipart::Form::new().part("file", part)
    }

    fn build_submit(&self, request: &SubmitRequest) -> Result<RequestBuilder, JobServiceError> {
        let params = &request.params;
        let url_body = json!({ "url": params.subject });

        let builder = match request.kind {
            JobKind::Extraction => self.client.post(self.url("/api/extract")).json(&json!({
                "url": params.subject,
                "convert_hls": params.convert_hls,
                "direct_url": params.direct_url,
            })),
            JobKind::YouTubeDownload => self
                .client
                .post(self.url("/api/youtube/download"))
                .query(&[
                    ("quality", params.quality.as_str()),
                    ("format_type", params.format.as_str()),
                ])
                .json(&url_body),
            JobKind::YouTubePlaylist => {
                let video_ids = request.video_ids.join(",");
                self.client
                    .post(self.url("/api/youtube/playlist/download"))
                    .query(&[
                        ("video_ids", video_ids.as_str()),
                        ("quality", params.quality.as_str()),
                        ("format_type", params.format.as_str()),
                    ])
                    .json(&url_body)
            }
            JobKind::ArchiveDownload => self
                .client
                .post(self.url("/api/live/download-archive"))
                .json(&url_body),
            JobKind::LivestreamRecording => self
                .client
                .post(self.url("/api/live/start-recording"))
                .json(&url_body),
            JobKind::Conversion => self.client.post(self.url("/api/convert/upload")),
            JobKind::Compression => self
                .client
                .post(self.url("/api/compress/upload"))
                .query(&[("quality", params.compression.as_str())]),
            JobKind::RecordingStatusWatch => {
                return Err(JobServiceError::Unsupported(
                    "recording watches are not submitted".to_string(),
                ))
            }
        };

        Ok(builder)
    }
}

#[async_trait]
impl JobService for HttpJobService {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, JobServiceError> {
        let mut builder = self.build_submit(request)?;
        if request.kind.takes_upload() {
            let upload = request.params.upload.as_ref().ok_or_else(|| {
                JobServiceError::Unsupported(format!("{} needs an uploaded file", request.kind))
            })?;
            builder = builder.multipart(Self::upload_form(upload));
        }

        let response: SubmitResponse = self.send_json(builder).await?;
        let job_id = match request.kind {
            JobKind::LivestreamRecording => response.recording_id,
            _ => response.task_id,
        };

        match job_id {
            Some(job_id) if !job_id.is_empty() => Ok(Submission {
                job_id,
                message: response.message,
            }),
            _ => {
                warn!("Submission of {} returned no job identifier", request.kind);
                Err(JobServiceError::MissingJobId(request.kind))
            }
        }
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusResponse, JobServiceError> {
        let endpoint = format!("/api/progress/{}", urlencoding::encode(job_id));
        self.send_json(self.client.get(self.url(&endpoint))).await
    }

    async fn get_recording_status(
        &self,
        recording_id: &str,
    ) -> Result<RecordingStatus, JobServiceError> {
        let endpoint = format!(
            "/api/live/recording-status/{}",
            urlencoding::encode(recording_id)
        );
        self.send_json(self.client.get(self.url(&endpoint))).await
    }

    async fn stop_recording(
        &self,
        recording_id: &str,
    ) -> Result<StoppedRecording, JobServiceError> {
        let endpoint = format!(
            "/api/live/stop-recording/{}",
            urlencoding::encode(recording_id)
        );
        self.send_json(self.client.post(self.url(&endpoint))).await
    }

    async fn playlist_info(&self, url: &str) -> Result<PlaylistManifest, JobServiceError> {
        let response: PlaylistInfoResponse = self
            .send_json(
                self.client
                    .post(self.url("/api/youtube/playlist/info"))
                    .json(&json!({ "url": url })),
            )
            .await?;

        let items = response
            .videos
            .into_iter()
            .filter_map(|video| {
                let id = video.id?;
                Some(PlaylistItem {
                    title: video.title.unwrap_or_else(|| id.clone()),
                    id,
                    thumbnail: video.thumbnail,
                    duration_seconds: video
                        .duration
                        .as_ref()
                        .and_then(number_value)
                        .map(|d| d.max(0.0) as u64),
                })
            })
            .collect();

        Ok(PlaylistManifest {
            title: response
                .playlist_title
                .unwrap_or_else(|| "YouTube Playlist".to_string()),
            items,
        })
    }

    async fn livestream_status(&self, url: &str) -> Result<LivestreamStatus, JobServiceError> {
        self.send_json(
            self.client
                .post(self.url("/api/live/status"))
                .json(&json!({ "url": url })),
        )
        .await
    }

    async fn instagram(
        &self,
        url: &str,
        format: MediaFormat,
    ) -> Result<InstagramMedia, JobServiceError> {
        self.send_json(
            self.client
                .post(self.url("/api/instagram/download"))
                .query(&[("format_type", format.as_str())])
                .json(&json!({ "url": url })),
        )
        .await
    }

    async fn fetch_resource(
        &self,
        job_id: &str,
        index: Option<usize>,
    ) -> Result<ResourceStream, JobServiceError> {
        let mut endpoint = format!("/api/proxy-download/{}", urlencoding::encode(job_id));
        if let Some(index) = index {
            endpoint.push_str(&format!("/{}", index));
        }

        let response = self.send(self.client.get(self.url(&endpoint))).await?;
        Ok(response
            .bytes_stream()
            .map_err(|e| JobServiceError::InvalidResponse(e.to_string()))
            .boxed())
    }

    async fn history(&self) -> Result<Vec<HistoryItem>, JobServiceError> {
        let response: HistoryResponse = self
            .send_json(self.client.get(self.url("/api/history")))
            .await?;
        Ok(response.history)
    }
}
