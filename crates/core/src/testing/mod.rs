//! Testing utilities and mock implementations.
//!
//! This module provides a mock Job Service so the orchestrator and the HTTP
//! API can be exercised end to end without a running service.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidgrab_core::testing::{fixtures, MockJobService};
//!
//! let service = MockJobService::new();
//! service.set_playlist("https://youtube.com/playlist?list=PL1", fixtures::manifest(3)).await;
//! service.push_status("task-1", fixtures::completed("/x")).await;
//! ```

mod mock_job_service;

pub use mock_job_service::{MockJobService, RecordedSubmission};

/// Test fixtures and helper functions.
pub mod fixtures {
    use futures::TryStreamExt;
    use serde_json::Value;

    use crate::selection::{PlaylistItem, PlaylistManifest};
    use crate::service::{
        InstagramMedia, JobParameters, JobServiceError, MediaFormat, ResourceStream,
        StatusResponse, Upload,
    };

    /// A non-terminal status.
    pub fn running(progress: i32) -> StatusResponse {
        StatusResponse::new("downloading", progress, format!("Downloading... {}%", progress))
    }

    /// A completed status carrying a download URL.
    pub fn completed(download_url: &str) -> StatusResponse {
        StatusResponse::new("completed", 100, "Completed!")
            .with_field("download_url", Value::String(download_url.to_string()))
    }

    /// A server-reported failure.
    pub fn failed(message: &str) -> StatusResponse {
        StatusResponse::new("failed", 0, message)
    }

    /// A playlist with `count` items named `v1`, `v2`, ...
    pub fn manifest(count: usize) -> PlaylistManifest {
        PlaylistManifest {
            title: "Test Playlist".to_string(),
            items: (1..=count)
                .map(|i| PlaylistItem {
                    id: format!("v{}", i),
                    title: format!("Video {}", i),
                    thumbnail: Some(format!("https://i.ytimg.com/vi/v{}/default.jpg", i)),
                    duration_seconds: Some(60 * i as u64),
                })
                .collect(),
        }
    }

    /// Parameters for an upload job carrying `size` bytes.
    pub fn upload(file_name: &str, size: usize) -> JobParameters {
        JobParameters::from_upload(Upload::new(file_name, vec![0x42u8; size]))
    }

    /// An extracted Instagram video.
    pub fn instagram_media(video_url: &str) -> InstagramMedia {
        InstagramMedia {
            video_url: video_url.to_string(),
            thumbnail: None,
            title: "Instagram Video".to_string(),
            format: MediaFormat::Video,
            audio_note: None,
        }
    }

    /// Drains a resource stream into memory.
    pub async fn collect_resource(stream: ResourceStream) -> Result<Vec<u8>, JobServiceError> {
        stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }
}
