//! Typed terminal results.

use serde::{Deserialize, Serialize};

/// One media file found by an extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub index: usize,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Whether a success result describes one media item or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "files", rename_all = "snake_case")]
pub enum MediaShape {
    Single,
    Multiple(Vec<MediaFile>),
}

/// Outcome of one playlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistItemStatus {
    Success,
    Failed,
}

/// Per-item result of a playlist batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItemResult {
    pub video_id: String,
    pub status: PlaylistItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The single typed result of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultPayload {
    Success {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
        /// Duration in seconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uploader: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_mb: Option<f64>,
        download_url: String,
        media: MediaShape,
    },
    ConversionComplete {
        output_filename: String,
        output_size_mb: f64,
        download_url: String,
    },
    CompressionComplete {
        output_filename: String,
        output_size_mb: f64,
        /// Percentage of the input size saved.
        compression_ratio: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality_description: Option<String>,
        download_url: String,
    },
    PlaylistComplete {
        completed_count: u32,
        failed_count: u32,
        items: Vec<PlaylistItemResult>,
    },
    RecordingComplete {
        filename: String,
        size_mb: f64,
        download_url: String,
    },
    ArchiveComplete {
        filename: String,
        size_mb: f64,
        download_url: String,
    },
}

/// Rendering branch the Presentation Layer should take for a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rendering {
    SingleMedia,
    MediaList,
    Conversion,
    Compression,
    Playlist,
    Recording,
    Archive,
}

impl ResultPayload {
    /// Download link of the primary output, when there is one.
    pub fn download_url(&self) -> Option<&str> {
        match self {
            ResultPayload::Success { download_url, .. }
            | ResultPayload::ConversionComplete { download_url, .. }
            | ResultPayload::CompressionComplete { download_url, .. }
            | ResultPayload::RecordingComplete { download_url, .. }
            | ResultPayload::ArchiveComplete { download_url, .. } => Some(download_url),
            ResultPayload::PlaylistComplete { .. } => None,
        }
    }

    pub fn rendering(&self) -> Rendering {
        match self {
            ResultPayload::Success {
                media: MediaShape::Single,
                ..
            } => Rendering::SingleMedia,
            ResultPayload::Success {
                media: MediaShape::Multiple(_),
                ..
            } => Rendering::MediaList,
            ResultPayload::ConversionComplete { .. } => Rendering::Conversion,
            ResultPayload::CompressionComplete { .. } => Rendering::Compression,
            ResultPayload::PlaylistComplete { .. } => Rendering::Playlist,
            ResultPayload::RecordingComplete { .. } => Rendering::Recording,
            ResultPayload::ArchiveComplete { .. } => Rendering::Archive,
        }
    }
}
