//! Maps terminal status payloads onto typed results.
//!
//! Classification is a pure function of the job kind and the raw payload.
//! Missing fields fall back to empty values rather than failing the job: the
//! service is the authority on whether the job succeeded.

mod types;

pub use types::{
    MediaFile, MediaShape, PlaylistItemResult, PlaylistItemStatus, Rendering, ResultPayload,
};

use serde_json::{Map, Value};

use crate::job::JobKind;
use crate::service::{number_value, StoppedRecording};

/// Builds the result for a job that reached its completed marker.
pub fn classify(kind: JobKind, payload: &Map<String, Value>) -> ResultPayload {
    match kind {
        JobKind::Extraction | JobKind::YouTubeDownload => ResultPayload::Success {
            title: string(payload, "title").unwrap_or_default(),
            thumbnail: string(payload, "thumbnail"),
            duration: number(payload, "duration"),
            uploader: string(payload, "uploader"),
            size_mb: number(payload, "file_size_mb"),
            download_url: string(payload, "download_url").unwrap_or_default(),
            media: media_shape(payload),
        },
        JobKind::Conversion => ResultPayload::ConversionComplete {
            output_filename: string(payload, "output_filename").unwrap_or_default(),
            output_size_mb: number(payload, "output_size_mb").unwrap_or_default(),
            download_url: string(payload, "download_url").unwrap_or_default(),
        },
        JobKind::Compression => ResultPayload::CompressionComplete {
            output_filename: string(payload, "output_filename").unwrap_or_default(),
            output_size_mb: number(payload, "output_size_mb").unwrap_or_default(),
            compression_ratio: number(payload, "compression_ratio").unwrap_or_default(),
            quality_description: string(payload, "quality_description"),
            download_url: string(payload, "download_url").unwrap_or_default(),
        },
        JobKind::YouTubePlaylist => ResultPayload::PlaylistComplete {
            completed_count: count(payload, "completed_videos"),
            failed_count: count(payload, "failed_videos"),
            items: payload
                .get("downloads")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(playlist_item).collect())
                .unwrap_or_default(),
        },
        JobKind::LivestreamRecording | JobKind::RecordingStatusWatch => {
            ResultPayload::RecordingComplete {
                filename: string(payload, "filename").unwrap_or_default(),
                size_mb: number(payload, "file_size_mb").unwrap_or_default(),
                download_url: string(payload, "download_url").unwrap_or_default(),
            }
        }
        JobKind::ArchiveDownload => ResultPayload::ArchiveComplete {
            filename: string(payload, "filename").unwrap_or_default(),
            size_mb: number(payload, "file_size_mb").unwrap_or_default(),
            download_url: string(payload, "download_url").unwrap_or_default(),
        },
    }
}

/// Result of an explicit stop of a livestream recording.
pub fn classify_stopped_recording(stopped: &StoppedRecording) -> ResultPayload {
    ResultPayload::RecordingComplete {
        filename: stopped.filename.clone(),
        size_mb: stopped.file_size_mb,
        download_url: stopped.download_url.clone(),
    }
}

fn string(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn number(payload: &Map<String, Value>, key: &str) -> Option<f64> {
    payload.get(key).and_then(number_value)
}

fn count(payload: &Map<String, Value>, key: &str) -> u32 {
    number(payload, key).map(|n| n.max(0.0) as u32).unwrap_or(0)
}

/// A `media_files` list means several media items; otherwise the singular
/// fields describe one.
fn media_shape(payload: &Map<String, Value>) -> MediaShape {
    let list = payload.get("media_files").and_then(Value::as_array);

    match list {
        Some(entries) => MediaShape::Multiple(
            entries
                .iter()
                .enumerate()
                .filter_map(|(position, entry)| {
                    let entry = entry.as_object()?;
                    let url = string(entry, "url").or_else(|| string(entry, "download_url"))?;
                    Some(MediaFile {
                        index: number(entry, "index").map(|i| i as usize).unwrap_or(position),
                        url,
                        extension: string(entry, "extension"),
                        size_bytes: number(entry, "size").map(|s| s as u64),
                    })
                })
                .collect(),
        ),
        None => MediaShape::Single,
    }
}

fn playlist_item(entry: &Value) -> Option<PlaylistItemResult> {
    let entry = entry.as_object()?;
    let status = match entry.get("status").and_then(Value::as_str) {
        Some("success") => PlaylistItemStatus::Success,
        _ => PlaylistItemStatus::Failed,
    };

    Some(PlaylistItemResult {
        video_id: string(entry, "video_id")?,
        status,
        title: string(entry, "title"),
        download_url: string(entry, "download_url"),
        size_mb: number(entry, "file_size_mb"),
        error: string(entry, "error"),
    })
}

/// Formats a duration in seconds as `"{h}h {m}m {s}s"`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}h {}m {}s", hours, minutes, secs)
}
