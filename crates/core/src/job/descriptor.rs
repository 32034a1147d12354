//! Static timing policy per job kind.

use std::time::Duration;

use serde::Serialize;

use super::JobKind;

/// Status markers that end a poll run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminalStatuses {
    pub completed: &'static str,
    pub failed: &'static str,
}

const TASK_TERMINALS: TerminalStatuses = TerminalStatuses {
    completed: "completed",
    failed: "failed",
};

const RECORDING_TERMINALS: TerminalStatuses = TerminalStatuses {
    completed: "stopped",
    failed: "failed",
};

/// Timing policy and terminal markers for one job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub poll_interval_ms: u64,
    /// `None` means the loop runs until a terminal status or a fetch failure.
    pub timeout_ms: Option<u64>,
    pub terminal: TerminalStatuses,
    /// Message recorded when the local timeout fires.
    pub timeout_message: &'static str,
    /// Message recorded when a status fetch fails.
    pub fetch_failure_message: &'static str,
}

impl JobDescriptor {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn is_completed(&self, status: &str) -> bool {
        status == self.terminal.completed
    }

    pub fn is_failed(&self, status: &str) -> bool {
        status == self.terminal.failed
    }
}

const EXTRACTION: JobDescriptor = JobDescriptor {
    poll_interval_ms: 1_000,
    timeout_ms: Some(120_000),
    terminal: TASK_TERMINALS,
    timeout_message: "Extraction timeout",
    fetch_failure_message: "Failed to get progress",
};

const CONVERSION: JobDescriptor = JobDescriptor {
    poll_interval_ms: 1_000,
    timeout_ms: Some(300_000),
    terminal: TASK_TERMINALS,
    timeout_message: "Conversion timeout",
    fetch_failure_message: "Failed to get conversion progress",
};

const COMPRESSION: JobDescriptor = JobDescriptor {
    poll_interval_ms: 1_000,
    timeout_ms: Some(600_000),
    terminal: TASK_TERMINALS,
    timeout_message: "Compression timeout",
    fetch_failure_message: "Failed to get compression progress",
};

const YOUTUBE_DOWNLOAD: JobDescriptor = JobDescriptor {
    poll_interval_ms: 2_000,
    timeout_ms: Some(300_000),
    terminal: TASK_TERMINALS,
    timeout_message: "Download timeout - video may be too large or slow connection",
    fetch_failure_message: "Failed to get download progress",
};

const YOUTUBE_PLAYLIST: JobDescriptor = JobDescriptor {
    poll_interval_ms: 2_000,
    timeout_ms: Some(600_000),
    terminal: TASK_TERMINALS,
    timeout_message: "Download timeout",
    fetch_failure_message: "Failed to get download progress",
};

const ARCHIVE_DOWNLOAD: JobDescriptor = JobDescriptor {
    poll_interval_ms: 2_000,
    timeout_ms: Some(600_000),
    terminal: TASK_TERMINALS,
    timeout_message: "Download timeout",
    fetch_failure_message: "Failed to get download progress",
};

// The recording itself is never progress-polled; its watch shares the cadence.
const LIVESTREAM_RECORDING: JobDescriptor = JobDescriptor {
    poll_interval_ms: 2_000,
    timeout_ms: None,
    terminal: RECORDING_TERMINALS,
    timeout_message: "Recording timeout",
    fetch_failure_message: "Failed to get recording status",
};

const RECORDING_STATUS_WATCH: JobDescriptor = JobDescriptor {
    poll_interval_ms: 2_000,
    timeout_ms: None,
    terminal: RECORDING_TERMINALS,
    timeout_message: "Recording watch timeout",
    fetch_failure_message: "Failed to get recording status",
};

/// Looks up the timing policy for a kind.
pub fn descriptor(kind: JobKind) -> &'static JobDescriptor {
    match kind {
        JobKind::Extraction => &EXTRACTION,
        JobKind::Conversion => &CONVERSION,
        JobKind::Compression => &COMPRESSION,
        JobKind::YouTubeDownload => &YOUTUBE_DOWNLOAD,
        JobKind::YouTubePlaylist => &YOUTUBE_PLAYLIST,
        JobKind::LivestreamRecording => &LIVESTREAM_RECORDING,
        JobKind::ArchiveDownload => &ARCHIVE_DOWNLOAD,
        JobKind::RecordingStatusWatch => &RECORDING_STATUS_WATCH,
    }
}
