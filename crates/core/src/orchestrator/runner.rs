//! Job orchestrator implementation.
//!
//! Holds one job record per kind and drives submitted jobs to a terminal
//! state:
//! - Submission: validated locally, then sent to the Job Service
//! - Polling: one spawned poll loop per job (see [`crate::poller`])
//! - Recording: a LivestreamRecording is shadowed by a RecordingStatusWatch

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::{classify, classify_stopped_recording};
use crate::history::{HistoryCache, HistorySnapshot};
use crate::job::{FailureKind, Job, JobKind, JobState, TransitionError};
use crate::metrics;
use crate::poller::{probe_for, PollLoop, PollObserver, PollOutcome};
use crate::selection::{is_playlist_url, SelectionModel, SelectionSnapshot};
use crate::service::{
    InstagramMedia, JobParameters, JobService, LivestreamStatus, MediaFormat, ResourceStream,
    StatusResponse, SubmitRequest,
};

use super::types::OrchestratorError;

/// Capacity of the job update feed.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// The record for one kind plus the poll loop currently driving it.
struct Slot {
    job: Job,
    poller: Option<AbortHandle>,
}

impl Slot {
    fn idle(kind: JobKind) -> Self {
        Self {
            job: Job::idle(kind),
            poller: None,
        }
    }
}

type Slots = Arc<RwLock<HashMap<JobKind, Slot>>>;

/// State shared between the orchestrator and its poll tasks.
#[derive(Clone)]
struct JobContext {
    service: Arc<dyn JobService>,
    slots: Slots,
    history: Arc<HistoryCache>,
    updates: broadcast::Sender<Job>,
}

impl JobContext {
    fn publish(&self, job: &Job) {
        // No subscribers is fine.
        let _ = self.updates.send(job.clone());
    }

    async fn refresh_history(&self) {
        if let Err(e) = self.history.refresh(self.service.as_ref()).await {
            warn!("Failed to refresh history: {}", e);
        }
    }
}

/// Applies poll progress to the slot that owns the job.
struct SlotUpdater {
    kind: JobKind,
    job_id: String,
    ctx: JobContext,
}

#[async_trait]
impl PollObserver for SlotUpdater {
    async fn on_status(&self, status: &StatusResponse) -> bool {
        let mut slots = self.ctx.slots.write().await;
        let Some(slot) = slots.get_mut(&self.kind) else {
            return false;
        };
        if !slot.job.is_polling(&self.job_id) {
            return false;
        }

        slot.job
            .apply_progress(status.progress, status.message.clone());
        self.ctx.publish(&slot.job);
        true
    }
}

/// The job orchestrator: single source of truth for every kind's job.
pub struct JobOrchestrator {
    ctx: JobContext,
    selection: Arc<RwLock<SelectionModel>>,
}

impl JobOrchestrator {
    /// Create a new orchestrator over a Job Service.
    pub fn new(service: Arc<dyn JobService>, history_limit: usize) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            ctx: JobContext {
                service,
                slots: Arc::new(RwLock::new(HashMap::new())),
                history: Arc::new(HistoryCache::new(history_limit)),
                updates,
            },
            selection: Arc::new(RwLock::new(SelectionModel::new())),
        }
    }

    /// Subscribe to job snapshots, one per mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<Job> {
        self.ctx.updates.subscribe()
    }

    /// Current job of a kind (Idle when nothing was submitted).
    pub async fn job(&self, kind: JobKind) -> Job {
        self.ctx
            .slots
            .read()
            .await
            .get(&kind)
            .map(|slot| slot.job.clone())
            .unwrap_or_else(|| Job::idle(kind))
    }

    /// Current job of every kind, in display order.
    pub async fn jobs(&self) -> Vec<Job> {
        let slots = self.ctx.slots.read().await;
        JobKind::ALL
            .iter()
            .map(|kind| {
                slots
                    .get(kind)
                    .map(|slot| slot.job.clone())
                    .unwrap_or_else(|| Job::idle(*kind))
            })
            .collect()
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit a new job of `kind`.
    ///
    /// Returns the job once it is Polling. A terminal job of the same kind is
    /// replaced; an active one makes this fail with `JobInProgress`.
    pub async fn submit(
        &self,
        kind: JobKind,
        params: JobParameters,
    ) -> Result<Job, OrchestratorError> {
        let request = match self.validate(kind, params).await {
            Ok(request) => request,
            Err(e) => {
                metrics::JOBS_SUBMITTED
                    .with_label_values(&[kind.as_str(), "invalid"])
                    .inc();
                debug!("Rejected {} submission: {}", kind, e);
                return Err(e);
            }
        };

        self.claim_slot(kind).await?;

        info!(
            "Submitting {} job to {} ({})",
            kind,
            self.ctx.service.name(),
            request.params.subject
        );

        let submission = match self.ctx.service.submit(&request).await {
            Ok(submission) => submission,
            Err(e) => {
                warn!("{} submission failed: {}", kind, e);
                metrics::JOBS_SUBMITTED
                    .with_label_values(&[kind.as_str(), "rejected"])
                    .inc();

                let mut slots = self.ctx.slots.write().await;
                if let Some(slot) = slots.get_mut(&kind) {
                    if slot.job.state == JobState::Submitting {
                        log_transition(slot.job.fail(FailureKind::Submission, e.to_string()));
                        record_finished(&slot.job);
                        self.ctx.publish(&slot.job);
                    }
                }
                return Err(OrchestratorError::Submission(e));
            }
        };

        metrics::JOBS_SUBMITTED
            .with_label_values(&[kind.as_str(), "accepted"])
            .inc();

        let job_id = submission.job_id;
        let message = submission
            .message
            .unwrap_or_else(|| polling_message(kind).to_string());

        let mut slots = self.ctx.slots.write().await;
        let slot = slots.entry(kind).or_insert_with(|| Slot::idle(kind));
        slot.job
            .start_polling(job_id.clone())
            .map_err(|e| invalid_state(kind, "submitting", e))?;
        slot.job.status_message = message;

        // The recording itself is only ever ended by stop() or its watch.
        if kind != JobKind::LivestreamRecording {
            slot.poller = Some(Self::spawn_poll(&self.ctx, kind, job_id.clone()));
        }
        let job = slot.job.clone();
        self.ctx.publish(&job);
        info!("{} job {} is polling", kind, job_id);

        if kind == JobKind::LivestreamRecording {
            let mut watch = Slot::idle(JobKind::RecordingStatusWatch);
            log_transition(watch.job.begin_submission("Watching recording..."));
            log_transition(watch.job.start_polling(job_id.clone()));
            watch.poller = Some(Self::spawn_poll(
                &self.ctx,
                JobKind::RecordingStatusWatch,
                job_id.clone(),
            ));
            self.ctx.publish(&watch.job);
            slots.insert(JobKind::RecordingStatusWatch, watch);
            debug!("Recording {} is being watched", job_id);
        }

        Ok(job)
    }

    /// Local checks; builds the request with the selection captured by value.
    async fn validate(
        &self,
        kind: JobKind,
        params: JobParameters,
    ) -> Result<SubmitRequest, OrchestratorError> {
        if !kind.is_submittable() {
            return Err(OrchestratorError::Validation(format!(
                "{} jobs cannot be submitted directly",
                kind
            )));
        }

        if kind.takes_upload() {
            let has_file = params
                .upload
                .as_ref()
                .is_some_and(|upload| !upload.is_empty());
            if !has_file {
                return Err(OrchestratorError::Validation(
                    "Please select a video file".to_string(),
                ));
            }
        } else if params.upload.is_some() {
            return Err(OrchestratorError::Validation(format!(
                "{} jobs do not take a file",
                kind
            )));
        }

        if params.is_blank() {
            return Err(OrchestratorError::Validation(
                "Please enter a URL".to_string(),
            ));
        }

        let mut params = params;
        params.subject = params.subject.trim().to_string();

        let video_ids = match kind {
            JobKind::YouTubeDownload if is_playlist_url(&params.subject) => {
                return Err(OrchestratorError::Validation(
                    "This is a playlist URL; load the playlist and download the selected videos"
                        .to_string(),
                ));
            }
            JobKind::YouTubePlaylist => {
                let selected = self.selection.read().await.selected_ids();
                if selected.is_empty() {
                    return Err(OrchestratorError::Validation(
                        "Please select at least one video".to_string(),
                    ));
                }
                selected
            }
            _ => Vec::new(),
        };

        Ok(SubmitRequest {
            kind,
            params,
            video_ids,
        })
    }

    /// Moves a kind's slot into Submitting, replacing a terminal job.
    async fn claim_slot(&self, kind: JobKind) -> Result<(), OrchestratorError> {
        let mut slots = self.ctx.slots.write().await;

        if kind == JobKind::LivestreamRecording {
            if let Some(watch) = slots.get(&JobKind::RecordingStatusWatch) {
                if watch.job.state.is_active() {
                    return Err(OrchestratorError::JobInProgress(
                        JobKind::RecordingStatusWatch,
                    ));
                }
            }
        }

        let slot = slots.entry(kind).or_insert_with(|| Slot::idle(kind));
        if slot.job.state.is_active() {
            return Err(OrchestratorError::JobInProgress(kind));
        }

        *slot = Slot::idle(kind);
        slot.job
            .begin_submission(submitting_message(kind))
            .map_err(|e| invalid_state(kind, "idle", e))?;
        self.ctx.publish(&slot.job);
        Ok(())
    }

    fn spawn_poll(ctx: &JobContext, kind: JobKind, job_id: String) -> AbortHandle {
        let ctx = ctx.clone();

        let handle = tokio::spawn(async move {
            let probe = probe_for(kind, Arc::clone(&ctx.service));
            let observer = SlotUpdater {
                kind,
                job_id: job_id.clone(),
                ctx: ctx.clone(),
            };

            let outcome = PollLoop::new(kind, &job_id)
                .run(probe.as_ref(), &observer)
                .await;
            Self::finish(&ctx, kind, &job_id, outcome).await;
        });

        handle.abort_handle()
    }

    /// Records a poll outcome on the job it belongs to.
    async fn finish(ctx: &JobContext, kind: JobKind, job_id: &str, outcome: PollOutcome) {
        let mut slots = ctx.slots.write().await;
        let Some(slot) = slots.get_mut(&kind) else {
            return;
        };
        if !slot.job.is_polling(job_id) {
            debug!("Dropping outcome for stale {} job {}", kind, job_id);
            return;
        }
        slot.poller = None;

        let mut recording_update = None;
        let transition = match outcome {
            PollOutcome::Completed(status) => {
                let result = match kind {
                    JobKind::RecordingStatusWatch => None,
                    _ => Some(classify(kind, &status.payload)),
                };
                let message = if status.message.is_empty() {
                    "Completed".to_string()
                } else {
                    status.message.clone()
                };
                recording_update = Some(RecordingEnd::Stopped(status));
                slot.job.complete(result, message)
            }
            PollOutcome::Failed(message) => {
                recording_update = Some(RecordingEnd::Failed(message.clone()));
                slot.job.fail(FailureKind::ServerReported, message)
            }
            PollOutcome::TransportFailed(message) => slot.job.fail(FailureKind::Transport, message),
            PollOutcome::TimedOut(message) => slot.job.time_out(message),
            PollOutcome::Abandoned => return,
        };

        if let Err(e) = transition {
            error!("Could not finish {} job {}: {}", kind, job_id, e);
            return;
        }

        record_finished(&slot.job);
        ctx.publish(&slot.job);
        let mut completed = slot.job.state == JobState::Completed;

        if kind == JobKind::RecordingStatusWatch {
            if let Some(end) = recording_update {
                completed |= Self::end_recording(ctx, &mut slots, job_id, end);
            }
        }
        drop(slots);

        if completed {
            ctx.refresh_history().await;
        }
    }

    /// The watch saw the recording end server-side. Returns true if the
    /// recording job completed.
    fn end_recording(
        ctx: &JobContext,
        slots: &mut HashMap<JobKind, Slot>,
        recording_id: &str,
        end: RecordingEnd,
    ) -> bool {
        let Some(slot) = slots.get_mut(&JobKind::LivestreamRecording) else {
            return false;
        };
        if !slot.job.is_polling(recording_id) {
            return false;
        }

        let transition = match end {
            RecordingEnd::Stopped(status) => {
                let has_file = status
                    .payload
                    .get("download_url")
                    .and_then(|v| v.as_str())
                    .is_some_and(|url| !url.is_empty());
                if has_file {
                    let result = classify(JobKind::LivestreamRecording, &status.payload);
                    slot.job.complete(Some(result), "Recording complete")
                } else {
                    slot.job.fail(FailureKind::ServerReported, "Recording ended")
                }
            }
            RecordingEnd::Failed(message) => slot.job.fail(FailureKind::ServerReported, message),
        };

        if let Err(e) = transition {
            error!("Could not end recording {}: {}", recording_id, e);
            return false;
        }

        info!(
            "Recording {} ended server-side ({})",
            recording_id, slot.job.state
        );
        record_finished(&slot.job);
        ctx.publish(&slot.job);
        slot.job.state == JobState::Completed
    }

    // =========================================================================
    // Intents
    // =========================================================================

    /// Return a terminal job of `kind` to Idle.
    pub async fn reset(&self, kind: JobKind) -> Result<Job, OrchestratorError> {
        let mut slots = self.ctx.slots.write().await;
        let slot = slots.entry(kind).or_insert_with(|| Slot::idle(kind));

        match slot.job.state {
            JobState::Idle => return Ok(slot.job.clone()),
            state if !state.is_terminal() => {
                return Err(OrchestratorError::InvalidState {
                    kind,
                    expected: "a terminal state".to_string(),
                    actual: state,
                })
            }
            _ => {}
        }

        debug!("Resetting {} job", kind);
        *slot = Slot::idle(kind);
        self.ctx.publish(&slot.job);
        Ok(slot.job.clone())
    }

    /// Stop the running livestream recording and complete it with the file
    /// the service produced.
    ///
    /// The watch keeps polling until it sees the recording stopped.
    pub async fn stop_recording(&self) -> Result<Job, OrchestratorError> {
        let kind = JobKind::LivestreamRecording;
        let recording_id = {
            let slots = self.ctx.slots.read().await;
            match slots.get(&kind) {
                Some(slot) if slot.job.state == JobState::Polling => slot.job.id.clone(),
                _ => None,
            }
        }
        .ok_or(OrchestratorError::NoActiveJob(kind))?;

        info!("Stopping recording {}", recording_id);
        let stopped = self
            .ctx
            .service
            .stop_recording(&recording_id)
            .await
            .map_err(|e| {
                warn!("Failed to stop recording {}: {}", recording_id, e);
                OrchestratorError::Service(e)
            })?;

        let mut slots = self.ctx.slots.write().await;
        let slot = slots.entry(kind).or_insert_with(|| Slot::idle(kind));
        if !slot.job.is_polling(&recording_id) {
            debug!("Recording {} already ended", recording_id);
            return Ok(slot.job.clone());
        }

        slot.job
            .complete(
                Some(classify_stopped_recording(&stopped)),
                format!("Recording saved: {}", stopped.filename),
            )
            .map_err(|e| invalid_state(kind, "polling", e))?;
        record_finished(&slot.job);
        self.ctx.publish(&slot.job);
        let job = slot.job.clone();
        drop(slots);

        self.ctx.refresh_history().await;
        Ok(job)
    }

    /// Stream of item `index` of a completed job's output.
    pub async fn fetch_resource(
        &self,
        kind: JobKind,
        index: Option<usize>,
    ) -> Result<ResourceStream, OrchestratorError> {
        let job = self.job(kind).await;
        if job.state != JobState::Completed {
            return Err(OrchestratorError::InvalidState {
                kind,
                expected: JobState::Completed.to_string(),
                actual: job.state,
            });
        }
        let job_id = job.id.ok_or(OrchestratorError::NoActiveJob(kind))?;

        Ok(self.ctx.service.fetch_resource(&job_id, index).await?)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Fetch a playlist manifest and install it, selecting every item.
    pub async fn fetch_playlist(&self, url: &str) -> Result<SelectionSnapshot, OrchestratorError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OrchestratorError::Validation(
                "Please enter a playlist URL".to_string(),
            ));
        }

        let manifest = self.ctx.service.playlist_info(url).await?;
        info!(
            "Loaded playlist '{}' ({} items)",
            manifest.title,
            manifest.len()
        );

        let mut selection = self.selection.write().await;
        selection.replace_manifest(manifest);
        Ok(selection.snapshot())
    }

    pub async fn selection(&self) -> SelectionSnapshot {
        self.selection.read().await.snapshot()
    }

    /// Flip membership of one item. Unknown ids are ignored.
    pub async fn toggle(&self, id: &str) -> SelectionSnapshot {
        let mut selection = self.selection.write().await;
        selection.toggle(id);
        selection.snapshot()
    }

    pub async fn select_all(&self) -> SelectionSnapshot {
        let mut selection = self.selection.write().await;
        selection.select_all();
        selection.snapshot()
    }

    pub async fn deselect_all(&self) -> SelectionSnapshot {
        let mut selection = self.selection.write().await;
        selection.deselect_all();
        selection.snapshot()
    }

    // =========================================================================
    // One-shot queries
    // =========================================================================

    /// Whether a stream is live, upcoming or archived.
    pub async fn check_livestream(&self, url: &str) -> Result<LivestreamStatus, OrchestratorError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OrchestratorError::Validation(
                "Please enter a URL".to_string(),
            ));
        }
        Ok(self.ctx.service.livestream_status(url).await?)
    }

    /// Media link of an Instagram reel or post.
    pub async fn extract_instagram(
        &self,
        url: &str,
        format: MediaFormat,
    ) -> Result<InstagramMedia, OrchestratorError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OrchestratorError::Validation(
                "Please enter an Instagram URL".to_string(),
            ));
        }
        debug!("Extracting Instagram {} from {}", format.as_str(), url);
        Ok(self.ctx.service.instagram(url, format).await?)
    }

    pub async fn history(&self) -> HistorySnapshot {
        self.ctx.history.snapshot().await
    }

    pub async fn refresh_history(&self) -> Result<HistorySnapshot, OrchestratorError> {
        Ok(self
            .ctx
            .history
            .refresh(self.ctx.service.as_ref())
            .await?)
    }

    /// Abort every running poll loop.
    pub async fn shutdown(&self) {
        let mut slots = self.ctx.slots.write().await;
        let mut aborted = 0;
        for slot in slots.values_mut() {
            if let Some(poller) = slot.poller.take() {
                poller.abort();
                aborted += 1;
            }
        }
        info!("Job orchestrator stopped ({} poll loops aborted)", aborted);
    }
}

/// How the watch saw a recording end.
enum RecordingEnd {
    Stopped(StatusResponse),
    Failed(String),
}

fn submitting_message(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Extraction => "Starting extraction...",
        JobKind::Conversion | JobKind::Compression => "Uploading video...",
        JobKind::YouTubeDownload => "Starting download...",
        JobKind::YouTubePlaylist => "Starting playlist download...",
        JobKind::LivestreamRecording => "Starting recording...",
        JobKind::ArchiveDownload => "Starting archive download...",
        JobKind::RecordingStatusWatch => "Watching recording...",
    }
}

fn polling_message(kind: JobKind) -> &'static str {
    match kind {
        JobKind::LivestreamRecording | JobKind::RecordingStatusWatch => "Recording...",
        _ => "Processing...",
    }
}

fn record_finished(job: &Job) {
    metrics::JOBS_FINISHED
        .with_label_values(&[job.kind.as_str(), job.state.as_str()])
        .inc();
}

fn invalid_state(kind: JobKind, expected: &str, e: TransitionError) -> OrchestratorError {
    OrchestratorError::InvalidState {
        kind,
        expected: expected.to_string(),
        actual: e.from,
    }
}

fn log_transition(result: Result<(), TransitionError>) {
    if let Err(e) = result {
        error!("{}", e);
    }
}
