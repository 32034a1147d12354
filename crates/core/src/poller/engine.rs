//! The poll loop itself.

use std::future::{self, Future};

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::job::{descriptor, JobDescriptor, JobKind};
use crate::metrics;
use crate::service::StatusResponse;

use super::{PollObserver, StatusProbe};

/// How a poll run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The completed marker was observed; carries the final status.
    Completed(StatusResponse),
    /// The service reported the job as failed; carries its message verbatim.
    Failed(String),
    /// A status fetch failed; carries the kind's fetch failure message.
    TransportFailed(String),
    /// The local budget ran out; carries the kind's timeout message.
    TimedOut(String),
    /// The observer no longer tracks this job.
    Abandoned,
}

/// Drives one job from Polling to a terminal outcome.
///
/// Both timers live inside [`PollLoop::run`], so every exit path drops them.
pub struct PollLoop<'a> {
    kind: JobKind,
    job_id: &'a str,
    descriptor: &'static JobDescriptor,
}

impl<'a> PollLoop<'a> {
    pub fn new(kind: JobKind, job_id: &'a str) -> Self {
        Self {
            kind,
            job_id,
            descriptor: descriptor(kind),
        }
    }

    pub async fn run(&self, probe: &dyn StatusProbe, observer: &dyn PollObserver) -> PollOutcome {
        let started = Instant::now();
        let outcome = self.drive(probe, observer).await;

        metrics::POLL_DURATION
            .with_label_values(&[self.kind.as_str()])
            .observe(started.elapsed().as_secs_f64());
        outcome
    }

    async fn drive(&self, probe: &dyn StatusProbe, observer: &dyn PollObserver) -> PollOutcome {
        let entered = Instant::now();
        let period = self.descriptor.poll_interval();
        let mut ticker = tokio::time::interval_at(entered + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = deadline(self.descriptor.timeout().map(|budget| entered + budget));
        tokio::pin!(deadline);

        debug!(
            "Polling {} job {} every {:?} (timeout {:?})",
            self.kind,
            self.job_id,
            period,
            self.descriptor.timeout()
        );

        loop {
            // On a tie the deadline wins: the budget is measured from entry.
            tokio::select! {
                biased;
                _ = &mut deadline => return self.timed_out(),
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = &mut deadline => return self.timed_out(),
                fetched = probe.fetch(self.job_id) => fetched,
            };

            let status = match fetched {
                Ok(status) => {
                    metrics::STATUS_FETCHES
                        .with_label_values(&[self.kind.as_str(), "ok"])
                        .inc();
                    status
                }
                Err(e) => {
                    metrics::STATUS_FETCHES
                        .with_label_values(&[self.kind.as_str(), "error"])
                        .inc();
                    warn!(
                        "Status fetch for {} job {} failed: {}",
                        self.kind, self.job_id, e
                    );
                    return PollOutcome::TransportFailed(
                        self.descriptor.fetch_failure_message.to_string(),
                    );
                }
            };

            if !observer.on_status(&status).await {
                debug!("{} job {} is no longer watched", self.kind, self.job_id);
                return PollOutcome::Abandoned;
            }

            if self.descriptor.is_completed(&status.status) {
                info!("{} job {} completed", self.kind, self.job_id);
                return PollOutcome::Completed(status);
            }

            if self.descriptor.is_failed(&status.status) {
                info!(
                    "{} job {} failed on the service: {}",
                    self.kind, self.job_id, status.message
                );
                return PollOutcome::Failed(status.message);
            }
        }
    }

    fn timed_out(&self) -> PollOutcome {
        warn!(
            "{} job {} gave no terminal status within {:?}",
            self.kind,
            self.job_id,
            self.descriptor.timeout()
        );
        PollOutcome::TimedOut(self.descriptor.timeout_message.to_string())
    }
}

/// Resolves at `at`, or never for unbounded kinds.
fn deadline(at: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::service::JobServiceError;

    /// Replays scripted answers; the last one repeats forever.
    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<StatusResponse, JobServiceError>>>,
        last: Mutex<Option<StatusResponse>>,
        fetches: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<StatusResponse, JobServiceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                fetches: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn forever(status: StatusResponse) -> Self {
            Self::new(vec![Ok(status)])
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusProbe for ScriptedProbe {
        async fn fetch(&self, _job_id: &str) -> Result<StatusResponse, JobServiceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(status)) => {
                    *self.last.lock().unwrap() = Some(status.clone());
                    Ok(status)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("script must not be empty")),
            }
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(i32, String)>>,
        detached: AtomicBool,
    }

    #[async_trait]
    impl PollObserver for RecordingObserver {
        async fn on_status(&self, status: &StatusResponse) -> bool {
            self.seen
                .lock()
                .unwrap()
                .push((status.progress, status.message.clone()));
            !self.detached.load(Ordering::SeqCst)
        }
    }

    fn running(progress: i32) -> StatusResponse {
        StatusResponse::new("downloading", progress, format!("Downloading {}%", progress))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_progress_ticks() {
        let probe = ScriptedProbe::new(vec![
            Ok(running(10)),
            Ok(running(50)),
            Ok(StatusResponse::new("completed", 100, "Done").with_field("download_url", "/x".into())),
        ]);
        let observer = RecordingObserver::default();
        let started = Instant::now();

        let outcome = PollLoop::new(JobKind::Extraction, "t-1")
            .run(&probe, &observer)
            .await;

        match outcome {
            PollOutcome::Completed(status) => assert_eq!(status.payload["download_url"], "/x"),
            other => panic!("expected Completed, got {:?}", other),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (100, "Done".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_waits_one_interval() {
        let probe = ScriptedProbe::forever(StatusResponse::new("completed", 100, "Done"));
        let observer = RecordingObserver::default();
        let started = Instant::now();

        PollLoop::new(JobKind::YouTubeDownload, "t-1")
            .run(&probe, &observer)
            .await;

        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(probe.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_failure_keeps_message() {
        let probe = ScriptedProbe::new(vec![
            Ok(running(5)),
            Ok(StatusResponse::new("failed", 5, "Video unavailable")),
        ]);
        let observer = RecordingObserver::default();

        let outcome = PollLoop::new(JobKind::YouTubeDownload, "t-1")
            .run(&probe, &observer)
            .await;

        assert_eq!(outcome, PollOutcome::Failed("Video unavailable".to_string()));
        assert_eq!(probe.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_fails_fast() {
        let probe = ScriptedProbe::new(vec![
            Ok(running(20)),
            Err(JobServiceError::ConnectionFailed("refused".to_string())),
            Ok(StatusResponse::new("completed", 100, "Done")),
        ]);
        let observer = RecordingObserver::default();

        let outcome = PollLoop::new(JobKind::Conversion, "t-1")
            .run(&probe, &observer)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::TransportFailed("Failed to get conversion progress".to_string())
        );
        assert_eq!(probe.fetches(), 2);
        assert_eq!(observer.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extraction_times_out_at_exactly_two_minutes() {
        let probe = ScriptedProbe::forever(running(42));
        let observer = RecordingObserver::default();
        let started = Instant::now();

        let outcome = PollLoop::new(JobKind::Extraction, "t-1")
            .run(&probe, &observer)
            .await;

        assert_eq!(outcome, PollOutcome::TimedOut("Extraction timeout".to_string()));
        assert_eq!(started.elapsed(), Duration::from_millis(120_000));
        // Ticks at 1s..=119s; the 120s tick loses to the deadline.
        assert_eq!(probe.fetches(), 119);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_just_before_deadline_wins() {
        let mut script: Vec<_> = (0..118).map(|_| Ok(running(99))).collect();
        script.push(Ok(StatusResponse::new("completed", 100, "Done")));
        let probe = ScriptedProbe::new(script);
        let observer = RecordingObserver::default();
        let started = Instant::now();

        let outcome = PollLoop::new(JobKind::Extraction, "t-1")
            .run(&probe, &observer)
            .await;

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(119));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_cut_by_deadline() {
        let mut probe = ScriptedProbe::forever(running(1));
        probe.delay = Some(Duration::from_secs(500));
        let observer = RecordingObserver::default();
        let started = Instant::now();

        let outcome = PollLoop::new(JobKind::Extraction, "t-1")
            .run(&probe, &observer)
            .await;

        assert_eq!(outcome, PollOutcome::TimedOut("Extraction timeout".to_string()));
        assert_eq!(started.elapsed(), Duration::from_secs(120));
        assert!(observer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_has_no_deadline() {
        let mut script: Vec<_> = (0..400)
            .map(|_| Ok(StatusResponse::new("recording", 0, "Recording recording")))
            .collect();
        script.push(Ok(StatusResponse::new("stopped", 0, "Recording stopped")));
        let probe = ScriptedProbe::new(script);
        let observer = RecordingObserver::default();
        let started = Instant::now();

        let outcome = PollLoop::new(JobKind::RecordingStatusWatch, "rec-1")
            .run(&probe, &observer)
            .await;

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(802));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_observer_abandons_run() {
        let probe = ScriptedProbe::forever(running(10));
        let observer = RecordingObserver::default();
        observer.detached.store(true, Ordering::SeqCst);

        let outcome = PollLoop::new(JobKind::Compression, "t-1")
            .run(&probe, &observer)
            .await;

        assert_eq!(outcome, PollOutcome::Abandoned);
        assert_eq!(probe.fetches(), 1);
    }
}
