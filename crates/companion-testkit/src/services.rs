//! Scripted service doubles.
//!
//! Every double records what the view-models asked of it so tests can
//! assert on interactions, and most can be told to fail on demand.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use companion_app::lifecycle::AttachmentToken;
use companion_app::services::{
    AnalyticsService, FeedbackService, NotificationSchedulingService, SettingsGateway, SyncService,
};
use companion_app::{AppServices, Feedback, FeedbackCandidate, SettingsSnapshot, SettingsStore};
use companion_core::effects::CancellationToken;
use companion_core::{CompanionError, CompanionResult, SessionId};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;

/// Feedback source with scripted candidates, latency and failures.
#[derive(Debug, Default)]
pub struct ScriptedFeedbackService {
    pending: Mutex<VecDeque<FeedbackCandidate>>,
    submitted: Mutex<Vec<(SessionId, Feedback)>>,
    skipped: Mutex<Vec<SessionId>>,
    latency: Mutex<Duration>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl ScriptedFeedbackService {
    /// Service with `candidates` pending, in order.
    pub fn new(candidates: impl IntoIterator<Item = FeedbackCandidate>) -> Self {
        Self {
            pending: Mutex::new(candidates.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Append a pending candidate.
    pub fn push(&self, candidate: FeedbackCandidate) {
        self.pending.lock().push_back(candidate);
    }

    /// Delay every read by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Make `next` and `candidate` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `submit` and `skip` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Feedback recorded so far.
    pub fn submitted(&self) -> Vec<(SessionId, Feedback)> {
        self.submitted.lock().clone()
    }

    /// Sessions skipped so far.
    pub fn skipped(&self) -> Vec<SessionId> {
        self.skipped.lock().clone()
    }

    /// Number of `next`/`candidate` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn read(&self) -> CompanionResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CompanionError::network("feedback backend unreachable"));
        }
        Ok(())
    }

    fn write(&self, session_id: &SessionId) -> CompanionResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CompanionError::storage("feedback store read-only"));
        }
        self.pending
            .lock()
            .retain(|candidate| &candidate.session_id != session_id);
        Ok(())
    }
}

#[async_trait]
impl FeedbackService for ScriptedFeedbackService {
    async fn next(&self) -> CompanionResult<Option<FeedbackCandidate>> {
        self.read().await?;
        Ok(self.pending.lock().front().cloned())
    }

    async fn candidate(&self, session_id: &SessionId) -> CompanionResult<Option<FeedbackCandidate>> {
        self.read().await?;
        Ok(self
            .pending
            .lock()
            .iter()
            .find(|candidate| &candidate.session_id == session_id)
            .cloned())
    }

    async fn submit(&self, candidate: &FeedbackCandidate, feedback: Feedback) -> CompanionResult<()> {
        self.write(&candidate.session_id)?;
        self.submitted
            .lock()
            .push((candidate.session_id.clone(), feedback));
        Ok(())
    }

    async fn skip(&self, candidate: &FeedbackCandidate) -> CompanionResult<()> {
        self.write(&candidate.session_id)?;
        self.skipped.lock().push(candidate.session_id.clone());
        Ok(())
    }
}

/// Background service double that counts runs and cancellations.
///
/// Implements both [`SyncService`] and [`NotificationSchedulingService`].
/// Each run parks until cancelled unless a failure is scripted for it.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    started: AtomicUsize,
    cancelled: AtomicUsize,
    failures_left: AtomicUsize,
    epochs: Mutex<Vec<u64>>,
}

impl RecordingRunner {
    /// Runner whose first `count` runs fail immediately.
    pub fn failing_first(count: usize) -> Self {
        let runner = Self::default();
        runner.failures_left.store(count, Ordering::SeqCst);
        runner
    }

    /// Number of runs started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of runs that observed cancellation and returned.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Attachment epoch of every started run.
    pub fn epochs(&self) -> Vec<u64> {
        self.epochs.lock().clone()
    }

    async fn run(&self, token: AttachmentToken) -> CompanionResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.epochs.lock().push(token.epoch());
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(CompanionError::network("scripted failure"));
        }
        token.cancelled().await;
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SyncService for RecordingRunner {
    async fn run_synchronization(&self, token: AttachmentToken) -> CompanionResult<()> {
        self.run(token).await
    }
}

#[async_trait]
impl NotificationSchedulingService for RecordingRunner {
    async fn run_scheduling(&self, token: AttachmentToken) -> CompanionResult<()> {
        self.run(token).await
    }
}

/// Settings gateway whose reads always fail.
#[derive(Debug, Default)]
pub struct FailingSettingsGateway {
    writes: Mutex<Vec<bool>>,
}

impl FailingSettingsGateway {
    /// Values passed to `set_feedback_enabled`.
    pub fn writes(&self) -> Vec<bool> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl SettingsGateway for FailingSettingsGateway {
    async fn settings(&self) -> CompanionResult<SettingsSnapshot> {
        Err(CompanionError::storage("settings unavailable"))
    }

    fn subscribe(&self) -> BoxStream<'static, SettingsSnapshot> {
        stream::pending().boxed()
    }

    async fn set_feedback_enabled(&self, enabled: bool) -> CompanionResult<()> {
        self.writes.lock().push(enabled);
        Err(CompanionError::storage("settings unavailable"))
    }
}

/// Analytics sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<String>>,
}

impl RecordingAnalytics {
    /// Events logged so far.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// How many times `name` was logged.
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|event| *event == name).count()
    }
}

impl AnalyticsService for RecordingAnalytics {
    fn log_event(&self, name: &str) {
        self.events.lock().push(name.to_owned());
    }
}

/// Bundle of doubles with typed handles, convertible to [`AppServices`].
#[derive(Debug, Clone)]
pub struct TestServices {
    /// Sync double
    pub sync: Arc<RecordingRunner>,
    /// Scheduling double
    pub scheduling: Arc<RecordingRunner>,
    /// Feedback double
    pub feedback: Arc<ScriptedFeedbackService>,
    /// Settings store
    pub settings: Arc<SettingsStore>,
    /// Analytics double
    pub analytics: Arc<RecordingAnalytics>,
    failing_settings: Option<Arc<FailingSettingsGateway>>,
}

impl TestServices {
    /// No pending feedback, default settings, well-behaved background services.
    pub fn new() -> Self {
        Self {
            sync: Arc::new(RecordingRunner::default()),
            scheduling: Arc::new(RecordingRunner::default()),
            feedback: Arc::new(ScriptedFeedbackService::default()),
            settings: Arc::new(SettingsStore::default()),
            analytics: Arc::new(RecordingAnalytics::default()),
            failing_settings: None,
        }
    }

    /// Replace the pending feedback candidates.
    pub fn with_candidates(mut self, candidates: impl IntoIterator<Item = FeedbackCandidate>) -> Self {
        self.feedback = Arc::new(ScriptedFeedbackService::new(candidates));
        self
    }

    /// Start from `snapshot`.
    pub fn with_settings(mut self, snapshot: SettingsSnapshot) -> Self {
        self.settings = Arc::new(SettingsStore::new(snapshot));
        self
    }

    /// Use `runner` for synchronization.
    pub fn with_sync(mut self, runner: RecordingRunner) -> Self {
        self.sync = Arc::new(runner);
        self
    }

    /// Route settings through a gateway that always fails.
    pub fn with_failing_settings(mut self) -> Self {
        self.failing_settings = Some(Arc::new(FailingSettingsGateway::default()));
        self
    }

    /// The failing gateway, when installed.
    pub fn failing_settings(&self) -> Option<&Arc<FailingSettingsGateway>> {
        self.failing_settings.as_ref()
    }

    /// Services to hand to the view-models.
    pub fn services(&self) -> AppServices {
        let settings: Arc<dyn SettingsGateway> = match &self.failing_settings {
            Some(failing) => failing.clone(),
            None => self.settings.clone(),
        };
        AppServices {
            sync: self.sync.clone(),
            scheduling: self.scheduling.clone(),
            feedback: self.feedback.clone(),
            settings,
            analytics: self.analytics.clone(),
        }
    }
}

impl Default for TestServices {
    fn default() -> Self {
        Self::new()
    }
}
