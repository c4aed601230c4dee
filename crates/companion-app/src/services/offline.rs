//! In-memory service implementations for running without a backend.

use std::collections::VecDeque;

use async_trait::async_trait;
use companion_core::effects::CancellationToken;
use companion_core::{CompanionResult, SessionId};
use parking_lot::Mutex;

use super::{AnalyticsService, FeedbackService, NotificationSchedulingService, SyncService};
use crate::domain::{Feedback, FeedbackCandidate};
use crate::lifecycle::AttachmentToken;

/// Feedback source backed by a queue of candidates.
///
/// A candidate stays pending until it is submitted or skipped.
#[derive(Debug, Default)]
pub struct InMemoryFeedbackService {
    pending: Mutex<VecDeque<FeedbackCandidate>>,
    submitted: Mutex<Vec<(SessionId, Feedback)>>,
}

impl InMemoryFeedbackService {
    /// Service with `candidates` pending, in order.
    pub fn new(candidates: impl IntoIterator<Item = FeedbackCandidate>) -> Self {
        Self {
            pending: Mutex::new(candidates.into_iter().collect()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Add a candidate at the back of the queue.
    pub fn push(&self, candidate: FeedbackCandidate) {
        self.pending.lock().push_back(candidate);
    }

    /// Feedback recorded so far.
    pub fn submitted(&self) -> Vec<(SessionId, Feedback)> {
        self.submitted.lock().clone()
    }

    fn remove(&self, session_id: &SessionId) {
        self.pending
            .lock()
            .retain(|candidate| &candidate.session_id != session_id);
    }
}

#[async_trait]
impl FeedbackService for InMemoryFeedbackService {
    async fn next(&self) -> CompanionResult<Option<FeedbackCandidate>> {
        Ok(self.pending.lock().front().cloned())
    }

    async fn candidate(&self, session_id: &SessionId) -> CompanionResult<Option<FeedbackCandidate>> {
        Ok(self
            .pending
            .lock()
            .iter()
            .find(|candidate| &candidate.session_id == session_id)
            .cloned())
    }

    async fn submit(&self, candidate: &FeedbackCandidate, feedback: Feedback) -> CompanionResult<()> {
        self.remove(&candidate.session_id);
        self.submitted
            .lock()
            .push((candidate.session_id.clone(), feedback));
        Ok(())
    }

    async fn skip(&self, candidate: &FeedbackCandidate) -> CompanionResult<()> {
        self.remove(&candidate.session_id);
        Ok(())
    }
}

/// Sync service with nothing to synchronize; parks until cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleSyncService;

#[async_trait]
impl SyncService for IdleSyncService {
    async fn run_synchronization(&self, token: AttachmentToken) -> CompanionResult<()> {
        token.cancelled().await;
        Ok(())
    }
}

/// Scheduling service with nothing to schedule; parks until cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleSchedulingService;

#[async_trait]
impl NotificationSchedulingService for IdleSchedulingService {
    async fn run_scheduling(&self, token: AttachmentToken) -> CompanionResult<()> {
        token.cancelled().await;
        Ok(())
    }
}

/// Analytics sink that writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsService for TracingAnalytics {
    fn log_event(&self, name: &str) {
        tracing::info!(event = name, "analytics event");
    }
}
