//! # Service Contracts
//!
//! Narrow interfaces to the collaborators the orchestration core drives.
//! Network and storage implementations live outside this crate; they are
//! injected as `Arc<dyn Trait>` through [`AppServices`] and outlive the
//! view-models that use them.
//!
//! [`offline`] holds in-memory implementations used by the host binary and
//! by frontends running without a backend.

pub mod offline;

use std::sync::Arc;

use async_trait::async_trait;
use companion_core::{CompanionResult, SessionId};
use futures::stream::BoxStream;

use crate::domain::{Feedback, FeedbackCandidate, NotificationKind, SettingsSnapshot};
use crate::lifecycle::AttachmentToken;

/// Keeps local schedule data in sync with the backend.
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Run synchronization until `token` fires.
    ///
    /// Implementations loop over sync passes and return at the next pass
    /// boundary once cancelled. Returning an error (or returning early
    /// without cancellation) makes the supervisor restart the run after a
    /// backoff.
    async fn run_synchronization(&self, token: AttachmentToken) -> CompanionResult<()>;
}

/// Keeps local reminder/feedback notifications in line with the agenda.
#[async_trait]
pub trait NotificationSchedulingService: Send + Sync {
    /// Run scheduling until `token` fires. Same contract as
    /// [`SyncService::run_synchronization`].
    async fn run_scheduling(&self, token: AttachmentToken) -> CompanionResult<()>;
}

/// Source of pending feedback requests.
#[async_trait]
pub trait FeedbackService: Send + Sync {
    /// Next session awaiting feedback, if any.
    async fn next(&self) -> CompanionResult<Option<FeedbackCandidate>>;

    /// The pending candidate for `session_id`, if it still awaits feedback.
    async fn candidate(&self, session_id: &SessionId) -> CompanionResult<Option<FeedbackCandidate>>;

    /// Record feedback for `candidate`.
    async fn submit(&self, candidate: &FeedbackCandidate, feedback: Feedback) -> CompanionResult<()>;

    /// Record that the attendee skipped `candidate`.
    async fn skip(&self, candidate: &FeedbackCandidate) -> CompanionResult<()>;
}

/// Access to the user's settings.
#[async_trait]
pub trait SettingsGateway: Send + Sync {
    /// Current settings.
    async fn settings(&self) -> CompanionResult<SettingsSnapshot>;

    /// Stream of snapshots, starting with the current one.
    fn subscribe(&self) -> BoxStream<'static, SettingsSnapshot>;

    /// Turn automatic feedback prompts on or off.
    async fn set_feedback_enabled(&self, enabled: bool) -> CompanionResult<()>;
}

/// Fire-and-forget analytics sink.
pub trait AnalyticsService: Send + Sync {
    /// Record a named event.
    fn log_event(&self, name: &str);
}

/// Receives notifications the user opened from the platform notification center.
pub trait NotificationHandler: Send + Sync {
    /// Called once per opened notification.
    fn notification_received(&self, session_id: SessionId, kind: NotificationKind);
}

/// Analytics event logged once per process start.
pub const EVENT_STARTED: &str = "app_started";

/// Every collaborator the root view-model needs.
#[derive(Clone)]
pub struct AppServices {
    /// Schedule synchronization
    pub sync: Arc<dyn SyncService>,
    /// Notification scheduling
    pub scheduling: Arc<dyn NotificationSchedulingService>,
    /// Feedback source
    pub feedback: Arc<dyn FeedbackService>,
    /// Settings gateway
    pub settings: Arc<dyn SettingsGateway>,
    /// Analytics sink
    pub analytics: Arc<dyn AnalyticsService>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices").finish_non_exhaustive()
    }
}
