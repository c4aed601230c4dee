//! The feedback presentation state machine.
//!
//! ```text
//!            evaluate                 next() = Some
//!   Idle ─────────────▶ Evaluating ─────────────────▶ Presenting(c)
//!    ▲                      │                             │
//!    │  toggle off / none / │                             │ submit / skip
//!    │  failure / detach    │                             ▼
//!    └──────────────────────┘◀──────────────────── Evaluating (chained)
//!
//!   close_and_disable: Presenting(c) ─▶ Idle (or Disabled when configured)
//! ```
//!
//! All visible transitions happen under one short lock that is never held
//! across an `.await`; the I/O in between runs unlocked and its result is
//! committed only if no newer evaluation started meanwhile and the
//! attachment period is still live.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use companion_core::effects::CancellationToken;
use companion_core::reactive::Dynamic;
use companion_core::SessionId;
use parking_lot::Mutex;

use super::dialog::FeedbackDialog;
use crate::config::FeedbackConfig;
use crate::domain::{Feedback, FeedbackCandidate};
use crate::lifecycle::{AttachmentToken, Lifecycle};
use crate::services::{FeedbackService, SettingsGateway};

/// Where the workflow currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// No dialog shown, nothing in flight
    Idle,
    /// Fetching the next candidate (or recording an action before doing so)
    Evaluating,
    /// A dialog is visible
    Presenting {
        /// The session being asked about
        candidate: FeedbackCandidate,
        /// Identifies this particular presentation
        presentation: u64,
    },
    /// Feedback turned off for the rest of the session; only opened
    /// notifications surface a dialog
    Disabled,
}

impl WorkflowState {
    /// Session of the visible dialog, if any.
    pub fn presented_session(&self) -> Option<&SessionId> {
        match self {
            Self::Presenting { candidate, .. } => Some(&candidate.session_id),
            _ => None,
        }
    }
}

/// Why an evaluation was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationTrigger {
    /// The screen appeared; honours the feedback toggle
    Appear,
    /// A dialog was resolved by submit or skip
    Chained,
    /// The user opened a feedback notification for this session; bypasses the toggle
    Notification(SessionId),
}

enum Outcome {
    Present(FeedbackCandidate),
    Rest,
}

/// The evaluation currently owning `Evaluating`.
struct Flight {
    target: Option<SessionId>,
    token: Option<AttachmentToken>,
}

struct Inner {
    state: WorkflowState,
    generation: u64,
    flight: Option<Flight>,
    pending: VecDeque<SessionId>,
    disabled_for_session: bool,
}

impl Inner {
    fn resting(&self) -> WorkflowState {
        if self.disabled_for_session {
            WorkflowState::Disabled
        } else {
            WorkflowState::Idle
        }
    }

    fn enqueue(&mut self, session_id: SessionId) {
        if self.state.presented_session() == Some(&session_id) {
            return;
        }
        if !self.pending.contains(&session_id) {
            self.pending.push_back(session_id);
        }
    }

    fn in_flight(&self) -> Option<&SessionId> {
        match (&self.state, &self.flight) {
            (WorkflowState::Evaluating, Some(flight)) => flight.target.as_ref(),
            _ => None,
        }
    }

    /// Whether the running evaluation belongs to an attachment that is still live.
    fn flight_is_live(&self) -> bool {
        self.flight
            .as_ref()
            .and_then(|flight| flight.token.as_ref())
            .is_some_and(|token| !token.is_cancelled())
    }

    fn requeue(&mut self, target: Option<SessionId>) {
        if let Some(session_id) = target {
            if self.state.presented_session() != Some(&session_id)
                && self.in_flight() != Some(&session_id)
                && !self.pending.contains(&session_id)
            {
                self.pending.push_front(session_id);
            }
        }
    }

    fn begin(&mut self, target: Option<SessionId>, token: Option<AttachmentToken>) -> u64 {
        self.generation += 1;
        self.state = WorkflowState::Evaluating;
        self.flight = Some(Flight { target, token });
        self.generation
    }

    fn owns(&self, generation: u64) -> bool {
        self.generation == generation && self.state == WorkflowState::Evaluating
    }

    fn settle(&mut self, state: WorkflowState) {
        self.flight = None;
        self.state = state;
    }
}

/// Sequential feedback prompts.
pub struct FeedbackWorkflow {
    lifecycle: Weak<Lifecycle>,
    feedback: Arc<dyn FeedbackService>,
    settings: Arc<dyn SettingsGateway>,
    config: FeedbackConfig,
    inner: Mutex<Inner>,
    dialog: Dynamic<Option<FeedbackDialog>>,
    this: Weak<FeedbackWorkflow>,
}

impl FeedbackWorkflow {
    /// Create an idle workflow whose chained evaluations run while `lifecycle` is attached.
    pub fn new(
        lifecycle: &Arc<Lifecycle>,
        feedback: Arc<dyn FeedbackService>,
        settings: Arc<dyn SettingsGateway>,
        config: FeedbackConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            lifecycle: Arc::downgrade(lifecycle),
            feedback,
            settings,
            config,
            inner: Mutex::new(Inner {
                state: WorkflowState::Idle,
                generation: 0,
                flight: None,
                pending: VecDeque::new(),
                disabled_for_session: false,
            }),
            dialog: Dynamic::new(None),
            this: this.clone(),
        })
    }

    /// Current state.
    pub fn state(&self) -> WorkflowState {
        self.inner.lock().state.clone()
    }

    /// Observable dialog; `None` when nothing should be shown.
    pub fn dialog(&self) -> Dynamic<Option<FeedbackDialog>> {
        self.dialog.clone()
    }

    /// Opened notifications waiting for the visible dialog to resolve.
    pub fn pending_notifications(&self) -> Vec<SessionId> {
        self.inner.lock().pending.iter().cloned().collect()
    }

    /// Remember an opened feedback notification until an evaluation serves it.
    pub fn queue_notification(&self, session_id: SessionId) {
        self.inner.lock().enqueue(session_id);
    }

    /// Decide whether a dialog should be shown and show it.
    ///
    /// Returns the state the evaluation left the workflow in.
    pub async fn evaluate(
        &self,
        trigger: EvaluationTrigger,
        token: &AttachmentToken,
    ) -> WorkflowState {
        let (generation, target) = {
            let mut inner = self.inner.lock();
            let is_notification = matches!(trigger, EvaluationTrigger::Notification(_));
            if let EvaluationTrigger::Notification(session_id) = &trigger {
                inner.enqueue(session_id.clone());
            }
            match &inner.state {
                WorkflowState::Presenting { .. } => {
                    tracing::debug!(?trigger, "dialog already presented, evaluation skipped");
                    return inner.state.clone();
                }
                WorkflowState::Evaluating if !is_notification && inner.flight_is_live() => {
                    return WorkflowState::Evaluating;
                }
                WorkflowState::Evaluating => {
                    // Superseded; its request goes back to the queue before we pick.
                    let stale = inner.flight.take().and_then(|flight| flight.target);
                    inner.requeue(stale);
                }
                _ => {}
            }
            let target = inner.pending.pop_front();
            if target.is_none() && inner.disabled_for_session {
                // Also retires a stale evaluation still in flight.
                inner.generation += 1;
                inner.settle(WorkflowState::Disabled);
                return WorkflowState::Disabled;
            }
            (inner.begin(target.clone(), Some(token.clone())), target)
        };

        tracing::debug!(?trigger, generation, "evaluating feedback");
        self.run(generation, target, Some(token)).await
    }

    /// Record `feedback` for the presented candidate and move on to the next one.
    pub async fn submit(&self, presentation: u64, feedback: Feedback) -> WorkflowState {
        let Some((generation, candidate)) = self.take_presented(presentation) else {
            return self.state();
        };
        let guard = EvaluationGuard::new(self, generation, None);
        if let Err(e) = self.feedback.submit(&candidate, feedback).await {
            tracing::warn!(session_id = %candidate.session_id, error = %e, "feedback submission failed");
        }
        guard.disarm();
        self.chain(generation).await
    }

    /// Mark the presented candidate skipped and move on to the next one.
    pub async fn skip(&self, presentation: u64) -> WorkflowState {
        let Some((generation, candidate)) = self.take_presented(presentation) else {
            return self.state();
        };
        let guard = EvaluationGuard::new(self, generation, None);
        if let Err(e) = self.feedback.skip(&candidate).await {
            tracing::warn!(session_id = %candidate.session_id, error = %e, "feedback skip failed");
        }
        guard.disarm();
        self.chain(generation).await
    }

    /// Turn automatic prompts off and hide the dialog. Idempotent.
    ///
    /// Ignored while another dialog is shown or an evaluation is running.
    pub async fn close_and_disable(&self, presentation: u64) -> WorkflowState {
        {
            let inner = self.inner.lock();
            let current = match &inner.state {
                WorkflowState::Presenting {
                    presentation: current,
                    ..
                } => *current == presentation,
                WorkflowState::Idle | WorkflowState::Disabled => true,
                WorkflowState::Evaluating => false,
            };
            if !current {
                tracing::debug!(presentation, state = ?inner.state, "close on a dialog that is no longer shown");
                return inner.state.clone();
            }
        }

        // Written before hiding so a concurrent appear cannot slip in with the old toggle.
        if let Err(e) = self.settings.set_feedback_enabled(false).await {
            tracing::warn!(error = %e, "failed to persist disabled feedback toggle");
        }

        let mut inner = self.inner.lock();
        inner.pending.clear();
        if self.config.close_disables_for_session {
            inner.disabled_for_session = true;
        }
        let hide = match &inner.state {
            WorkflowState::Presenting {
                presentation: current,
                ..
            } => *current == presentation,
            WorkflowState::Idle | WorkflowState::Disabled => true,
            WorkflowState::Evaluating => false,
        };
        if hide {
            let resting = inner.resting();
            inner.settle(resting);
            self.dialog.set_if_changed(None);
        }
        tracing::info!(state = ?inner.state, "feedback prompts disabled by user");
        inner.state.clone()
    }

    fn take_presented(&self, presentation: u64) -> Option<(u64, FeedbackCandidate)> {
        let token = self.attachment_token();
        let mut inner = self.inner.lock();
        let candidate = match &inner.state {
            WorkflowState::Presenting {
                candidate,
                presentation: current,
            } if *current == presentation => candidate.clone(),
            state => {
                tracing::debug!(presentation, ?state, "action on a dialog that is no longer shown");
                return None;
            }
        };
        let generation = inner.begin(None, token);
        self.dialog.set_if_changed(None);
        Some((generation, candidate))
    }

    fn attachment_token(&self) -> Option<AttachmentToken> {
        self.lifecycle
            .upgrade()
            .and_then(|lifecycle| lifecycle.attachment_token())
    }

    async fn chain(&self, generation: u64) -> WorkflowState {
        let token = self.attachment_token();
        let target = {
            let mut inner = self.inner.lock();
            if !inner.owns(generation) {
                return inner.state.clone();
            }
            if token.is_none() {
                tracing::debug!(generation, "detached, next feedback deferred to the next appear");
                let resting = inner.resting();
                inner.settle(resting);
                return inner.state.clone();
            }
            let target = inner.pending.pop_front();
            if target.is_none() && inner.disabled_for_session {
                inner.settle(WorkflowState::Disabled);
                return WorkflowState::Disabled;
            }
            inner.flight = Some(Flight {
                target: target.clone(),
                token: token.clone(),
            });
            target
        };
        tracing::debug!(trigger = ?EvaluationTrigger::Chained, generation, "evaluating feedback");
        self.run(generation, target, token.as_ref()).await
    }

    async fn run(
        &self,
        generation: u64,
        target: Option<SessionId>,
        token: Option<&AttachmentToken>,
    ) -> WorkflowState {
        let guard = EvaluationGuard::new(self, generation, target.clone());
        let outcome = match &target {
            Some(session_id) => self.fetch_requested(session_id).await,
            None => self.fetch_next_if_enabled().await,
        };
        guard.disarm();
        self.commit(generation, target, outcome, token)
    }

    async fn fetch_requested(&self, session_id: &SessionId) -> Outcome {
        match self.feedback.candidate(session_id).await {
            Ok(Some(candidate)) => return Outcome::Present(candidate),
            Ok(None) => {
                tracing::debug!(%session_id, "requested session has no pending feedback, using next");
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "feedback lookup failed");
                return Outcome::Rest;
            }
        }
        self.fetch_next().await
    }

    async fn fetch_next_if_enabled(&self) -> Outcome {
        match self.settings.settings().await {
            Ok(settings) if settings.is_feedback_enabled => self.fetch_next().await,
            Ok(_) => Outcome::Rest,
            Err(e) => {
                tracing::warn!(error = %e, "settings unavailable, treating feedback as disabled");
                Outcome::Rest
            }
        }
    }

    async fn fetch_next(&self) -> Outcome {
        match self.feedback.next().await {
            Ok(Some(candidate)) => Outcome::Present(candidate),
            Ok(None) => Outcome::Rest,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch next feedback candidate");
                Outcome::Rest
            }
        }
    }

    fn commit(
        &self,
        generation: u64,
        target: Option<SessionId>,
        outcome: Outcome,
        token: Option<&AttachmentToken>,
    ) -> WorkflowState {
        let mut inner = self.inner.lock();
        if !inner.owns(generation) {
            // Superseded by a newer evaluation; keep the request for later.
            inner.requeue(target);
            return inner.state.clone();
        }
        if token.map_or(true, |token| token.is_cancelled()) {
            tracing::debug!(generation, "evaluation outlived its attachment, discarded");
            inner.flight = None;
            inner.requeue(target);
            let resting = inner.resting();
            inner.settle(resting);
            return inner.state.clone();
        }

        match outcome {
            Outcome::Present(candidate) => {
                tracing::info!(session_id = %candidate.session_id, "presenting feedback dialog");
                inner.pending.retain(|queued| queued != &candidate.session_id);
                inner.flight = None;
                self.dialog.set(Some(FeedbackDialog::new(
                    candidate.clone(),
                    generation,
                    self.this.clone(),
                )));
                inner.state = WorkflowState::Presenting {
                    candidate,
                    presentation: generation,
                };
            }
            Outcome::Rest => {
                let resting = inner.resting();
                inner.settle(resting);
                self.dialog.set_if_changed(None);
            }
        }
        inner.state.clone()
    }
}

impl std::fmt::Debug for FeedbackWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FeedbackWorkflow")
            .field("state", &inner.state)
            .field("pending", &inner.pending)
            .finish_non_exhaustive()
    }
}

/// Returns an abandoned evaluation to rest if its future is dropped mid-flight.
struct EvaluationGuard<'a> {
    workflow: &'a FeedbackWorkflow,
    generation: u64,
    target: Option<SessionId>,
    armed: bool,
}

impl<'a> EvaluationGuard<'a> {
    fn new(workflow: &'a FeedbackWorkflow, generation: u64, target: Option<SessionId>) -> Self {
        Self {
            workflow,
            generation,
            target,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.workflow.inner.lock();
        if inner.owns(self.generation) {
            tracing::debug!(generation = self.generation, "evaluation dropped before completion");
            inner.flight = None;
            inner.requeue(self.target.take());
            let resting = inner.resting();
            inner.settle(resting);
        }
    }
}
