//! Presentable feedback dialog.

use std::sync::Weak;

use super::workflow::{FeedbackWorkflow, WorkflowState};
use crate::domain::{Feedback, FeedbackCandidate};

/// What the UI renders while the workflow is presenting.
///
/// The actions route back into the workflow. Once the dialog is resolved
/// (or replaced) its actions become no-ops, so a double tap cannot record
/// feedback twice or open two dialogs.
#[derive(Clone)]
pub struct FeedbackDialog {
    candidate: FeedbackCandidate,
    presentation: u64,
    workflow: Weak<FeedbackWorkflow>,
}

impl FeedbackDialog {
    pub(crate) fn new(
        candidate: FeedbackCandidate,
        presentation: u64,
        workflow: Weak<FeedbackWorkflow>,
    ) -> Self {
        Self {
            candidate,
            presentation,
            workflow,
        }
    }

    /// Session the dialog asks about.
    pub fn candidate(&self) -> &FeedbackCandidate {
        &self.candidate
    }

    /// Identifier of this presentation.
    pub fn presentation(&self) -> u64 {
        self.presentation
    }

    /// Submit feedback and continue with the next candidate.
    pub async fn submit(&self, feedback: Feedback) -> WorkflowState {
        match self.workflow.upgrade() {
            Some(workflow) => workflow.submit(self.presentation, feedback).await,
            None => WorkflowState::Idle,
        }
    }

    /// Skip this session and continue with the next candidate.
    pub async fn skip(&self) -> WorkflowState {
        match self.workflow.upgrade() {
            Some(workflow) => workflow.skip(self.presentation).await,
            None => WorkflowState::Idle,
        }
    }

    /// Close the dialog and stop prompting automatically.
    pub async fn close_and_disable(&self) -> WorkflowState {
        match self.workflow.upgrade() {
            Some(workflow) => workflow.close_and_disable(self.presentation).await,
            None => WorkflowState::Idle,
        }
    }
}

impl PartialEq for FeedbackDialog {
    fn eq(&self, other: &Self) -> bool {
        self.presentation == other.presentation && self.candidate == other.candidate
    }
}

impl Eq for FeedbackDialog {}

impl std::fmt::Debug for FeedbackDialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackDialog")
            .field("session_id", &self.candidate.session_id)
            .field("title", &self.candidate.session.title)
            .field("presentation", &self.presentation)
            .finish()
    }
}
