//! # Feedback Workflow
//!
//! Pulls pending feedback requests one at a time and turns them into a
//! presentable [`FeedbackDialog`]. The user's answer (submit, skip, or
//! close-and-disable) decides whether the workflow chains to the next
//! candidate, stops, or turns automatic prompts off.
//!
//! Evaluation honours the `is_feedback_enabled` setting, with one exception:
//! a feedback notification the user opened always surfaces its dialog.

mod dialog;
mod workflow;

pub use dialog::FeedbackDialog;
pub use workflow::{EvaluationTrigger, FeedbackWorkflow, WorkflowState};
