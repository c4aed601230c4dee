//! Domain values shared by the services and the view-models.

use companion_core::SessionId;
use serde::{Deserialize, Serialize};

/// Immutable view of the user's settings.
///
/// Replaced wholesale on every update; consumers never mutate a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    /// Render with the alternate UI toolkit where the platform offers one
    pub use_alternate_renderer: bool,
    /// Whether the app prompts for session feedback on its own
    pub is_feedback_enabled: bool,
    /// Whether session reminders are scheduled
    pub is_reminders_enabled: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            use_alternate_renderer: false,
            is_feedback_enabled: true,
            is_reminders_enabled: true,
        }
    }
}

/// What the feedback dialog shows about a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session title
    pub title: String,
    /// Room the session took place in
    pub room: Option<String>,
    /// Speaker display names
    pub speakers: Vec<String>,
}

/// A session eligible for feedback, not yet submitted or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCandidate {
    /// Session the feedback is about
    pub session_id: SessionId,
    /// Display metadata
    pub session: SessionMetadata,
}

impl FeedbackCandidate {
    /// Candidate with only a title.
    pub fn new(session_id: impl Into<SessionId>, title: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            session: SessionMetadata {
                title: title.into(),
                ..SessionMetadata::default()
            },
        }
    }
}

/// How the attendee rated a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    /// Did not like it
    Dissatisfied,
    /// It was fine
    Normal,
    /// Liked it
    Satisfied,
}

/// Feedback submitted for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Overall rating
    pub rating: Rating,
    /// Free-form comment, possibly empty
    pub comment: String,
}

impl Feedback {
    /// Feedback with a rating and a comment.
    pub fn new(rating: Rating, comment: impl Into<String>) -> Self {
        Self {
            rating,
            comment: comment.into(),
        }
    }
}

/// Kind of a notification the user opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// "How was the session?" prompt
    Feedback,
    /// Session is about to start
    Reminder,
}
