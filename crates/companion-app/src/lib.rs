//! # Companion App - Portable Application Core
//!
//! Headless orchestration shared by every companion frontend. Platform
//! layers (Android, iOS) stay thin: they forward attach/detach, appear and
//! notification events into the [`ApplicationViewModel`] and render the
//! observable state it exposes.
//!
//! ## Architecture
//!
//! - [`lifecycle`]: attachment-scoped task supervision
//! - [`supervisors`]: restart loops for the sync and scheduling services
//! - [`feedback`]: the sequential feedback-presentation state machine
//! - [`settings`]: the reactive settings store
//! - [`views`]: the root view-model and its sub-feature view-models
//! - [`services`]: contracts of the injected collaborators
//!
//! ## Example
//!
//! ```rust,ignore
//! let app = Application::launch(AppConfig::default(), services)?;
//! app.on_attach();
//! if let Some(dialog) = app.presented_feedback() {
//!     dialog.submit(Feedback::new(Rating::Satisfied, "")).await;
//! }
//! app.on_detach();
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod feedback;
pub mod lifecycle;
pub mod services;
pub mod settings;
pub mod supervisors;
pub mod views;

mod app;

pub use app::Application;
pub use config::{AppConfig, ConfigError};
pub use domain::{
    Feedback, FeedbackCandidate, NotificationKind, Rating, SessionMetadata, SettingsSnapshot,
};
pub use feedback::{EvaluationTrigger, FeedbackDialog, FeedbackWorkflow, WorkflowState};
pub use lifecycle::{AttachmentState, AttachmentToken, Lifecycle, ScopedTaskHandle, TaskMode};
pub use services::AppServices;
pub use settings::SettingsStore;
pub use supervisors::{Supervisor, SupervisorStatus};
pub use views::{ApplicationViewModel, Feature, FeatureViewModel};
