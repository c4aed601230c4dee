//! Common fixtures.

use std::time::Duration;

use companion_app::config::{AppConfig, FeedbackConfig, LifecycleConfig, SupervisorConfig};
use companion_app::{FeedbackCandidate, SettingsSnapshot};

/// Candidate for `id` with a generated title.
pub fn candidate(id: &str) -> FeedbackCandidate {
    FeedbackCandidate::new(id, format!("Session {id}"))
}

/// Settings with the feedback toggle set to `enabled` and defaults elsewhere.
pub fn settings_with_feedback(enabled: bool) -> SettingsSnapshot {
    SettingsSnapshot {
        is_feedback_enabled: enabled,
        ..SettingsSnapshot::default()
    }
}

/// Configuration with short timings suitable for tests.
pub fn test_config() -> AppConfig {
    AppConfig {
        lifecycle: LifecycleConfig {
            cancel_grace_ms: 100,
        },
        supervisor: SupervisorConfig {
            base_backoff_ms: 10,
            max_backoff_ms: 40,
        },
        ..AppConfig::default()
    }
}

/// [`test_config`] with the close-disables-for-session rule turned on.
pub fn session_disabling_config() -> AppConfig {
    AppConfig {
        feedback: FeedbackConfig {
            close_disables_for_session: true,
        },
        ..test_config()
    }
}

/// Default upper bound for [`wait_until`](crate::wait_until).
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
