//! Root view-model behaviour across attach/detach cycles.

use std::time::Duration;

use assert_matches::assert_matches;
use companion_app::services::{NotificationHandler, EVENT_STARTED};
use companion_app::{
    AppConfig, Application, ApplicationViewModel, AttachmentState, ConfigError, NotificationKind,
    SettingsSnapshot, SupervisorStatus,
};
use companion_testkit::*;

fn launch(kit: &TestServices) -> std::sync::Arc<ApplicationViewModel> {
    init_test_tracing();
    Application::launch(test_config(), kit.services()).unwrap()
}

#[tokio::test]
async fn launch_logs_started_once() {
    let kit = TestServices::new();
    let app = launch(&kit);

    app.on_attach();
    app.on_detach();
    app.on_attach();

    assert_eq!(kit.analytics.count(EVENT_STARTED), 1);
    assert_eq!(kit.analytics.events(), vec![EVENT_STARTED.to_string()]);
}

#[tokio::test]
async fn launch_rejects_invalid_config() {
    let kit = TestServices::new();
    let mut config = test_config();
    config.supervisor.base_backoff_ms = 1_000;
    config.supervisor.max_backoff_ms = 10;

    let result = Application::launch(config, kit.services());

    assert_matches!(result, Err(ConfigError::Invalid(_)));
    assert!(kit.analytics.events().is_empty());
}

#[tokio::test]
async fn splash_is_hidden_once() {
    let app = launch(&TestServices::new());
    let splash = app.show_splash_screen();
    assert!(splash.get());

    assert!(app.did_show_splash_screen());
    assert!(!app.did_show_splash_screen());
    assert!(!splash.get());
}

#[tokio::test]
async fn supervisors_run_once_per_attachment() {
    let kit = TestServices::new();
    let app = launch(&kit);
    settle().await;
    assert_eq!(kit.sync.started(), 0);

    app.on_attach();
    wait_until(|| kit.sync.started() == 1 && kit.scheduling.started() == 1).await;
    assert_matches!(app.sync_status().get(), SupervisorStatus::Running { epoch: 1, .. });

    app.on_detach();
    wait_until(|| kit.sync.cancelled() == 1 && kit.scheduling.cancelled() == 1).await;
    wait_until(|| app.sync_status().get() == SupervisorStatus::Stopped).await;

    app.on_attach();
    wait_until(|| kit.sync.started() == 2).await;
    assert_eq!(kit.sync.epochs(), vec![1, 2]);
    assert_eq!(kit.scheduling.started(), 2);
}

#[tokio::test]
async fn repeated_attach_does_not_duplicate_supervisors() {
    let kit = TestServices::new();
    let app = launch(&kit);

    app.on_attach();
    app.on_attach();
    wait_until(|| kit.sync.started() >= 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(kit.sync.started(), 1);
    assert_eq!(app.lifecycle().epoch(), 1);
}

#[tokio::test]
async fn failing_sync_is_restarted_without_disturbing_feedback() {
    let kit = TestServices::new()
        .with_sync(RecordingRunner::failing_first(2))
        .with_candidates([candidate("S1")]);
    let app = launch(&kit);

    app.on_attach();
    wait_until(|| kit.sync.started() == 3).await;
    wait_until(|| app.presented_feedback().is_some()).await;

    assert_matches!(app.sync_status().get(), SupervisorStatus::Running { restarts: 2, .. });
    assert!(app.lifecycle().is_attached());
    assert_eq!(kit.scheduling.started(), 1);
}

#[tokio::test]
async fn renderer_flag_follows_settings_while_attached() {
    let kit = TestServices::new().with_settings(SettingsSnapshot {
        use_alternate_renderer: true,
        ..SettingsSnapshot::default()
    });
    let app = launch(&kit);
    let renderer = app.use_alternate_renderer();
    assert!(renderer.get());

    app.on_attach();
    settle().await;
    kit.settings.update(|current| SettingsSnapshot {
        use_alternate_renderer: false,
        ..current.clone()
    });
    wait_until(|| !renderer.get()).await;

    app.on_detach();
    settle().await;
    kit.settings.update(|current| SettingsSnapshot {
        use_alternate_renderer: true,
        ..current.clone()
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!renderer.get());

    app.on_attach();
    wait_until(|| renderer.get()).await;
}

#[tokio::test]
async fn feature_lifecycles_follow_the_root() {
    let app = launch(&TestServices::new());
    let features = [app.schedule(), app.agenda(), app.sponsors(), app.settings()];
    assert!(features.iter().all(|vm| !vm.lifecycle().is_attached()));

    app.on_attach();
    assert!(features.iter().all(|vm| vm.lifecycle().is_attached()));
    assert_eq!(app.lifecycle().observe().get(), AttachmentState::Attached);

    app.on_detach();
    assert!(features
        .iter()
        .all(|vm| vm.lifecycle().state() == AttachmentState::Detached));
}

#[tokio::test]
async fn reminder_notifications_are_ignored() {
    let kit = TestServices::new()
        .with_settings(settings_with_feedback(false))
        .with_candidates([candidate("S1")]);
    let app = launch(&kit);
    app.on_attach();

    app.notification_received("S1".into(), NotificationKind::Reminder);
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_no_dialog!(app);
    assert!(app.feedback_workflow().pending_notifications().is_empty());
}

#[tokio::test]
async fn appear_rechecks_after_toggle_is_enabled() {
    let kit = TestServices::new()
        .with_settings(settings_with_feedback(false))
        .with_candidates([candidate("S1")]);
    let app = launch(&kit);
    app.on_attach();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_no_dialog!(app);

    kit.settings.replace(settings_with_feedback(true));
    app.on_appear();

    wait_until(|| app.presented_feedback().is_some()).await;
    assert_presenting!(app, "S1");
}

#[tokio::test]
async fn default_config_launches() {
    let kit = TestServices::new();
    let app = Application::launch(AppConfig::default(), kit.services()).unwrap();
    assert_eq!(app.lifecycle().state(), AttachmentState::Detached);
}
