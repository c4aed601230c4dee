//! Scoped task semantics observed through the public lifecycle API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use companion_app::config::LifecycleConfig;
use companion_app::{AttachmentState, AttachmentToken, Lifecycle, TaskMode};
use companion_core::effects::CancellationToken;
use companion_core::{CompanionError, CompanionResult};
use companion_testkit::*;
use futures::future::{ready, Ready};

fn lifecycle() -> Lifecycle {
    init_test_tracing();
    Lifecycle::new("integration", &LifecycleConfig { cancel_grace_ms: 50 })
}

fn counting(
    counter: &Arc<AtomicUsize>,
) -> impl Fn(AttachmentToken) -> Ready<CompanionResult<()>> + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        ready(Ok(()))
    }
}

#[tokio::test]
async fn once_task_registered_while_detached_runs_on_next_attach() {
    let lifecycle = lifecycle();
    let runs = Arc::new(AtomicUsize::new(0));
    let handle = lifecycle.once_attached("deferred", counting(&runs));

    settle().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(handle.is_registered());

    lifecycle.attach();
    wait_until(|| runs.load(Ordering::SeqCst) == 1).await;
    wait_until(|| !handle.is_registered()).await;
}

#[tokio::test]
async fn once_task_cancelled_mid_run_is_retried_next_attachment() {
    let lifecycle = lifecycle();
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = starts.clone();
    let handle = lifecycle.once_attached("interrupted", move |token| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            token.cancelled().await;
            Err(CompanionError::cancelled("detached"))
        }
    });

    lifecycle.attach();
    wait_until(|| starts.load(Ordering::SeqCst) == 1).await;
    lifecycle.detach();
    settle().await;
    assert!(handle.is_registered());

    lifecycle.attach();
    wait_until(|| starts.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test]
async fn registering_a_key_again_replaces_the_running_instance() {
    let lifecycle = lifecycle();
    let cancelled = Arc::new(AtomicUsize::new(0));
    let flag = cancelled.clone();
    let first = lifecycle.while_attached("worker", move |token| {
        let flag = flag.clone();
        async move {
            token.cancelled().await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    lifecycle.attach();
    settle().await;

    let runs = Arc::new(AtomicUsize::new(0));
    let second = lifecycle.register("worker", TaskMode::Persistent, counting(&runs));

    wait_until(|| cancelled.load(Ordering::SeqCst) == 1).await;
    wait_until(|| runs.load(Ordering::SeqCst) == 1).await;
    assert!(!first.is_registered());
    assert!(second.is_registered());
}

#[tokio::test]
async fn attach_then_immediate_detach_runs_nothing() {
    let lifecycle = lifecycle();
    let runs = Arc::new(AtomicUsize::new(0));
    lifecycle.while_attached("ticker", counting(&runs));

    lifecycle.attach();
    lifecycle.detach();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(lifecycle.running_tasks(), 0);
}

#[tokio::test]
async fn observed_state_tracks_transitions() {
    let lifecycle = lifecycle();
    let observed = lifecycle.observe();
    let mut subscription = observed.subscribe();
    assert_eq!(subscription.get(), AttachmentState::Detached);

    lifecycle.attach();
    assert_eq!(subscription.poll(), Some(AttachmentState::Attached));
    lifecycle.detach();
    assert_eq!(subscription.poll(), Some(AttachmentState::Detached));
    assert_eq!(subscription.poll(), None);
    assert_eq!(lifecycle.epoch(), 1);
}

#[tokio::test]
async fn token_outlives_its_period_as_cancelled() {
    let lifecycle = lifecycle();
    lifecycle.attach();
    let token = lifecycle.attachment_token().unwrap();
    assert!(!token.is_cancelled());

    lifecycle.detach();
    lifecycle.attach();

    assert!(token.is_cancelled());
    within_timeout(token.cancelled()).await;
    let fresh = lifecycle.attachment_token().unwrap();
    assert_eq!(fresh.epoch(), 2);
    assert!(!fresh.is_cancelled());
}
