//! Background Task Supervisors
//!
//! Wraps an indefinite service operation (schedule sync, notification
//! scheduling) in a restart loop bound to a [`Lifecycle`]. The service is
//! handed the attachment token and stops at its next unit-of-work boundary
//! once the lifecycle detaches. Failures are logged and retried with
//! exponential backoff; nothing a service does can terminate the lifecycle.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use companion_core::effects::CancellationToken;
use companion_core::reactive::Dynamic;
use companion_core::CompanionResult;
use serde::{Deserialize, Serialize};

use crate::config::{duration_ms, SupervisorConfig};
use crate::lifecycle::{AttachmentToken, Lifecycle, ScopedTaskHandle, TaskKey};
use crate::services::{NotificationSchedulingService, SyncService};

/// Observable state of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorStatus {
    /// Never started
    Idle,
    /// Service operation in flight
    Running {
        /// Attachment period the run belongs to
        epoch: u64,
        /// Restarts so far in this period
        restarts: u32,
    },
    /// Waiting before the next restart
    Backoff {
        /// Restart number about to happen
        attempt: u32,
        /// Delay before it
        delay_ms: u64,
    },
    /// Stopped by detach
    Stopped,
}

/// Restart loop for one background service.
#[derive(Debug)]
pub struct Supervisor {
    name: TaskKey,
    config: SupervisorConfig,
    status: Dynamic<SupervisorStatus>,
    latest_epoch: Arc<AtomicU64>,
}

impl Supervisor {
    /// Create an idle supervisor.
    pub fn new(name: TaskKey, config: SupervisorConfig) -> Self {
        Self {
            name,
            config,
            status: Dynamic::new(SupervisorStatus::Idle),
            latest_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Task key the supervisor registers under.
    pub fn name(&self) -> TaskKey {
        self.name
    }

    /// Observable status.
    pub fn status(&self) -> Dynamic<SupervisorStatus> {
        self.status.clone()
    }

    /// Register the supervised operation as a persistent task of `lifecycle`.
    pub fn register<R, Fut>(&self, lifecycle: &Lifecycle, run: R) -> ScopedTaskHandle
    where
        R: Fn(AttachmentToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CompanionResult<()>> + Send + 'static,
    {
        let name = self.name;
        let config = self.config.clone();
        let status = self.status.clone();
        let latest_epoch = self.latest_epoch.clone();
        let run = Arc::new(run);
        lifecycle.while_attached(name, move |token| {
            supervise(
                name,
                config.clone(),
                status.clone(),
                latest_epoch.clone(),
                run.clone(),
                token,
            )
        })
    }

    /// Supervise `service.run_synchronization()`.
    pub fn sync(
        lifecycle: &Lifecycle,
        service: Arc<dyn SyncService>,
        config: SupervisorConfig,
    ) -> Self {
        let supervisor = Self::new("sync", config);
        supervisor.register(lifecycle, move |token| {
            let service = service.clone();
            async move { service.run_synchronization(token).await }
        });
        supervisor
    }

    /// Supervise `service.run_scheduling()`.
    pub fn scheduling(
        lifecycle: &Lifecycle,
        service: Arc<dyn NotificationSchedulingService>,
        config: SupervisorConfig,
    ) -> Self {
        let supervisor = Self::new("notification-scheduling", config);
        supervisor.register(lifecycle, move |token| {
            let service = service.clone();
            async move { service.run_scheduling(token).await }
        });
        supervisor
    }
}

async fn supervise<R, Fut>(
    name: TaskKey,
    config: SupervisorConfig,
    status: Dynamic<SupervisorStatus>,
    latest_epoch: Arc<AtomicU64>,
    run: Arc<R>,
    token: AttachmentToken,
) -> CompanionResult<()>
where
    R: Fn(AttachmentToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CompanionResult<()>> + Send + 'static,
{
    let epoch = token.epoch();
    latest_epoch.fetch_max(epoch, Ordering::SeqCst);
    let mut restarts = 0u32;
    loop {
        if token.is_cancelled() {
            break;
        }
        status.set(SupervisorStatus::Running {
            epoch: token.epoch(),
            restarts,
        });
        tracing::debug!(supervisor = name, epoch = token.epoch(), restarts, "run started");

        let result = run(token.clone()).await;
        if token.is_cancelled() {
            break;
        }

        restarts = restarts.saturating_add(1);
        match result {
            Ok(()) => tracing::warn!(
                supervisor = name,
                attempt = restarts,
                "run returned while attached, restarting"
            ),
            Err(e) if e.is_transient() => tracing::warn!(
                supervisor = name,
                attempt = restarts,
                error = %e,
                "run failed, restarting"
            ),
            Err(e) => tracing::error!(
                supervisor = name,
                attempt = restarts,
                error = %e,
                "run failed with a non-transient error, restarting"
            ),
        }

        let delay = config.backoff(restarts);
        status.set(SupervisorStatus::Backoff {
            attempt: restarts,
            delay_ms: duration_ms(delay),
        });
        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    // A later attachment period already owns the status.
    if latest_epoch.load(Ordering::SeqCst) == epoch {
        status.set(SupervisorStatus::Stopped);
    }
    tracing::debug!(supervisor = name, epoch, "run stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use companion_core::CompanionError;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            base_backoff_ms: 100,
            max_backoff_ms: 400,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_run_is_restarted_with_backoff() {
        let lifecycle = Lifecycle::new("test", &LifecycleConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let supervisor = Supervisor::new("flaky", config());
        supervisor.register(&lifecycle, move |token| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(CompanionError::network("timeout"));
                }
                token.cancelled().await;
                Ok(())
            }
        });

        lifecycle.attach();
        settle().await;
        assert_eq!(
            supervisor.status().get(),
            SupervisorStatus::Backoff {
                attempt: 1,
                delay_ms: 100
            }
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            supervisor.status().get(),
            SupervisorStatus::Running {
                epoch: 1,
                restarts: 2
            }
        );
        assert!(lifecycle.is_attached());
    }

    #[tokio::test]
    async fn detach_stops_the_loop() {
        let lifecycle = Lifecycle::new("test", &LifecycleConfig::default());
        let supervisor = Supervisor::new("steady", config());
        supervisor.register(&lifecycle, |token| async move {
            token.cancelled().await;
            Ok(())
        });

        lifecycle.attach();
        settle().await;
        assert!(matches!(
            supervisor.status().get(),
            SupervisorStatus::Running { epoch: 1, .. }
        ));

        lifecycle.detach();
        settle().await;
        assert_eq!(supervisor.status().get(), SupervisorStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn late_stop_from_previous_period_keeps_newer_status() {
        let lifecycle = Lifecycle::new(
            "test",
            &LifecycleConfig {
                cancel_grace_ms: 200,
            },
        );
        let supervisor = Supervisor::new("lingering", config());
        supervisor.register(&lifecycle, |token| async move {
            token.cancelled().await;
            // Finish the unit of work in flight before returning.
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });

        lifecycle.attach();
        settle().await;
        lifecycle.detach();
        lifecycle.attach();
        settle().await;
        assert!(matches!(
            supervisor.status().get(),
            SupervisorStatus::Running { epoch: 2, .. }
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(
            supervisor.status().get(),
            SupervisorStatus::Running {
                epoch: 2,
                restarts: 0
            }
        );
    }
}
