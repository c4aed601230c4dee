//! Reactive Settings Store
//!
//! Holds the current [`SettingsSnapshot`] and publishes every replacement to
//! subscribers. The store is shared between the feedback workflow, the
//! settings screen and any platform adapter; it has no transactional
//! semantics and the last write wins.

use async_trait::async_trait;
use companion_core::CompanionResult;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::domain::SettingsSnapshot;
use crate::services::SettingsGateway;

/// In-memory observable settings.
#[derive(Debug)]
pub struct SettingsStore {
    tx: watch::Sender<SettingsSnapshot>,
}

impl SettingsStore {
    /// Create a store holding `initial`.
    pub fn new(initial: SettingsSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SettingsSnapshot {
        self.tx.borrow().clone()
    }

    /// Replace the whole snapshot.
    pub fn replace(&self, snapshot: SettingsSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Derive a new snapshot from the current one.
    ///
    /// Subscribers are only notified when the derived snapshot differs.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&SettingsSnapshot) -> SettingsSnapshot,
    {
        self.tx.send_if_modified(|current| {
            let next = f(current);
            if next == *current {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Raw receiver for callers that want `changed()` semantics.
    pub fn watch(&self) -> watch::Receiver<SettingsSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(SettingsSnapshot::default())
    }
}

#[async_trait]
impl SettingsGateway for SettingsStore {
    async fn settings(&self) -> CompanionResult<SettingsSnapshot> {
        Ok(self.snapshot())
    }

    fn subscribe(&self) -> BoxStream<'static, SettingsSnapshot> {
        WatchStream::new(self.tx.subscribe()).boxed()
    }

    async fn set_feedback_enabled(&self, enabled: bool) -> CompanionResult<()> {
        tracing::debug!(enabled, "feedback prompts toggled");
        self.update(|current| SettingsSnapshot {
            is_feedback_enabled: enabled,
            ..current.clone()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_yields_current_then_updates() {
        let store = SettingsStore::default();
        let mut stream = store.subscribe();

        let first = stream.next().await.unwrap();
        assert!(first.is_feedback_enabled);

        store.set_feedback_enabled(false).await.unwrap();
        let second = stream.next().await.unwrap();
        assert!(!second.is_feedback_enabled);
        assert_eq!(second.use_alternate_renderer, first.use_alternate_renderer);
    }

    #[tokio::test]
    async fn point_update_preserves_other_flags() {
        let store = SettingsStore::new(SettingsSnapshot {
            use_alternate_renderer: true,
            is_feedback_enabled: true,
            is_reminders_enabled: false,
        });

        store.set_feedback_enabled(false).await.unwrap();

        let snapshot = store.settings().await.unwrap();
        assert!(snapshot.use_alternate_renderer);
        assert!(!snapshot.is_feedback_enabled);
        assert!(!snapshot.is_reminders_enabled);
    }

    #[tokio::test]
    async fn unchanged_update_does_not_notify() {
        let store = SettingsStore::default();
        let mut rx = store.watch();
        rx.borrow_and_update();

        store.set_feedback_enabled(true).await.unwrap();
        assert!(!rx.has_changed().unwrap());

        store.replace(SettingsSnapshot {
            use_alternate_renderer: true,
            ..SettingsSnapshot::default()
        });
        assert!(rx.has_changed().unwrap());
    }
}
