//! Attachment scopes: the task registry for one attachment period.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for slot storage because:
//! 1. Operations are O(1) insert/remove or O(n) drain (shutdown only)
//! 2. Lock is never held across `.await` points
//! 3. No I/O or async work inside lock scope

use std::collections::HashMap;

use async_trait::async_trait;
use companion_core::effects::CancellationToken;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::TaskKey;

/// Cancellation token handed to every scoped task.
///
/// Fires when the attachment period that started the task ends, or when the
/// task itself is cancelled or replaced.
#[derive(Debug, Clone)]
pub struct AttachmentToken {
    rx: watch::Receiver<bool>,
    epoch: u64,
}

impl AttachmentToken {
    pub(crate) fn new(rx: watch::Receiver<bool>, epoch: u64) -> Self {
        Self { rx, epoch }
    }

    /// Attachment period this token belongs to (starts at 1).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[async_trait]
impl CancellationToken for AttachmentToken {
    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            // Sender dropped means the scope is gone.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

#[derive(Debug)]
struct TaskSlot {
    registration: u64,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Running task instances of one attachment period.
#[derive(Debug)]
pub(crate) struct AttachmentScope {
    epoch: u64,
    shutdown_tx: watch::Sender<bool>,
    slots: Mutex<HashMap<TaskKey, TaskSlot>>,
}

impl AttachmentScope {
    pub(crate) fn new(epoch: u64) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            epoch,
            shutdown_tx,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Token that fires when this attachment period ends.
    pub(crate) fn token(&self) -> AttachmentToken {
        AttachmentToken::new(self.shutdown_tx.subscribe(), self.epoch)
    }

    /// Create the per-instance channel for a task about to be spawned.
    ///
    /// Returns `None` once the scope has been shut down.
    pub(crate) fn instance_channel(&self) -> Option<(watch::Sender<bool>, AttachmentToken)> {
        if *self.shutdown_tx.borrow() {
            return None;
        }
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Some((cancel_tx, AttachmentToken::new(cancel_rx, self.epoch)))
    }

    /// Track a spawned instance, cancelling whatever previously ran under the key.
    pub(crate) fn insert(
        &self,
        key: TaskKey,
        registration: u64,
        cancel_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    ) {
        let previous = self.slots.lock().insert(
            key,
            TaskSlot {
                registration,
                cancel_tx,
                handle,
            },
        );
        if let Some(previous) = previous {
            previous.cancel_tx.send_replace(true);
        }
    }

    /// Signal cancellation to the instance under `key`, if it belongs to `registration`.
    pub(crate) fn cancel(&self, key: TaskKey, registration: u64) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(slot) if slot.registration == registration => {
                if let Some(slot) = slots.remove(key) {
                    slot.cancel_tx.send_replace(true);
                }
                true
            }
            _ => false,
        }
    }

    /// Forget a finished instance without signalling it.
    pub(crate) fn release(&self, key: TaskKey, registration: u64) {
        let mut slots = self.slots.lock();
        if slots
            .get(key)
            .is_some_and(|slot| slot.registration == registration)
        {
            slots.remove(key);
        }
    }

    pub(crate) fn running(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| !slot.handle.is_finished())
            .count()
    }

    /// Deliver the cancellation signal to every instance of this period.
    ///
    /// Instances keep their grace period to finish the unit of work in flight.
    pub(crate) fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        for slot in self.slots.lock().values() {
            slot.cancel_tx.send_replace(true);
        }
    }

    /// Cancel and abort every instance immediately.
    pub(crate) fn abort_all(&self) {
        self.shutdown_tx.send_replace(true);
        for (_, slot) in self.slots.lock().drain() {
            slot.cancel_tx.send_replace(true);
            slot.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_fires_scope_and_instance_tokens() {
        let scope = AttachmentScope::new(3);
        let scope_token = scope.token();
        let (cancel_tx, instance_token) = scope.instance_channel().unwrap();
        scope.insert("ticker", 1, cancel_tx, tokio::spawn(async {}));

        assert!(!scope_token.is_cancelled());
        assert!(!instance_token.is_cancelled());

        scope.shutdown();

        scope_token.cancelled().await;
        instance_token.cancelled().await;
        assert_eq!(instance_token.epoch(), 3);
        assert!(scope.instance_channel().is_none());
    }

    #[tokio::test]
    async fn cancel_ignores_foreign_registrations() {
        let scope = AttachmentScope::new(1);
        let (cancel_tx, token) = scope.instance_channel().unwrap();
        scope.insert("sync", 7, cancel_tx, tokio::spawn(async {}));

        assert!(!scope.cancel("sync", 8));
        assert!(!token.is_cancelled());

        assert!(scope.cancel("sync", 7));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn replacing_a_slot_cancels_the_previous_instance() {
        let scope = AttachmentScope::new(1);
        let (first_tx, first) = scope.instance_channel().unwrap();
        scope.insert("appear", 1, first_tx, tokio::spawn(async {}));
        let (second_tx, second) = scope.instance_channel().unwrap();
        scope.insert("appear", 2, second_tx, tokio::spawn(async {}));

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
