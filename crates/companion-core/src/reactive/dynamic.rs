//! Observable values for UI-facing state.
//!
//! A [`Dynamic`] holds the latest value of something a platform layer renders
//! (the presented dialog, a supervisor status, the splash flag). Every
//! accepted write bumps a revision counter; a [`Subscription`] remembers the
//! revision it last saw and hands out the newest value when it is behind.
//! Readers never block writers for longer than a clone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

struct Cell<T> {
    value: RwLock<T>,
    revision: AtomicU64,
}

impl<T: Clone> Cell<T> {
    fn snapshot(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::Release);
    }
}

/// Shared observable value.
///
/// Clones observe and write the same cell.
#[derive(Clone)]
pub struct Dynamic<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone + Send + Sync + 'static> Dynamic<T> {
    /// Observable starting at `value`, revision 0.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(Cell {
                value: RwLock::new(value),
                revision: AtomicU64::new(0),
            }),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.cell.snapshot()
    }

    /// Number of writes accepted so far.
    pub fn version(&self) -> u64 {
        self.cell.revision()
    }

    /// Replace the value unconditionally.
    pub fn set(&self, value: T) {
        *self.cell.write() = value;
        self.cell.bump();
    }

    /// Observe writes made after this call.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            cell: self.cell.clone(),
            seen: self.cell.revision(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Dynamic<T> {
    /// Replace the value only when it differs from the current one.
    ///
    /// Returns `true` when the write was accepted. Equal writes leave the
    /// revision untouched, so subscribers are not woken for them.
    pub fn set_if_changed(&self, value: T) -> bool {
        let mut current = self.cell.write();
        if *current == value {
            return false;
        }
        *current = value;
        drop(current);
        self.cell.bump();
        true
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Dynamic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynamic")
            .field("value", &self.get())
            .field("revision", &self.version())
            .finish()
    }
}

/// Cursor over a [`Dynamic`].
///
/// Writes between two polls coalesce; only the newest value is delivered.
pub struct Subscription<T> {
    cell: Arc<Cell<T>>,
    seen: u64,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Whether a write happened since the last delivered value.
    pub fn has_changed(&self) -> bool {
        self.cell.revision() > self.seen
    }

    /// Newest value if a write happened since the last call, `None` otherwise.
    pub fn poll(&mut self) -> Option<T> {
        let revision = self.cell.revision();
        if revision <= self.seen {
            return None;
        }
        self.seen = revision;
        Some(self.cell.snapshot())
    }

    /// Current value without advancing the cursor.
    pub fn get(&self) -> T {
        self.cell.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_cell() {
        let status = Dynamic::new("idle");
        let view = status.clone();

        status.set("running");

        assert_eq!(view.get(), "running");
        assert_eq!(view.version(), 1);
    }

    #[test]
    fn subscription_only_sees_later_writes() {
        let flag = Dynamic::new(true);
        flag.set(false);
        let mut watcher = flag.subscribe();
        assert_eq!(watcher.poll(), None);

        flag.set(true);
        assert_eq!(watcher.poll(), Some(true));
        assert_eq!(watcher.poll(), None);
        assert!(watcher.get());
    }

    #[test]
    fn intermediate_writes_coalesce() {
        let counter = Dynamic::new(0u32);
        let mut watcher = counter.subscribe();

        for n in 1..=5 {
            counter.set(n);
        }

        assert!(watcher.has_changed());
        assert_eq!(watcher.poll(), Some(5));
        assert!(!watcher.has_changed());
    }

    #[test]
    fn equal_writes_do_not_wake_subscribers() {
        let dialog: Dynamic<Option<&str>> = Dynamic::default();
        let mut watcher = dialog.subscribe();

        assert!(!dialog.set_if_changed(None));
        assert!(!watcher.has_changed());

        assert!(dialog.set_if_changed(Some("S1")));
        assert_eq!(watcher.poll(), Some(Some("S1")));
    }
}
