//! # Attachment Lifecycle
//!
//! A [`Lifecycle`] tracks whether the UI surface owning a view-model is
//! visible (attached) and runs registered tasks for exactly the duration of
//! each attachment period.
//!
//! - Every attach opens a fresh [`AttachmentScope`](scope) and starts a new
//!   instance of every registered task. Instances are never resumed or shared
//!   across attachment periods.
//! - Every detach delivers the cancellation signal to all instances of the
//!   period. An instance gets `cancel_grace` to finish its unit of work and is
//!   dropped after that.
//! - A task that fails is logged under its key; the lifecycle and the other
//!   tasks keep running.
//!
//! Task spawning uses `tokio::spawn`, so `attach()` and the registration
//! methods must be called from within a Tokio runtime. Task factories run
//! outside the lifecycle lock and may query the lifecycle.

mod scope;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use companion_core::effects::CancellationToken;
use companion_core::reactive::Dynamic;
use companion_core::CompanionResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{duration_ms, LifecycleConfig};
use scope::AttachmentScope;

pub use scope::AttachmentToken;

/// Logical name of a scoped task. One running instance per key per period.
pub type TaskKey = &'static str;

type TaskFactory =
    Arc<dyn Fn(AttachmentToken) -> BoxFuture<'static, CompanionResult<()>> + Send + Sync>;

/// Whether the owning UI surface is currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentState {
    /// Not visible; no scoped task runs.
    Detached,
    /// Visible; registered tasks run.
    Attached,
}

/// How long a registration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// Started on every attachment until cancelled through its handle.
    Persistent,
    /// Runs in the current or next attachment and is deregistered once it
    /// completes without having been cancelled.
    Once,
}

#[derive(Clone)]
struct Registration {
    id: u64,
    mode: TaskMode,
    factory: TaskFactory,
}

struct LifecycleState {
    attachment: AttachmentState,
    epoch: u64,
    scope: Option<Arc<AttachmentScope>>,
    registrations: BTreeMap<TaskKey, Registration>,
    children: Vec<Arc<Lifecycle>>,
    next_registration: u64,
}

/// Attach/detach state plus the tasks bound to it.
pub struct Lifecycle {
    name: &'static str,
    cancel_grace: Duration,
    state: Arc<Mutex<LifecycleState>>,
    observed: Dynamic<AttachmentState>,
}

impl Lifecycle {
    /// Create a detached lifecycle.
    pub fn new(name: &'static str, config: &LifecycleConfig) -> Self {
        Self {
            name,
            cancel_grace: config.cancel_grace(),
            state: Arc::new(Mutex::new(LifecycleState {
                attachment: AttachmentState::Detached,
                epoch: 0,
                scope: None,
                registrations: BTreeMap::new(),
                children: Vec::new(),
                next_registration: 0,
            })),
            observed: Dynamic::new(AttachmentState::Detached),
        }
    }

    /// Name used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current attachment state.
    pub fn state(&self) -> AttachmentState {
        self.state.lock().attachment
    }

    /// Whether the lifecycle is attached.
    pub fn is_attached(&self) -> bool {
        self.state() == AttachmentState::Attached
    }

    /// Observable attachment state.
    pub fn observe(&self) -> Dynamic<AttachmentState> {
        self.observed.clone()
    }

    /// Number of the current (or last) attachment period; 0 before the first attach.
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Token of the current attachment period, `None` while detached.
    pub fn attachment_token(&self) -> Option<AttachmentToken> {
        self.state.lock().scope.as_ref().map(|scope| scope.token())
    }

    /// Number of task instances of the current period that have not finished.
    pub fn running_tasks(&self) -> usize {
        self.state
            .lock()
            .scope
            .as_ref()
            .map_or(0, |scope| scope.running())
    }

    /// Make `child` follow this lifecycle's attach and detach transitions.
    pub fn add_child(&self, child: Arc<Lifecycle>) {
        let attached = {
            let mut state = self.state.lock();
            state.children.push(child.clone());
            state.attachment == AttachmentState::Attached
        };
        if attached {
            child.attach();
        }
    }

    /// Transition to `Attached` and start a fresh instance of every registered task.
    pub fn attach(&self) {
        let (scope, starts, children) = {
            let mut state = self.state.lock();
            if state.attachment == AttachmentState::Attached {
                return;
            }
            state.epoch += 1;
            state.attachment = AttachmentState::Attached;
            let scope = Arc::new(AttachmentScope::new(state.epoch));
            state.scope = Some(scope.clone());

            tracing::debug!(
                lifecycle = self.name,
                epoch = state.epoch,
                tasks = state.registrations.len(),
                "attached"
            );
            let starts: Vec<_> = state
                .registrations
                .iter()
                .map(|(key, registration)| (*key, registration.clone()))
                .collect();
            (scope, starts, state.children.clone())
        };
        for (key, registration) in &starts {
            self.start(&scope, *key, registration);
        }
        self.observed.set(AttachmentState::Attached);
        for child in children {
            child.attach();
        }
    }

    /// Transition to `Detached`, cancelling every task of the current period.
    pub fn detach(&self) {
        let children = {
            let mut state = self.state.lock();
            if state.attachment == AttachmentState::Detached {
                return;
            }
            state.attachment = AttachmentState::Detached;
            if let Some(scope) = state.scope.take() {
                scope.shutdown();
            }
            tracing::debug!(lifecycle = self.name, epoch = state.epoch, "detached");
            state.children.clone()
        };
        self.observed.set(AttachmentState::Detached);
        for child in children {
            child.detach();
        }
    }

    /// Run `task` in every attachment period until the returned handle cancels it.
    pub fn while_attached<F, Fut>(&self, key: TaskKey, task: F) -> ScopedTaskHandle
    where
        F: Fn(AttachmentToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CompanionResult<()>> + Send + 'static,
    {
        self.register(key, TaskMode::Persistent, task)
    }

    /// Run `task` once, in the current attachment period or the next one.
    pub fn once_attached<F, Fut>(&self, key: TaskKey, task: F) -> ScopedTaskHandle
    where
        F: Fn(AttachmentToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CompanionResult<()>> + Send + 'static,
    {
        self.register(key, TaskMode::Once, task)
    }

    /// Register `task` under `key`, replacing (and cancelling) any previous
    /// registration with the same key.
    pub fn register<F, Fut>(&self, key: TaskKey, mode: TaskMode, task: F) -> ScopedTaskHandle
    where
        F: Fn(AttachmentToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CompanionResult<()>> + Send + 'static,
    {
        let factory: TaskFactory = Arc::new(move |token| task(token).boxed());
        let (registration, scope) = {
            let mut state = self.state.lock();
            state.next_registration += 1;
            let registration = Registration {
                id: state.next_registration,
                mode,
                factory,
            };
            state.registrations.insert(key, registration.clone());
            (registration, state.scope.clone())
        };
        let id = registration.id;

        if let Some(scope) = scope {
            // Starting under the same key cancels the previous instance.
            self.start(&scope, key, &registration);
        }

        ScopedTaskHandle {
            key,
            registration: id,
            state: Arc::downgrade(&self.state),
        }
    }

    fn start(&self, scope: &Arc<AttachmentScope>, key: TaskKey, registration: &Registration) {
        let Some((cancel_tx, token)) = scope.instance_channel() else {
            return;
        };
        let future = (registration.factory)(token.clone());
        let handle = tokio::spawn(supervise(
            self.name,
            key,
            registration.id,
            registration.mode,
            future,
            token,
            self.cancel_grace,
            Arc::downgrade(&self.state),
            Arc::downgrade(scope),
        ));
        scope.insert(key, registration.id, cancel_tx, handle);
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if let Some(scope) = self.state.lock().scope.take() {
            scope.abort_all();
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Lifecycle")
            .field("name", &self.name)
            .field("attachment", &state.attachment)
            .field("epoch", &state.epoch)
            .field("tasks", &state.registrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Wrapper around one task instance: enforces the cancellation grace period,
/// reports failures, and retires completed `Once` registrations.
#[allow(clippy::too_many_arguments)]
async fn supervise(
    lifecycle: &'static str,
    key: TaskKey,
    registration: u64,
    mode: TaskMode,
    future: BoxFuture<'static, CompanionResult<()>>,
    token: AttachmentToken,
    grace: Duration,
    state: Weak<Mutex<LifecycleState>>,
    scope: Weak<AttachmentScope>,
) {
    // Attach immediately followed by detach: the task never gets to run.
    if token.is_cancelled() {
        tracing::debug!(lifecycle, task = key, "scoped task cancelled before start");
        if let Some(scope) = scope.upgrade() {
            scope.release(key, registration);
        }
        return;
    }

    let deadline = async {
        token.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    let completed = tokio::select! {
        result = future => {
            match result {
                Ok(()) => tracing::debug!(lifecycle, task = key, "scoped task finished"),
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(lifecycle, task = key, "scoped task stopped on cancellation");
                }
                Err(e) => tracing::warn!(lifecycle, task = key, error = %e, "scoped task failed"),
            }
            true
        }
        () = deadline => {
            tracing::warn!(
                lifecycle,
                task = key,
                grace_ms = duration_ms(grace),
                "scoped task ignored cancellation, dropping it"
            );
            false
        }
    };

    // Read before releasing: dropping the slot closes the token's channel.
    let cancelled = token.is_cancelled();
    if let Some(scope) = scope.upgrade() {
        scope.release(key, registration);
    }
    if completed && mode == TaskMode::Once && !cancelled {
        if let Some(state) = state.upgrade() {
            let mut state = state.lock();
            if state
                .registrations
                .get(key)
                .is_some_and(|current| current.id == registration)
            {
                state.registrations.remove(key);
            }
        }
    }
}

/// Handle to a registered scoped task.
///
/// Dropping the handle leaves the task registered; call [`cancel`](Self::cancel)
/// to deregister it.
#[derive(Debug, Clone)]
pub struct ScopedTaskHandle {
    key: TaskKey,
    registration: u64,
    state: Weak<Mutex<LifecycleState>>,
}

impl ScopedTaskHandle {
    /// Key the task was registered under.
    pub fn key(&self) -> TaskKey {
        self.key
    }

    /// Whether the registration is still live (not cancelled, replaced or retired).
    pub fn is_registered(&self) -> bool {
        self.state.upgrade().is_some_and(|state| {
            state
                .lock()
                .registrations
                .get(self.key)
                .is_some_and(|current| current.id == self.registration)
        })
    }

    /// Deregister the task and cancel its running instance, if any.
    pub fn cancel(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.lock();
        if state
            .registrations
            .get(self.key)
            .is_some_and(|current| current.id == self.registration)
        {
            state.registrations.remove(self.key);
        }
        if let Some(scope) = &state.scope {
            scope.cancel(self.key, self.registration);
        }
    }
}
