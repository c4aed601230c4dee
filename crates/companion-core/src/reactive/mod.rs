//! # Reactive Primitives for UI-facing State
//!
//! View-models publish their observable state (the presented feedback dialog,
//! splash visibility, supervisor status) through [`Dynamic<T>`]. Platform
//! adapters either read the current value or hold a [`Subscription<T>`] and
//! poll it on each frame / run-loop turn to decide whether to re-render.
//!
//! ## Design Principles
//!
//! 1. **Runtime-agnostic**: only std primitives (RwLock, AtomicU64), so the
//!    same value can be read from a Swift or Kotlin main thread.
//! 2. **Poll-based subscriptions**: subscriptions track versions and poll for
//!    changes rather than using push-based channels.
//! 3. **Wholesale replacement**: values are replaced, never mutated in place.
//!
//! ## Usage
//!
//! ```rust
//! use companion_core::reactive::Dynamic;
//!
//! let splash = Dynamic::new(true);
//! let mut sub = splash.subscribe();
//!
//! splash.set(false);
//! assert_eq!(sub.poll(), Some(false));
//! assert_eq!(sub.poll(), None);
//! ```

mod dynamic;

pub use dynamic::{Dynamic, Subscription};
