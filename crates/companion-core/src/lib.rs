//! Companion Core - Foundation Types
//!
//! This crate provides the foundational types shared by the companion
//! application core and its frontends. It carries no application logic and no
//! runtime coupling: everything here is usable from any async runtime or from
//! synchronous UI adapters.
//!
//! # Contents
//!
//! - [`CompanionError`]: the unified error type for every core operation
//! - [`SessionId`]: identifier of a conference session
//! - [`reactive`]: `Dynamic<T>` observable values with poll subscriptions
//! - [`effects::task`]: the cooperative cancellation contract used by
//!   lifecycle-scoped tasks

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Session and other domain identifiers
pub mod identifiers;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Observable values for UI-facing state
pub mod reactive;

pub use errors::{CompanionError, CompanionResult};
pub use identifiers::SessionId;
