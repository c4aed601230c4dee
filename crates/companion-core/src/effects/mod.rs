//! Effect interfaces implemented by higher layers.

pub mod task;

pub use task::CancellationToken;
