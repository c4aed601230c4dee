//! Companion Testing Infrastructure
//!
//! Scripted service doubles, fixtures and polling helpers shared by the
//! integration tests of the companion crates.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! companion-testkit = { path = "../companion-testkit" }
//! ```
//!
//! ```rust,ignore
//! use companion_testkit::*;
//!
//! #[tokio::test]
//! async fn presents_feedback() {
//!     let kit = TestServices::new().with_candidates([candidate("S1")]);
//!     let app = ApplicationViewModel::new(&test_config(), &kit.services());
//!     app.on_attach();
//!     wait_until(|| app.presented_feedback().is_some()).await;
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod services;
pub mod wait;

pub use fixtures::*;
pub use services::*;
pub use wait::*;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test-writer tracing subscriber once per test binary.
///
/// Honours `RUST_LOG`; silent by default.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
