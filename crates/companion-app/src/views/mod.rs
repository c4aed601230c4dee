//! # View-Models
//!
//! [`ApplicationViewModel`] is the root object platform adapters hold on to.
//! It owns the lifecycle, the background supervisors, the feedback workflow
//! and the sub-feature view-models, and exposes their state as observable
//! [`Dynamic`](companion_core::reactive::Dynamic) values.

mod application;
mod features;
mod splash;

pub use application::ApplicationViewModel;
pub use features::{Feature, FeatureViewModel};
pub use splash::SplashScreen;
