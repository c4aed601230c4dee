//! One-shot splash screen flag.

use std::sync::atomic::{AtomicBool, Ordering};

use companion_core::reactive::Dynamic;

/// Starts visible; the first acknowledgment hides it for good.
#[derive(Debug)]
pub struct SplashScreen {
    visible: Dynamic<bool>,
    acknowledged: AtomicBool,
}

impl SplashScreen {
    /// Visible splash.
    pub fn new() -> Self {
        Self {
            visible: Dynamic::new(true),
            acknowledged: AtomicBool::new(false),
        }
    }

    /// Observable visibility.
    pub fn visible(&self) -> Dynamic<bool> {
        self.visible.clone()
    }

    /// Acknowledge that the splash was painted.
    ///
    /// Returns `true` only for the call that hid it.
    pub fn acknowledge(&self) -> bool {
        if self.acknowledged.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.visible.set(false);
        true
    }
}

impl Default for SplashScreen {
    fn default() -> Self {
        Self::new()
    }
}
