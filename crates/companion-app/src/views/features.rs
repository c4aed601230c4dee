//! Sub-feature view-models owned by the application view-model.
//!
//! Their screens live in the platform layers; the core only owns them and
//! binds their lifecycles to the root one so work they register runs while
//! the application is visible.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;
use crate::lifecycle::Lifecycle;

/// Top-level feature tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Full conference schedule
    Schedule,
    /// Sessions the attendee bookmarked
    Agenda,
    /// Sponsor list
    Sponsors,
    /// App settings
    Settings,
}

impl Feature {
    /// Every feature, in tab order.
    pub const ALL: [Feature; 4] = [
        Feature::Schedule,
        Feature::Agenda,
        Feature::Sponsors,
        Feature::Settings,
    ];

    /// Lifecycle name of the feature.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Schedule => "schedule",
            Feature::Agenda => "agenda",
            Feature::Sponsors => "sponsors",
            Feature::Settings => "settings",
        }
    }
}

/// A feature view-model with its own child lifecycle.
#[derive(Debug)]
pub struct FeatureViewModel {
    feature: Feature,
    lifecycle: Arc<Lifecycle>,
}

impl FeatureViewModel {
    /// Create the view-model and attach its lifecycle under `parent`.
    pub fn managed_by(parent: &Lifecycle, feature: Feature, config: &LifecycleConfig) -> Arc<Self> {
        let lifecycle = Arc::new(Lifecycle::new(feature.name(), config));
        parent.add_child(lifecycle.clone());
        Arc::new(Self { feature, lifecycle })
    }

    /// Which feature this is.
    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// Lifecycle that follows the application view-model.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }
}
