//! Application bootstrap.

use std::sync::Arc;

use crate::config::{AppConfig, ConfigError};
use crate::services::{AppServices, EVENT_STARTED};
use crate::views::ApplicationViewModel;

/// Entry point for platform hosts.
#[derive(Debug)]
pub struct Application;

impl Application {
    /// Validate `config`, record the start event and build the root view-model.
    pub fn launch(
        config: AppConfig,
        services: AppServices,
    ) -> Result<Arc<ApplicationViewModel>, ConfigError> {
        config.validate()?;
        services.analytics.log_event(EVENT_STARTED);
        tracing::info!("application core started");
        Ok(Arc::new(ApplicationViewModel::new(&config, &services)))
    }
}
