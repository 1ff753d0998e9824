//! Application state provider for dependency injection.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    app_context::{AppState, RuntimeOptions},
    config::ConfigStore,
    providers::traits::AsyncProvider,
    sensors::SensorSampler,
};

/// Builds the shared state, probing sensors on a blocking thread.
pub struct AppStateProvider {
    store: ConfigStore,
    options: RuntimeOptions,
}

impl AppStateProvider {
    pub const fn new(store: ConfigStore, options: RuntimeOptions) -> Self {
        Self { store, options }
    }
}

#[async_trait]
impl AsyncProvider<Arc<AppState>> for AppStateProvider {
    async fn provide(&self) -> Result<Arc<AppState>> {
        let sampler = tokio::task::spawn_blocking(SensorSampler::discover).await?;
        Ok(Arc::new(AppState::new(
            self.store.clone(),
            sampler,
            self.options.clone(),
        )))
    }
}
