//! Application entry point and builder pattern implementation.

use crate::{app_context::RuntimeOptions, config::ConfigStore, coordinator::SystemCoordinator};
use anyhow::Result;

/// Main application structure that orchestrates all daemon components.
///
/// # Example
///
/// ```no_run
/// use laptopctld::application::Application;
/// use laptopctld::config::ConfigStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = ConfigStore::load(None).await?;
/// let mut app = Application::builder()
///     .with_store(store)
///     .build()?;
///
/// app.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    pub coordinator: SystemCoordinator,
    store: ConfigStore,
    options: RuntimeOptions,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Runs the complete daemon lifecycle: initialize, start services, and run main loop.
    pub async fn run(&mut self) -> Result<()> {
        self.coordinator
            .initialize(self.store.clone(), self.options.clone())
            .await?;

        self.coordinator.start_all_services().await?;

        self.coordinator.run_main_loop().await
    }
}

pub struct ApplicationBuilder {
    store: Option<ConfigStore>,
    options: RuntimeOptions,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            store: None,
            options: RuntimeOptions::default(),
        }
    }

    /// Sets the settings store the daemon persists to.
    pub fn with_store(mut self, store: ConfigStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Application> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Settings store is required"))?;

        Ok(Application {
            coordinator: SystemCoordinator::new(),
            store,
            options: self.options,
        })
    }
}
