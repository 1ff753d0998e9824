//! System coordinator for managing service lifecycle and dependency injection.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use tokio::sync::{broadcast::error::RecvError, mpsc};

use crate::{
    app_context::{AppState, RuntimeOptions},
    config::ConfigStore,
    controller::ModeController,
    event::{Event, EventBus},
    keyboard::XdotoolKeyEmulator,
    launcher::CommandLauncher,
    providers::{
        ActionHandlers, ActionServiceProvider, AppStateProvider, AsyncProvider,
        BroadcastServiceProvider, DBusServiceProvider, DispatchServiceProvider,
        MonitoringServiceProvider, PowerSourceServiceProvider, ServiceProvider,
    },
    task_manager::TaskManager,
    temperature_sensors::sysfs::AcAdapter,
};

/// Owns the services and drives them from startup to shutdown.
///
/// Services start in priority order; a critical service failing to start
/// aborts startup, others are logged and skipped.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    event_bus: EventBus,
    shared_state: Option<Arc<AppState>>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            event_bus: EventBus::new(),
            shared_state: None,
            service_providers: Vec::new(),
        }
    }

    /// Builds the shared state, restores the persisted modes and registers
    /// the services.
    pub async fn initialize(&mut self, store: ConfigStore, options: RuntimeOptions) -> Result<()> {
        info!("Initializing SystemCoordinator...");

        let state = AppStateProvider::new(store, options)
            .provide()
            .await
            .context("Failed to initialize application state")?;
        self.shared_state = Some(state.clone());

        let controller = Arc::new(ModeController::new(
            state.store.clone(),
            self.event_bus.clone(),
        ));
        controller.restore().await;

        let handlers = ActionHandlers {
            controller,
            launcher: Arc::new(CommandLauncher),
            keys: Arc::new(XdotoolKeyEmulator::new(state.options.key_emulator.clone())),
        };

        self.register_service_providers(state, handlers).await;

        info!("SystemCoordinator initialization completed");
        Ok(())
    }

    async fn register_service_providers(&mut self, state: Arc<AppState>, handlers: ActionHandlers) {
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(DispatchServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
                action_tx,
            )),
            Box::new(ActionServiceProvider::new(action_rx, handlers)),
            Box::new(MonitoringServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
            )),
        ];

        match AcAdapter::discover() {
            Some(adapter) => providers.push(Box::new(PowerSourceServiceProvider::new(
                adapter,
                self.event_bus.clone(),
                state.options.sensor_interval,
            ))),
            None => info!("No mains adapter found, power source changes are not tracked"),
        }

        match DBusServiceProvider::new(state, self.event_bus.clone()).await {
            Ok(provider) => {
                providers.push(Box::new(BroadcastServiceProvider::new(
                    provider.connection(),
                    self.event_bus.clone(),
                )));
                providers.push(Box::new(provider));
            }
            Err(e) => {
                warn!("Failed to create D-Bus service provider: {e:#}, skipping D-Bus service");
            }
        }

        providers.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        self.service_providers = providers;

        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
    }

    /// Starts all registered services in priority order.
    pub async fn start_all_services(&mut self) -> Result<()> {
        info!(
            "Starting {} services in priority order...",
            self.service_providers.len()
        );

        for provider in &self.service_providers {
            let is_critical = provider.is_critical();

            match provider.start(&mut self.task_manager).await {
                Ok(()) => {
                    info!(
                        "Service '{}' started successfully (priority: {}, critical: {})",
                        provider.name(),
                        provider.priority(),
                        is_critical
                    );
                }
                Err(e) if is_critical => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => {
                    warn!(
                        "Non-critical service '{}' failed to start: {e:#}",
                        provider.name()
                    );
                }
            }
        }

        info!("All critical services started successfully");
        Ok(())
    }

    /// Runs until Ctrl+C or a [`Event::SystemShutdown`], then stops every
    /// service.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        let mut event_rx = self.event_bus.subscribe();
        info!("Starting main event loop");

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    break;
                }
                event = event_rx.recv() => {
                    if self.handle_event(event)? {
                        info!("Shutdown requested, initiating graceful shutdown...");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Main event loop terminated");
        Ok(())
    }

    /// Returns `true` once shutdown was requested.
    fn handle_event(&self, event: Result<Event, RecvError>) -> Result<bool> {
        match event {
            Ok(Event::SystemShutdown) => return Ok(true),
            Ok(event) => debug!("Received event: {event:?}"),
            Err(RecvError::Closed) => bail!("Event bus channel closed unexpectedly"),
            Err(RecvError::Lagged(n)) => warn!("Event bus lagged by {n} messages"),
        }
        Ok(false)
    }

    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.task_manager.shutdown_all().await {
            log::error!("Error during task shutdown: {e:#}");
        }

        info!("Shutdown complete");
    }

    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn shared_state(&self) -> Option<&Arc<AppState>> {
        self.shared_state.as_ref()
    }

    pub fn registered_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}
