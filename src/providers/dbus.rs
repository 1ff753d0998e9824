//! D-Bus service provider for dependency injection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zbus::Connection;

use crate::{
    app_context::AppState,
    event::EventBus,
    interface::{DBusInterface, OBJECT_PATH, SERVICE_NAME},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// D-Bus service provider for UI clients.
///
/// Exposes the fan-curve and event methods plus the sensor properties on the
/// session bus.
///
/// # Priority and Criticality
///
/// - **Priority**: 8 (high)
/// - **Critical**: Yes (UI clients cannot reach the daemon without it)
///
/// # Interface
///
/// - **Service Name**: `io.github.laptopctld`
/// - **Object Path**: `/io/github/laptopctld`
///
/// # Requirements
///
/// Requires a running D-Bus session bus. Creation fails if the bus is not
/// available, which the system coordinator handles by running without it.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use laptopctld::providers::DBusServiceProvider;
/// use laptopctld::event::EventBus;
/// use laptopctld::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// let provider = DBusServiceProvider::new(state, event_bus).await?;
/// # Ok(())
/// # }
/// ```
pub struct DBusServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
}

impl DBusServiceProvider {
    /// Connects to the session bus.
    pub async fn new(state: Arc<AppState>, event_bus: EventBus) -> Result<Self> {
        let connection = Connection::session()
            .await
            .context("Failed to connect to the session bus")?;
        Ok(Self {
            state,
            event_bus,
            connection,
        })
    }

    /// Connection shared with services that emit signals.
    pub fn connection(&self) -> Connection {
        self.connection.clone()
    }
}

#[async_trait]
impl ServiceProvider for DBusServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let interface = DBusInterface::new(
            self.state.clone(),
            self.event_bus.clone(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        self.connection
            .object_server()
            .at(OBJECT_PATH, interface)
            .await
            .context("Failed to register D-Bus object")?;
        self.connection
            .request_name(SERVICE_NAME)
            .await
            .with_context(|| format!("Failed to acquire {SERVICE_NAME}"))?;
        info!("Serving {SERVICE_NAME} at {OBJECT_PATH}");

        let connection = self.connection.clone();
        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dbus_service(connection, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DBusService"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn is_critical(&self) -> bool {
        true
    }
}

/// Keeps the connection alive until cancelled, then releases the name.
async fn run_dbus_service(connection: Connection, cancel_token: CancellationToken) -> Result<()> {
    cancel_token.cancelled().await;
    info!("D-Bus service cancelled");

    connection
        .object_server()
        .remove::<DBusInterface, _>(OBJECT_PATH)
        .await?;
    connection.release_name(SERVICE_NAME).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_context::test_support::create_test_app_state;
    use tempfile::TempDir;

    #[tokio::test]
    async fn dbus_service_provider_metadata() {
        let dir = TempDir::new().unwrap();
        let state = create_test_app_state(&dir).await;

        // No session bus in most test environments.
        match DBusServiceProvider::new(state, EventBus::new()).await {
            Ok(provider) => {
                assert_eq!(provider.name(), "DBusService");
                assert_eq!(provider.priority(), 8);
                assert!(provider.is_critical());
            }
            Err(e) => println!("D-Bus not available in test environment: {e:#}"),
        }
    }
}
