use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Sensor sampling service provider.
///
/// Samples the CPU temperature and battery discharge rate at the configured
/// interval, stores the latest reading in [`AppState`] and publishes it as
/// [`Event::SensorsSampled`].
///
/// # Priority and Criticality
///
/// - **Priority**: 5
/// - **Critical**: No (buttons keep working without sensors)
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use laptopctld::providers::MonitoringServiceProvider;
/// use laptopctld::event::EventBus;
/// use laptopctld::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// let provider = MonitoringServiceProvider::new(state, event_bus);
/// // Use with TaskManager to start the service
/// # Ok(())
/// # }
/// ```
pub struct MonitoringServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl MonitoringServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for MonitoringServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_monitoring_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "MonitoringService"
    }

    fn priority(&self) -> i32 {
        5
    }
}

async fn run_monitoring_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut interval = interval(state.options.sensor_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Monitoring service cancelled");
                break;
            }
            _instant = interval.tick() => {
                sample_and_publish(&state, &event_bus).await;
            }
        }
    }
    Ok(())
}

async fn sample_and_publish(state: &AppState, event_bus: &EventBus) {
    let reading = state.sampler.sample().await;
    debug!(
        "CPU {:.1}°C, battery {:.2} W",
        reading.cpu_temperature_or_sentinel(),
        reading.battery_discharge_or_sentinel()
    );

    *state.sensor_data.write().await = reading;

    if let Err(e) = event_bus.publish(Event::SensorsSampled(reading)) {
        debug!("No listeners for sensor sample: {e}");
    }
}
