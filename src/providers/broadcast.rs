use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use zbus::{Connection, object_server::SignalEmitter};

use crate::{
    config::MISSING_INT,
    controller::PowerPolicy,
    event::{Event, EventBus},
    interface::{DBusInterface, OBJECT_PATH},
    providers::traits::ServiceProvider,
    sensors::SensorReading,
    task_manager::TaskManager,
};

/// Smallest change in either value that is worth a signal.
pub const SIGNAL_THRESHOLD: f32 = 0.2;

/// Sensor broadcast service provider.
///
/// Forwards sensor samples from the event bus to D-Bus as `SensorsChanged`
/// signals, skipping samples that barely differ from the last one sent.
/// Applied power policies go out as `PowerPolicyChanged`.
///
/// # Priority and Criticality
///
/// - **Priority**: 3 (low)
/// - **Critical**: No (optional service)
pub struct BroadcastServiceProvider {
    connection: Connection,
    event_bus: EventBus,
}

impl BroadcastServiceProvider {
    pub fn new(connection: Connection, event_bus: EventBus) -> Self {
        Self {
            connection,
            event_bus,
        }
    }
}

#[async_trait]
impl ServiceProvider for BroadcastServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let connection = self.connection.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_broadcast_service(connection, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "BroadcastService"
    }

    fn priority(&self) -> i32 {
        3
    }
}

/// Decides which samples are forwarded.
#[derive(Debug, Default)]
struct SignalThrottle {
    last_sent: SensorReading,
}

impl SignalThrottle {
    fn should_send(&mut self, reading: SensorReading) -> bool {
        if reading.differs_from(&self.last_sent, SIGNAL_THRESHOLD) {
            self.last_sent = reading;
            true
        } else {
            false
        }
    }
}

fn power_signal_args(policy: &PowerPolicy) -> (bool, bool, bool, i64) {
    (
        policy.plugged,
        policy.gpu_eco(),
        policy.high_refresh(),
        policy.charge_limit.unwrap_or(MISSING_INT),
    )
}

async fn run_broadcast_service(
    connection: Connection,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    let emitter = SignalEmitter::new(&connection, OBJECT_PATH)?;
    let mut receiver = event_bus.subscribe();
    let mut throttle = SignalThrottle::default();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Broadcast service cancelled");
                break;
            }
            event = receiver.recv() => match event {
                Ok(Event::SensorsSampled(reading)) if throttle.should_send(reading) => {
                    if let Err(e) = DBusInterface::sensors_changed(
                        &emitter,
                        reading.cpu_temperature_or_sentinel(),
                        reading.battery_discharge_or_sentinel(),
                    )
                    .await
                    {
                        warn!("Failed to emit SensorsChanged: {e}");
                    }
                }
                Ok(Event::PowerPolicyApplied(policy)) => {
                    let (plugged, gpu_eco, high_refresh, charge_limit) = power_signal_args(&policy);
                    if let Err(e) = DBusInterface::power_policy_changed(
                        &emitter,
                        plugged,
                        gpu_eco,
                        high_refresh,
                        charge_limit,
                    )
                    .await
                    {
                        warn!("Failed to emit PowerPolicyChanged: {e}");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Broadcast service lagged, {skipped} events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    Ok(())
}
