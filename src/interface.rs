use std::fmt::Display;
use std::sync::Arc;

use log::{info, warn};
use zbus::{fdo, interface, object_server::SignalEmitter};

use crate::{
    app_context::AppState,
    config::PERFORMANCE_MODE,
    dispatcher::HardwareEvent,
    event::{Event, EventBus},
    fan_curve::{Device, FanCurve},
};

pub const SERVICE_NAME: &str = "io.github.laptopctld";
pub const OBJECT_PATH: &str = "/io/github/laptopctld";

fn failed(e: impl Display) -> fdo::Error {
    fdo::Error::Failed(e.to_string())
}

pub struct DBusInterface {
    state: Arc<AppState>,
    event_bus: EventBus,
    version: String,
}

impl DBusInterface {
    pub fn new(state: Arc<AppState>, event_bus: EventBus, version: String) -> Self {
        Self {
            state,
            event_bus,
            version,
        }
    }
}

#[interface(name = "io.github.laptopctld1")]
impl DBusInterface {
    #[zbus(signal)]
    async fn stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    /// Sent when a sensor value moved noticeably; unknown values are -1.
    #[zbus(signal)]
    pub async fn sensors_changed(
        emitter: &SignalEmitter<'_>,
        cpu_temperature: f64,
        battery_discharge: f64,
    ) -> zbus::Result<()>;

    /// Sent when the power source changes; `charge_limit` is -1 when unset.
    #[zbus(signal)]
    pub async fn power_policy_changed(
        emitter: &SignalEmitter<'_>,
        plugged: bool,
        gpu_eco: bool,
        high_refresh: bool,
        charge_limit: i64,
    ) -> zbus::Result<()>;

    async fn stop(&self, #[zbus(signal_emitter)] emitter: SignalEmitter<'_>) -> fdo::Result<()> {
        emitter.stopped().await?;
        self.event_bus.publish(Event::SystemShutdown).map_err(failed)?;
        Ok(())
    }

    /// Feeds a raw hotkey id into the dispatcher.
    async fn dispatch_event(&self, event_id: i32) -> fdo::Result<()> {
        let event = HardwareEvent(event_id);
        info!("Received hardware event {event}");
        self.event_bus
            .publish(Event::Hardware(event))
            .map_err(failed)
    }

    /// Stored curve for the current mode, or an empty string when none is saved.
    async fn get_fan_curve(&self, device: u8) -> fdo::Result<String> {
        let curve = self
            .state
            .codec
            .load(Device::from(device))
            .await
            .map_err(failed)?;
        Ok(curve.map(|c| c.to_string()).unwrap_or_default())
    }

    async fn set_fan_curve(&self, device: u8, curve: &str) -> fdo::Result<()> {
        let curve: FanCurve = curve
            .parse()
            .map_err(|e| fdo::Error::InvalidArgs(format!("{e}")))?;
        self.state
            .codec
            .save(Device::from(device), &curve)
            .await
            .map_err(|e| {
                warn!("Failed to save fan curve: {e:#}");
                failed(format!("{e:#}"))
            })
    }

    async fn default_fan_curve(&self, device: u8) -> String {
        self.state
            .codec
            .default_curve(Device::from(device))
            .await
            .to_string()
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        self.version.clone()
    }

    /// Raw stored mode, -1 when unset.
    #[zbus(property)]
    async fn performance_mode(&self) -> i64 {
        self.state.store.get_int(PERFORMANCE_MODE).await
    }

    #[zbus(property)]
    async fn cpu_temperature(&self) -> f64 {
        self.state.latest_reading().await.cpu_temperature_or_sentinel()
    }

    #[zbus(property)]
    async fn battery_discharge(&self) -> f64 {
        self.state.latest_reading().await.battery_discharge_or_sentinel()
    }
}
