//! Application state shared between services.

use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;

use crate::{
    config::ConfigStore,
    dispatcher::EventDispatcher,
    fan_curve::FanCurveCodec,
    sensors::{SensorReading, SensorSampler},
};

/// Process options that are not persisted in the settings store.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Interval between sensor samples.
    pub sensor_interval: Duration,
    /// Program used to synthesise media key presses.
    pub key_emulator: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            sensor_interval: Duration::from_secs(2),
            key_emulator: "xdotool".to_string(),
        }
    }
}

/// Shared application state.
///
/// The settings store is the only persistent state; the codec and the
/// dispatcher hold handles to the same store.
pub struct AppState {
    pub store: ConfigStore,
    pub codec: FanCurveCodec,
    pub dispatcher: EventDispatcher,
    pub sampler: SensorSampler,
    /// Most recent sensor sample.
    pub sensor_data: Arc<RwLock<SensorReading>>,
    pub options: RuntimeOptions,
}

impl AppState {
    pub fn new(store: ConfigStore, sampler: SensorSampler, options: RuntimeOptions) -> Self {
        Self {
            codec: FanCurveCodec::new(store.clone()),
            dispatcher: EventDispatcher::new(store.clone()),
            store,
            sampler,
            sensor_data: Arc::new(RwLock::new(SensorReading::default())),
            options,
        }
    }

    /// Latest sensor sample.
    pub async fn latest_reading(&self) -> SensorReading {
        *self.sensor_data.read().await
    }
}
