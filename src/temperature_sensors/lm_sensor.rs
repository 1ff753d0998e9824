use std::sync::{Arc, LazyLock};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use lm_sensors::{
    LMSensors, SubFeatureRef,
    value::{Kind as ValueKind, Value},
};
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::sensors::TemperatureSensor;

/// Chip name prefix of the ACPI thermal zone driver.
const ACPI_CHIP_PREFIX: &str = "acpitz";

/// Wrapper making the libsensors handle shareable across tasks.
pub struct LMSensorsRef(pub LMSensors);

// SAFETY: lm-sensors library (>= 3.6) uses internal global mutex for all operations.
// The library is thread-safe but doesn't implement Send/Sync markers.
unsafe impl Send for LMSensorsRef {}
unsafe impl Sync for LMSensorsRef {}

/// Process-wide libsensors instance, `None` when the library is unusable.
pub static LMSENSORS: LazyLock<Option<LMSensorsRef>> =
    LazyLock::new(|| match lm_sensors::Initializer::default().initialize() {
        Ok(sensors) => {
            info!("lm-sensors initialized successfully");
            Some(LMSensorsRef(sensors))
        }
        Err(e) => {
            warn!("lm-sensors not available: {e}");
            None
        }
    });

struct Sensor {
    subf: SubFeatureRef<'static>,
}

// SAFETY: libsensors (>= 3.6) guards all sensor access with an internal global mutex.
//         The `SubFeatureRef::value()` call is read-only.
//         Therefore, moving this pointer across threads cannot cause data races.
unsafe impl Send for Sensor {}
unsafe impl Sync for Sensor {}

/// First temperature input of the ACPI thermal zone chip.
pub struct LmSensorSource {
    key: String,
    sensor: Arc<Mutex<Sensor>>,
}

impl LmSensorSource {
    pub fn discover_acpi() -> Option<Self> {
        let lms = LMSENSORS.as_ref()?;
        Self::discover(&lms.0, ACPI_CHIP_PREFIX)
    }

    pub fn discover(lmsensors: &'static LMSensors, chip_prefix: &str) -> Option<Self> {
        let chip_ref = lmsensors.chip_iter(None).find(|c| {
            c.name()
                .map(|n| n.starts_with(chip_prefix))
                .unwrap_or(false)
        })?;
        let chip_name = chip_ref.name().ok()?;

        let (feat_name, subfeat_ref) = chip_ref.feature_iter().find_map(|f| {
            let subfeat = f
                .sub_feature_iter()
                .find(|s| matches!(s.kind(), Some(ValueKind::TemperatureInput)))?;
            let name = f.name().and_then(|n| n.ok()).unwrap_or("N/A");
            Some((name.to_string(), subfeat))
        })?;

        let key = format!("lm:{chip_name}:{feat_name}");
        debug!("Found LM sensor: {key}");

        Some(LmSensorSource {
            key,
            sensor: Arc::new(Mutex::new(Sensor { subf: subfeat_ref })),
        })
    }
}

#[async_trait]
impl TemperatureSensor for LmSensorSource {
    fn sensor_name(&self) -> String {
        self.key.clone()
    }

    async fn read_temperature(&self) -> Result<f32> {
        match self.sensor.lock().await.subf.value()? {
            Value::TemperatureInput(t) => Ok(t as f32),
            _ => Err(anyhow!("non-temperature value")),
        }
    }
}
