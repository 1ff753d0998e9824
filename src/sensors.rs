//! Best-effort sampling of CPU temperature and battery discharge rate.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::temperature_sensors::{
    lm_sensor::LmSensorSource,
    sysfs::{BatteryPowerSensor, ThermalZoneSensor},
};

/// Value reported to clients for an unknown reading.
pub const SENTINEL: f64 = -1.0;

#[async_trait]
pub trait TemperatureSensor: Send + Sync {
    /// Temperature in °C.
    async fn read_temperature(&self) -> Result<f32>;
    fn sensor_name(&self) -> String;
}

#[async_trait]
pub trait PowerSensor: Send + Sync {
    /// Discharge rate in watts.
    async fn read_power(&self) -> Result<f32>;
    fn sensor_name(&self) -> String;
}

/// One sample of both sensors. `None` means unknown, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub cpu_temperature: Option<f32>,
    pub battery_discharge: Option<f32>,
}

impl SensorReading {
    /// Temperature with `-1` standing in for unknown.
    pub fn cpu_temperature_or_sentinel(&self) -> f64 {
        self.cpu_temperature.map_or(SENTINEL, f64::from)
    }

    /// Discharge rate with `-1` standing in for unknown.
    pub fn battery_discharge_or_sentinel(&self) -> f64 {
        self.battery_discharge.map_or(SENTINEL, f64::from)
    }

    /// Whether either value moved by at least `threshold` (or changed
    /// between known and unknown).
    pub fn differs_from(&self, other: &SensorReading, threshold: f32) -> bool {
        fn moved(a: Option<f32>, b: Option<f32>, threshold: f32) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => (a - b).abs() >= threshold,
                (None, None) => false,
                _ => true,
            }
        }

        moved(self.cpu_temperature, other.cpu_temperature, threshold)
            || moved(self.battery_discharge, other.battery_discharge, threshold)
    }
}

/// Reads the two sensors independently; a failing or missing sensor only
/// blanks its own field.
///
/// # Example
///
/// ```no_run
/// use laptopctld::sensors::SensorSampler;
///
/// # async fn example() {
/// let sampler = SensorSampler::discover();
/// let reading = sampler.sample().await;
/// if let Some(t) = reading.cpu_temperature {
///     println!("CPU at {t:.1}°C");
/// }
/// # }
/// ```
#[derive(Default)]
pub struct SensorSampler {
    temperature: Option<Box<dyn TemperatureSensor>>,
    power: Option<Box<dyn PowerSensor>>,
}

impl SensorSampler {
    pub fn new(
        temperature: Option<Box<dyn TemperatureSensor>>,
        power: Option<Box<dyn PowerSensor>>,
    ) -> Self {
        Self { temperature, power }
    }

    /// Picks the ACPI thermal zone (lm-sensors first, sysfs second) and the
    /// first battery exposing a power reading.
    pub fn discover() -> Self {
        let temperature = LmSensorSource::discover_acpi()
            .map(|s| Box::new(s) as Box<dyn TemperatureSensor>)
            .or_else(|| {
                ThermalZoneSensor::discover().map(|s| Box::new(s) as Box<dyn TemperatureSensor>)
            });
        let power = BatteryPowerSensor::discover().map(|s| Box::new(s) as Box<dyn PowerSensor>);

        match &temperature {
            Some(sensor) => log::info!("Using temperature sensor {}", sensor.sensor_name()),
            None => log::warn!("No CPU temperature sensor found"),
        }
        match &power {
            Some(sensor) => log::info!("Using power sensor {}", sensor.sensor_name()),
            None => log::warn!("No battery power sensor found"),
        }

        Self::new(temperature, power)
    }

    pub async fn sample(&self) -> SensorReading {
        let cpu_temperature = match &self.temperature {
            Some(sensor) => sensor
                .read_temperature()
                .await
                .inspect_err(|e| debug!("Failed reading {}: {e}", sensor.sensor_name()))
                .ok(),
            None => None,
        };

        let battery_discharge = match &self.power {
            Some(sensor) => sensor
                .read_power()
                .await
                .inspect_err(|e| debug!("Failed reading {}: {e}", sensor.sensor_name()))
                .ok(),
            None => None,
        };

        SensorReading {
            cpu_temperature,
            battery_discharge,
        }
    }
}
