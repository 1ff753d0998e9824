//! Kernel sysfs sources for the thermal zone, the battery and the mains adapter.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

use crate::sensors::{PowerSensor, TemperatureSensor};

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

fn read_number(path: &Path) -> Result<f64> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    raw.trim()
        .parse()
        .with_context(|| format!("parse {}: {:?}", path.display(), raw.trim()))
}

/// Thermal zone temperature file reporting millidegrees Celsius.
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn discover() -> Option<Self> {
        let path = Path::new(THERMAL_ZONE);
        path.exists().then(|| Self::new(path))
    }
}

#[async_trait]
impl TemperatureSensor for ThermalZoneSensor {
    async fn read_temperature(&self) -> Result<f32> {
        Ok((read_number(&self.path)? / 1000.0) as f32)
    }

    fn sensor_name(&self) -> String {
        format!("sysfs:{}", self.path.display())
    }
}

/// Battery discharge rate from a power-supply directory.
///
/// Uses `power_now` (µW) when present, otherwise `current_now` (µA) times
/// `voltage_now` (µV).
#[derive(Debug, Clone)]
pub struct BatteryPowerSensor {
    dir: PathBuf,
}

impl BatteryPowerSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn discover() -> Option<Self> {
        Self::discover_in(Path::new(POWER_SUPPLY_DIR))
    }

    /// First `BAT*` entry under `root`, by name.
    pub fn discover_in(root: &Path) -> Option<Self> {
        let mut batteries: Vec<PathBuf> = fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
            .map(|entry| entry.path())
            .collect();
        batteries.sort();
        batteries.into_iter().next().map(Self::new)
    }
}

#[async_trait]
impl PowerSensor for BatteryPowerSensor {
    async fn read_power(&self) -> Result<f32> {
        let power_now = self.dir.join("power_now");
        let microwatts = if power_now.exists() {
            read_number(&power_now)?
        } else {
            let current = read_number(&self.dir.join("current_now"))
                .map_err(|e| anyhow!("no power_now and {e:#}"))?;
            let voltage = read_number(&self.dir.join("voltage_now"))?;
            current * voltage / 1_000_000.0
        };
        Ok((microwatts / 1_000_000.0) as f32)
    }

    fn sensor_name(&self) -> String {
        format!("sysfs:{}", self.dir.display())
    }
}

/// Mains adapter `online` flag (`AC*` or `ADP*` power supply).
#[derive(Debug, Clone)]
pub struct AcAdapter {
    online: PathBuf,
}

impl AcAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            online: dir.into().join("online"),
        }
    }

    pub fn discover() -> Option<Self> {
        Self::discover_in(Path::new(POWER_SUPPLY_DIR))
    }

    /// First `AC*`/`ADP*` entry under `root` exposing `online`, by name.
    pub fn discover_in(root: &Path) -> Option<Self> {
        let mut adapters: Vec<PathBuf> = fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with("AC") || name.starts_with("ADP")
            })
            .map(|entry| entry.path())
            .filter(|dir| dir.join("online").exists())
            .collect();
        adapters.sort();
        adapters.into_iter().next().map(Self::new)
    }

    /// Whether the laptop runs on mains power.
    pub fn is_online(&self) -> Result<bool> {
        Ok(read_number(&self.online)? != 0.0)
    }

    pub fn name(&self) -> String {
        format!("sysfs:{}", self.online.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn thermal_zone_converts_millidegrees() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "47500\n").unwrap();

        let sensor = ThermalZoneSensor::new(&path);
        assert_eq!(sensor.read_temperature().await.unwrap(), 47.5);
    }

    #[tokio::test]
    async fn thermal_zone_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let sensor = ThermalZoneSensor::new(dir.path().join("absent"));
        assert!(sensor.read_temperature().await.is_err());
    }

    #[tokio::test]
    async fn battery_prefers_power_now() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("power_now"), "15250000\n").unwrap();
        fs::write(dir.path().join("current_now"), "1\n").unwrap();
        fs::write(dir.path().join("voltage_now"), "1\n").unwrap();

        let sensor = BatteryPowerSensor::new(dir.path());
        assert_eq!(sensor.read_power().await.unwrap(), 15.25);
    }

    #[tokio::test]
    async fn battery_falls_back_to_current_times_voltage() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("current_now"), "2000000\n").unwrap();
        fs::write(dir.path().join("voltage_now"), "12000000\n").unwrap();

        let sensor = BatteryPowerSensor::new(dir.path());
        assert_eq!(sensor.read_power().await.unwrap(), 24.0);
    }

    #[tokio::test]
    async fn battery_garbage_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("power_now"), "n/a\n").unwrap();

        let sensor = BatteryPowerSensor::new(dir.path());
        assert!(sensor.read_power().await.is_err());
    }

    #[test]
    fn discover_picks_first_battery() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("AC")).unwrap();
        fs::create_dir(dir.path().join("BAT1")).unwrap();
        fs::create_dir(dir.path().join("BAT0")).unwrap();

        let sensor = BatteryPowerSensor::discover_in(dir.path()).unwrap();
        assert_eq!(sensor.dir, dir.path().join("BAT0"));
    }

    #[test]
    fn discover_without_battery_is_none() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("AC")).unwrap();

        assert!(BatteryPowerSensor::discover_in(dir.path()).is_none());
    }

    #[test]
    fn adapter_discovery_accepts_ac_and_adp() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("BAT0")).unwrap();
        fs::create_dir(dir.path().join("ADP1")).unwrap();
        fs::write(dir.path().join("ADP1/online"), "1\n").unwrap();
        fs::create_dir(dir.path().join("AC")).unwrap();

        // `AC` has no online flag, so the adapter is ADP1.
        let adapter = AcAdapter::discover_in(dir.path()).unwrap();
        assert_eq!(adapter.online, dir.path().join("ADP1/online"));
        assert!(adapter.is_online().unwrap());
    }

    #[test]
    fn adapter_reports_unplugged_and_errors() {
        let dir = TempDir::new().unwrap();
        let ac = dir.path().join("AC0");
        fs::create_dir(&ac).unwrap();
        fs::write(ac.join("online"), "0\n").unwrap();

        let adapter = AcAdapter::new(&ac);
        assert!(!adapter.is_online().unwrap());

        fs::write(ac.join("online"), "unknown\n").unwrap();
        assert!(adapter.is_online().is_err());
    }

    #[test]
    fn no_adapter_is_none() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("BAT0")).unwrap();

        assert!(AcAdapter::discover_in(dir.path()).is_none());
    }
}
