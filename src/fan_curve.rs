//! Per-device, per-mode fan curves and their persisted string form.
//!
//! A curve is 16 bytes: eight temperature breakpoints (°C) followed by the
//! eight matching fan duty values. In the settings store it is written as
//! hyphen-separated upper-case hex, e.g. `3A-3D-40-...-45`, under the key
//! `fan_profile_{cpu|gpu}_{mode}`.

use std::{fmt, str::FromStr};

use anyhow::Result;
use log::warn;
use thiserror::Error;

use crate::config::{ConfigStore, PERFORMANCE_MODE};

/// Number of bytes in an encoded curve.
pub const CURVE_LEN: usize = 16;

/// Number of (temperature, duty) points in a curve.
pub const CURVE_POINTS: usize = CURVE_LEN / 2;

/// Cooling zone a curve applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    /// Maps the hardware device index; `1` is the discrete GPU.
    pub fn from_index(index: i64) -> Self {
        if index == 1 { Device::Gpu } else { Device::Cpu }
    }

    pub fn name(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        }
    }
}

impl From<u8> for Device {
    fn from(index: u8) -> Self {
        Device::from_index(i64::from(index))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Power/thermal profile selecting the active fan curves.
///
/// Stored as an integer under `performance_mode`. Anything unrecognised,
/// including the missing-key sentinel, reads as [`PerformanceMode::Balanced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PerformanceMode {
    #[default]
    Balanced = 0,
    Silent = 1,
    Turbo = 2,
}

impl PerformanceMode {
    pub fn from_config(value: i64) -> Self {
        match value {
            1 => PerformanceMode::Silent,
            2 => PerformanceMode::Turbo,
            _ => PerformanceMode::Balanced,
        }
    }

    pub fn as_config(self) -> i64 {
        self as i64
    }

    /// Balanced → Silent → Turbo → Balanced.
    pub fn next(self) -> Self {
        match self {
            PerformanceMode::Balanced => PerformanceMode::Silent,
            PerformanceMode::Silent => PerformanceMode::Turbo,
            PerformanceMode::Turbo => PerformanceMode::Balanced,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PerformanceMode::Balanced => "balanced",
            PerformanceMode::Silent => "silent",
            PerformanceMode::Turbo => "turbo",
        }
    }
}

/// Failure decoding the persisted curve string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("fan curve must have 16 values, found {found}")]
    WrongLength { found: usize },

    #[error("invalid hex byte {token:?} at position {index}")]
    InvalidByte { index: usize, token: String },
}

/// Eight temperature breakpoints followed by eight fan duty values.
///
/// Duties are expected to rise with temperature, but that is not enforced.
///
/// # Example
///
/// ```
/// use laptopctld::fan_curve::FanCurve;
///
/// let curve: FanCurve = "3A-3D-40-44-48-4D-51-62-08-11-16-1A-22-29-30-45".parse()?;
/// assert_eq!(curve.temperatures()[0], 0x3A);
/// assert_eq!(curve.duties()[7], 0x45);
/// assert_eq!(curve.to_string(), "3A-3D-40-44-48-4D-51-62-08-11-16-1A-22-29-30-45");
/// # Ok::<(), laptopctld::fan_curve::CurveError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanCurve([u8; CURVE_LEN]);

impl FanCurve {
    pub const fn new(bytes: [u8; CURVE_LEN]) -> Self {
        Self(bytes)
    }

    /// Built-in curve for `device` under `mode`.
    pub fn default_for(device: Device, mode: PerformanceMode) -> Self {
        let bytes = match (mode, device) {
            (PerformanceMode::Silent, Device::Gpu) => defaults::SILENT_GPU,
            (PerformanceMode::Silent, Device::Cpu) => defaults::SILENT_CPU,
            (PerformanceMode::Turbo, Device::Gpu) => defaults::TURBO_GPU,
            (PerformanceMode::Turbo, Device::Cpu) => defaults::TURBO_CPU,
            (PerformanceMode::Balanced, Device::Gpu) => defaults::BALANCED_GPU,
            (PerformanceMode::Balanced, Device::Cpu) => defaults::BALANCED_CPU,
        };
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CURVE_LEN] {
        &self.0
    }

    /// Temperature breakpoints in °C.
    pub fn temperatures(&self) -> &[u8] {
        &self.0[..CURVE_POINTS]
    }

    /// Fan duty values matching [`FanCurve::temperatures`].
    pub fn duties(&self) -> &[u8] {
        &self.0[CURVE_POINTS..]
    }

    /// `(temperature, duty)` pairs in breakpoint order.
    pub fn points(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.temperatures()
            .iter()
            .copied()
            .zip(self.duties().iter().copied())
    }
}

impl From<[u8; CURVE_LEN]> for FanCurve {
    fn from(bytes: [u8; CURVE_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for FanCurve {
    type Error = CurveError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; CURVE_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| CurveError::WrongLength { found: bytes.len() })
    }
}

impl fmt::Display for FanCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, byte) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("-")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl FromStr for FanCurve {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.trim().split('-').collect();
        if tokens.len() != CURVE_LEN {
            return Err(CurveError::WrongLength {
                found: tokens.len(),
            });
        }

        let mut bytes = [0u8; CURVE_LEN];
        for (index, (slot, token)) in bytes.iter_mut().zip(&tokens).enumerate() {
            *slot = parse_hex_byte(token).ok_or_else(|| CurveError::InvalidByte {
                index,
                token: token.to_string(),
            })?;
        }
        Ok(Self(bytes))
    }
}

fn parse_hex_byte(token: &str) -> Option<u8> {
    let valid = (1..=2).contains(&token.len()) && token.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        u8::from_str_radix(token, 16).ok()
    } else {
        None
    }
}

/// Reads and writes fan curves for the active performance mode.
///
/// The mode is never passed in: every call reads `performance_mode` from the
/// store at that moment, so switching modes switches which curves are seen.
/// Callers must settle the mode before editing curves.
///
/// # Example
///
/// ```no_run
/// use laptopctld::{config::ConfigStore, fan_curve::{Device, FanCurveCodec}};
///
/// # async fn example() -> anyhow::Result<()> {
/// let codec = FanCurveCodec::new(ConfigStore::load(None).await?);
///
/// let curve = codec.load_or_default(Device::Cpu).await;
/// codec.save(Device::Cpu, &curve).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FanCurveCodec {
    store: ConfigStore,
}

impl FanCurveCodec {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Store key for `device` under a given raw mode value.
    pub fn key_for(device: Device, mode: i64) -> String {
        format!("fan_profile_{}_{}", device.name(), mode)
    }

    /// Store key for `device` under the current mode.
    pub async fn curve_key(&self, device: Device) -> String {
        Self::key_for(device, self.store.get_int(PERFORMANCE_MODE).await)
    }

    /// Stored curve for the current mode.
    ///
    /// `Ok(None)` means no override is stored and the caller should use
    /// [`FanCurveCodec::default_curve`]. A stored but malformed string is
    /// an error.
    pub async fn load(&self, device: Device) -> Result<Option<FanCurve>, CurveError> {
        let key = self.curve_key(device).await;
        self.store
            .get_string(&key)
            .await
            .map(|encoded| encoded.parse::<FanCurve>())
            .transpose()
    }

    /// Encodes `curve` and stores it under the current mode's key.
    pub async fn save(&self, device: Device, curve: &FanCurve) -> Result<()> {
        let key = self.curve_key(device).await;
        self.store.set(&key, curve.to_string()).await
    }

    /// Built-in curve for `device` under the current mode.
    pub async fn default_curve(&self, device: Device) -> FanCurve {
        let mode = PerformanceMode::from_config(self.store.get_int(PERFORMANCE_MODE).await);
        FanCurve::default_for(device, mode)
    }

    /// Stored curve, or the built-in one when absent or unreadable.
    pub async fn load_or_default(&self, device: Device) -> FanCurve {
        match self.load(device).await {
            Ok(Some(curve)) => curve,
            Ok(None) => self.default_curve(device).await,
            Err(e) => {
                warn!("Stored {device} fan curve is unreadable ({e}), using default");
                self.default_curve(device).await
            }
        }
    }
}

mod defaults {
    use super::CURVE_LEN;

    type Table = [u8; CURVE_LEN];

    pub const BALANCED_CPU: Table = [
        0x3A, 0x3D, 0x40, 0x44, 0x48, 0x4D, 0x51, 0x62, 0x08, 0x11, 0x16, 0x1A, 0x22, 0x29, 0x30,
        0x45,
    ];
    pub const BALANCED_GPU: Table = [
        0x3A, 0x3D, 0x40, 0x44, 0x48, 0x4D, 0x51, 0x62, 0x0C, 0x16, 0x1D, 0x1F, 0x26, 0x2D, 0x34,
        0x4A,
    ];
    pub const SILENT_CPU: Table = [
        0x14, 0x3F, 0x44, 0x48, 0x4C, 0x50, 0x54, 0x62, 0x11, 0x1A, 0x22, 0x29, 0x34, 0x43, 0x51,
        0x5A,
    ];
    pub const SILENT_GPU: Table = [
        0x14, 0x3F, 0x44, 0x48, 0x4C, 0x50, 0x54, 0x62, 0x16, 0x1F, 0x26, 0x2D, 0x39, 0x47, 0x55,
        0x5F,
    ];
    pub const TURBO_CPU: Table = [
        0x3C, 0x41, 0x42, 0x46, 0x47, 0x4B, 0x4C, 0x62, 0x03, 0x0C, 0x0C, 0x16, 0x16, 0x22, 0x22,
        0x29,
    ];
    pub const TURBO_GPU: Table = [
        0x3C, 0x41, 0x42, 0x46, 0x47, 0x4B, 0x4C, 0x62, 0x08, 0x11, 0x11, 0x1D, 0x1D, 0x26, 0x26,
        0x2D,
    ];
}
