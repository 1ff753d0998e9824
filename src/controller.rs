//! Performance-mode, lighting and panel-visibility control.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, error, info};

use crate::{
    config::{ConfigStore, MISSING_INT, PERFORMANCE_MODE},
    event::{Event, EventBus},
    fan_curve::PerformanceMode,
};

/// Key holding the current keyboard lighting mode.
pub const LIGHTING_MODE: &str = "aura_mode";

/// Lighting effects in cycle order; the stored value is the index.
pub const LIGHTING_MODES: [&str; 4] = ["static", "breathe", "color-cycle", "strobe"];

pub const CHARGE_LIMIT: &str = "charge_limit";
/// 1 switches the GPU to eco mode while on battery.
pub const GPU_AUTO: &str = "gpu_auto";
/// 1 drops the panel refresh rate while on battery.
pub const SCREEN_AUTO: &str = "screen_auto";

/// Settings reported at startup.
const RESTORED_KEYS: [&str; 3] = [CHARGE_LIMIT, GPU_AUTO, SCREEN_AUTO];

/// Power-dependent settings resolved against the current power source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerPolicy {
    pub plugged: bool,
    pub gpu_auto: bool,
    pub screen_auto: bool,
    pub charge_limit: Option<i64>,
}

impl PowerPolicy {
    pub fn gpu_eco(&self) -> bool {
        self.gpu_auto && !self.plugged
    }

    pub fn high_refresh(&self) -> bool {
        !self.screen_auto || self.plugged
    }
}

/// Operations the dispatcher's actions end up invoking.
///
/// Each call is safe to repeat and never fails towards the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UiController: Send + Sync {
    async fn toggle_visibility(&self);
    async fn cycle_performance_mode(&self);
    async fn cycle_lighting_mode(&self);
    /// Re-applies the power-dependent settings for the given power source.
    async fn apply_power_source(&self, plugged: bool);
}

/// Settings-backed controller; publishes every change on the event bus so
/// UI clients and hardware backends can follow.
pub struct ModeController {
    store: ConfigStore,
    event_bus: EventBus,
    visible: AtomicBool,
}

impl ModeController {
    pub fn new(store: ConfigStore, event_bus: EventBus) -> Self {
        Self {
            store,
            event_bus,
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub async fn performance_mode(&self) -> PerformanceMode {
        PerformanceMode::from_config(self.store.get_int(PERFORMANCE_MODE).await)
    }

    /// Logs the persisted state the daemon starts with.
    pub async fn restore(&self) {
        let mode = self.performance_mode().await;
        info!("Performance mode: {}", mode.name());

        for key in RESTORED_KEYS {
            match self.store.get_int(key).await {
                MISSING_INT => info!("{key}: unset"),
                value => info!("{key}: {value}"),
            }
        }
    }

    pub async fn power_policy(&self, plugged: bool) -> PowerPolicy {
        let charge_limit = match self.store.get_int(CHARGE_LIMIT).await {
            MISSING_INT => None,
            limit => Some(limit),
        };
        PowerPolicy {
            plugged,
            gpu_auto: self.store.get_int(GPU_AUTO).await == 1,
            screen_auto: self.store.get_int(SCREEN_AUTO).await == 1,
            charge_limit,
        }
    }

    fn publish(&self, event: Event) {
        if let Err(e) = self.event_bus.publish(event) {
            debug!("No listeners for mode change: {e}");
        }
    }
}

#[async_trait]
impl UiController for ModeController {
    async fn toggle_visibility(&self) {
        let visible = !self.visible.fetch_xor(true, Ordering::SeqCst);
        info!("Panel {}", if visible { "shown" } else { "hidden" });
        self.publish(Event::VisibilityToggled(visible));
    }

    async fn cycle_performance_mode(&self) {
        let mode = self.performance_mode().await.next();

        if let Err(e) = self.store.set(PERFORMANCE_MODE, mode.as_config()).await {
            error!("Failed to persist performance mode: {e:#}");
        }
        info!("Performance mode: {}", mode.name());
        self.publish(Event::PerformanceModeChanged(mode));
    }

    async fn cycle_lighting_mode(&self) {
        let current = self.store.get_int(LIGHTING_MODE).await;
        let next = match usize::try_from(current) {
            Ok(index) => (index + 1) % LIGHTING_MODES.len(),
            Err(_) => 0,
        };

        if let Err(e) = self.store.set(LIGHTING_MODE, next as i64).await {
            error!("Failed to persist lighting mode: {e:#}");
        }
        info!("Lighting mode: {}", LIGHTING_MODES[next]);
        self.publish(Event::LightingModeChanged(next));
    }

    async fn apply_power_source(&self, plugged: bool) {
        let policy = self.power_policy(plugged).await;
        info!(
            "{}: GPU {}, refresh {}, charge limit {}",
            if plugged { "On mains" } else { "On battery" },
            if policy.gpu_eco() { "eco" } else { "standard" },
            if policy.high_refresh() { "high" } else { "low" },
            policy
                .charge_limit
                .map_or_else(|| "unset".to_string(), |limit| format!("{limit}%"))
        );
        self.publish(Event::PowerPolicyApplied(policy));
    }
}
