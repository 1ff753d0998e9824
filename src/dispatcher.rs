//! Resolution of hardware button events into daemon actions.
//!
//! The dispatcher is stateless: each event is looked up against the current
//! settings and turned into at most one [`Action`]. Executing the action is
//! somebody else's job (see [`crate::providers::actions`]).

use std::fmt;

use log::debug;

use crate::{config::ConfigStore, keyboard::VirtualKey};

/// Raw event identifier delivered by the platform's hotkey source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareEvent(pub i32);

impl HardwareEvent {
    /// "M3" button, bound through the `m3` setting.
    pub const M3: HardwareEvent = HardwareEvent(124);
    /// "M4" / ROG button, bound through the `m4` setting.
    pub const M4: HardwareEvent = HardwareEvent(56);
    /// Fn+F5.
    pub const FN_F5: HardwareEvent = HardwareEvent(174);
    /// Fn+F4.
    pub const FN_F4: HardwareEvent = HardwareEvent(179);
    pub const BATTERY_UNPLUGGED: HardwareEvent = HardwareEvent(87);
    pub const BATTERY_PLUGGED: HardwareEvent = HardwareEvent(88);
}

impl fmt::Display for HardwareEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the daemon should do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ToggleVisibility,
    CyclePerformanceMode,
    CycleLightingMode,
    PressKey(VirtualKey),
    /// Run the user's custom command; an empty command does nothing.
    Launch(String),
    /// Re-apply power-dependent settings; `true` when on mains.
    ApplyPowerSource(bool),
    None,
}

/// Setting keys consulted by the dispatcher.
pub mod keys {
    pub const M3: &str = "m3";
    pub const M3_CUSTOM: &str = "m3_custom";
    pub const M4: &str = "m4";
    pub const M4_CUSTOM: &str = "m4_custom";
}

/// Maps `(event, current settings)` to an [`Action`].
///
/// | event | setting | action |
/// |---|---|---|
/// | 124 (M3) | `m3` | 1 play/pause, 2 cycle lighting, 3 launch `m3_custom`, else mute |
/// | 56 (M4) | `m4` | 1 toggle visibility, 2 launch `m4_custom`, else cycle mode |
/// | 174 | | cycle performance mode |
/// | 179 | | cycle lighting mode |
/// | 87, 88 | | nothing (power source hooks) |
/// | other | | nothing |
///
/// # Example
///
/// ```no_run
/// use laptopctld::{config::ConfigStore, dispatcher::{Action, EventDispatcher, HardwareEvent}};
///
/// # async fn example(store: ConfigStore) -> anyhow::Result<()> {
/// store.set("m4", 2).await?;
/// store.set("m4_custom", "foo.exe").await?;
///
/// let dispatcher = EventDispatcher::new(store);
/// assert_eq!(
///     dispatcher.resolve(HardwareEvent::M4).await,
///     Action::Launch("foo.exe".into())
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    store: ConfigStore,
}

impl EventDispatcher {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, event: HardwareEvent) -> Action {
        let action = match event {
            HardwareEvent::M3 => match self.store.get_int(keys::M3).await {
                1 => Action::PressKey(VirtualKey::MediaPlayPause),
                2 => Action::CycleLightingMode,
                3 => self.custom_command(keys::M3_CUSTOM).await,
                _ => Action::PressKey(VirtualKey::VolumeMute),
            },
            HardwareEvent::M4 => match self.store.get_int(keys::M4).await {
                1 => Action::ToggleVisibility,
                2 => self.custom_command(keys::M4_CUSTOM).await,
                _ => Action::CyclePerformanceMode,
            },
            HardwareEvent::FN_F5 => Action::CyclePerformanceMode,
            HardwareEvent::FN_F4 => Action::CycleLightingMode,
            // Power source changes are reported but not acted on.
            HardwareEvent::BATTERY_UNPLUGGED | HardwareEvent::BATTERY_PLUGGED => Action::None,
            _ => Action::None,
        };

        debug!("Event {event} resolved to {action:?}");
        action
    }

    async fn custom_command(&self, key: &str) -> Action {
        Action::Launch(self.store.get_string(key).await.unwrap_or_default())
    }
}
