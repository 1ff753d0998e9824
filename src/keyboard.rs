//! Media key emulation.

use std::process::Stdio;

use log::warn;

/// Keys the button bindings can emit, with their Windows virtual-key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKey {
    VolumeMute = 0xAD,
    MediaPlayPause = 0xB3,
}

impl VirtualKey {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// X11 keysym for the same key.
    pub fn keysym(self) -> &'static str {
        match self {
            VirtualKey::VolumeMute => "XF86AudioMute",
            VirtualKey::MediaPlayPause => "XF86AudioPlay",
        }
    }
}

/// Synthesises key presses; fire-and-forget.
#[cfg_attr(test, mockall::automock)]
pub trait KeyEmulator: Send + Sync {
    fn press(&self, key: VirtualKey);
}

/// Presses keys through `xdotool key <keysym>`.
#[derive(Debug, Clone)]
pub struct XdotoolKeyEmulator {
    program: String,
}

impl XdotoolKeyEmulator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for XdotoolKeyEmulator {
    fn default() -> Self {
        Self::new("xdotool")
    }
}

impl KeyEmulator for XdotoolKeyEmulator {
    fn press(&self, key: VirtualKey) {
        let spawned = tokio::process::Command::new(&self.program)
            .args(["key", key.keysym()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            warn!(
                "Failed to press {:?} (0x{:02X}) via {}: {e}",
                key,
                key.code(),
                self.program
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn virtual_key_codes() {
        assert_eq!(VirtualKey::VolumeMute.code(), 0xAD);
        assert_eq!(VirtualKey::MediaPlayPause.code(), 0xB3);
    }

    #[test]
    fn keysyms() {
        assert_eq!(VirtualKey::VolumeMute.keysym(), "XF86AudioMute");
        assert_eq!(VirtualKey::MediaPlayPause.keysym(), "XF86AudioPlay");
    }

    #[tokio::test]
    async fn missing_emulator_program_is_absorbed() {
        XdotoolKeyEmulator::new("/nonexistent/xdotool").press(VirtualKey::VolumeMute);
    }
}
