use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::app_context::RuntimeOptions;

/// laptopctld — daemon for laptop hotkeys, performance modes and fan curves
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON settings file (default: $XDG_CONFIG_HOME/laptopctld/config.json)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and run in the background
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Seconds between sensor samples
    #[arg(short = 's', long = "sensor-interval", default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    pub sensor_interval: u64,

    /// Program used to press media keys
    #[arg(long = "key-emulator", default_value = "xdotool")]
    pub key_emulator: String,

    /// Log debug messages
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            sensor_interval: Duration::from_secs(self.sensor_interval),
            key_emulator: self.key_emulator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["laptopctld"]);

        assert_eq!(cli.config, None);
        assert!(!cli.daemonize);
        assert!(!cli.verbose);
        assert_eq!(cli.runtime_options().sensor_interval, Duration::from_secs(2));
        assert_eq!(cli.runtime_options().key_emulator, "xdotool");
    }

    #[test]
    fn explicit_options() {
        let cli = Cli::parse_from([
            "laptopctld",
            "-c",
            "/tmp/settings.json",
            "-d",
            "--sensor-interval",
            "5",
            "--key-emulator",
            "/usr/local/bin/ydotool",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/settings.json")));
        assert!(cli.daemonize);
        assert_eq!(cli.runtime_options().sensor_interval, Duration::from_secs(5));
        assert_eq!(cli.key_emulator, "/usr/local/bin/ydotool");
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["laptopctld", "--sensor-interval", "0"]).is_err());
    }
}
