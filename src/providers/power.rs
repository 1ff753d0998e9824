use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::{
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
    temperature_sensors::sysfs::AcAdapter,
};

/// Power source watcher service provider.
///
/// Polls the mains adapter and publishes [`Event::PowerSourceChanged`] with
/// the first successful reading and on every change after it.
///
/// # Priority and Criticality
///
/// - **Priority**: 4
/// - **Critical**: No (desktops have no adapter)
pub struct PowerSourceServiceProvider {
    adapter: AcAdapter,
    event_bus: EventBus,
    poll_interval: Duration,
}

impl PowerSourceServiceProvider {
    pub fn new(adapter: AcAdapter, event_bus: EventBus, poll_interval: Duration) -> Self {
        Self {
            adapter,
            event_bus,
            poll_interval,
        }
    }
}

#[async_trait]
impl ServiceProvider for PowerSourceServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let adapter = self.adapter.clone();
        let event_bus = self.event_bus.clone();
        let poll_interval = self.poll_interval;

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| async move {
                run_power_service(adapter, event_bus, poll_interval, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "PowerSourceService"
    }

    fn priority(&self) -> i32 {
        4
    }
}

/// Remembers the last reported state so only changes are published.
#[derive(Debug, Default)]
struct PowerSourceTracker {
    last: Option<bool>,
}

impl PowerSourceTracker {
    fn update(&mut self, plugged: bool) -> Option<bool> {
        (self.last.replace(plugged) != Some(plugged)).then_some(plugged)
    }
}

async fn run_power_service(
    adapter: AcAdapter,
    event_bus: EventBus,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Watching power source at {}", adapter.name());
    let mut interval = interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = PowerSourceTracker::default();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Power source service cancelled");
                break;
            }
            _instant = interval.tick() => {
                let plugged = match adapter.is_online() {
                    Ok(plugged) => plugged,
                    Err(e) => {
                        debug!("Failed to read power source: {e:#}");
                        continue;
                    }
                };
                if let Some(plugged) = tracker.update(plugged) {
                    info!("Power source: {}", if plugged { "mains" } else { "battery" });
                    if let Err(e) = event_bus.publish(Event::PowerSourceChanged(plugged)) {
                        debug!("No listeners for power source change: {e}");
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};
    use tempfile::TempDir;
    use tokio::{sync::broadcast::Receiver, time::timeout};

    fn write_online(dir: &Path, value: &str) {
        fs::write(dir.join("AC0/online"), value).unwrap();
    }

    async fn next_power_event(receiver: &mut Receiver<Event>) -> bool {
        loop {
            match timeout(Duration::from_secs(2), receiver.recv()).await {
                Ok(Ok(Event::PowerSourceChanged(plugged))) => break plugged,
                Ok(Ok(_)) => {}
                other => panic!("Expected PowerSourceChanged event, got {other:?}"),
            }
        }
    }

    #[test]
    fn tracker_reports_first_value_and_changes_only() {
        let mut tracker = PowerSourceTracker::default();

        assert_eq!(tracker.update(true), Some(true));
        assert_eq!(tracker.update(true), None);
        assert_eq!(tracker.update(false), Some(false));
        assert_eq!(tracker.update(false), None);
        assert_eq!(tracker.update(true), Some(true));
    }

    #[tokio::test]
    async fn publishes_initial_state_and_changes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("BAT0")).unwrap();
        fs::create_dir(dir.path().join("AC0")).unwrap();
        write_online(dir.path(), "1\n");

        let adapter = AcAdapter::discover_in(dir.path()).unwrap();
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();
        let mut task_manager = TaskManager::new();
        PowerSourceServiceProvider::new(adapter, event_bus, Duration::from_millis(20))
            .start(&mut task_manager)
            .await
            .unwrap();

        assert!(next_power_event(&mut receiver).await);

        write_online(dir.path(), "0\n");
        assert!(!next_power_event(&mut receiver).await);

        // Unchanged readings stay quiet.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(receiver.try_recv().is_err());

        task_manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_adapter_keeps_service_running() {
        let dir = TempDir::new().unwrap();
        let mut task_manager = TaskManager::new();

        let provider = PowerSourceServiceProvider::new(
            AcAdapter::new(dir.path().join("AC0")),
            EventBus::new(),
            Duration::from_millis(20),
        );
        assert_eq!(provider.priority(), 4);
        assert!(!provider.is_critical());
        provider.start(&mut task_manager).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(task_manager.is_running("PowerSourceService"));

        task_manager.shutdown_all().await.unwrap();
    }
}
