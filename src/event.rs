//! Event-driven communication system for inter-service messaging.

use anyhow::Result;
use tokio::sync::broadcast;

use crate::{
    controller::PowerPolicy, dispatcher::HardwareEvent, fan_curve::PerformanceMode,
    sensors::SensorReading,
};

/// Application events for inter-service communication.
///
/// Events are published through the EventBus and consumed by interested services.
/// This enables loose coupling between components.
#[derive(Debug, Clone)]
pub enum Event {
    /// Raw button or power-source event from the hotkey source.
    Hardware(HardwareEvent),
    SensorsSampled(SensorReading),
    PerformanceModeChanged(PerformanceMode),
    /// Index into [`crate::controller::LIGHTING_MODES`].
    LightingModeChanged(usize),
    VisibilityToggled(bool),
    /// Mains adapter state, sent once at startup and on every change.
    PowerSourceChanged(bool),
    PowerPolicyApplied(PowerPolicy),
    SystemShutdown,
}

/// Event bus for publish-subscribe messaging between services.
///
/// Provides a centralized communication mechanism that allows services
/// to communicate without direct dependencies.
///
/// # Example
///
/// ```no_run
/// use laptopctld::{dispatcher::HardwareEvent, event::{Event, EventBus}};
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus.publish(Event::Hardware(HardwareEvent::M4)).unwrap();
///
/// // In async context, receive events:
/// // let event = subscriber.recv().await;
/// ```
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new EventBus with default capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    #[cfg(test)]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.sender.send(event)?;
        Ok(())
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each subscriber receives all events published after subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
