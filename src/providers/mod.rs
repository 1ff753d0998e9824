//! Dependency injection providers for service management.
//!
//! This module contains all providers for creating and managing system components
//! using the Dependency Injection pattern for loose coupling and testability.

pub mod actions;
pub mod app_state;
pub mod broadcast;
pub mod dbus;
pub mod dispatch;
pub mod monitoring;
pub mod power;
pub mod traits;

// Re-export core types for convenience
pub use actions::{ActionHandlers, ActionServiceProvider};
pub use app_state::AppStateProvider;
pub use broadcast::BroadcastServiceProvider;
pub use dbus::DBusServiceProvider;
pub use dispatch::DispatchServiceProvider;
pub use monitoring::MonitoringServiceProvider;
pub use power::PowerSourceServiceProvider;
pub use traits::{AsyncProvider, ServiceProvider};
