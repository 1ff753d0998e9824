//! # laptopctld
//!
//! A Linux daemon for gaming-laptop hotkeys: performance modes, keyboard
//! lighting, per-mode fan curves and battery/thermal readouts.
//!
//! ## Features
//!
//! - **Settings Store**: one flat JSON file, rewritten atomically on every change
//! - **Fan Curves**: 16-byte curves per device and performance mode, stored as hex text
//! - **Hotkeys**: M3/M4/Fn events resolved to actions through user bindings
//! - **Sensors**: CPU temperature via lm-sensors or sysfs, battery discharge via sysfs
//! - **Power Source**: mains adapter watcher that re-publishes power-dependent settings
//! - **D-Bus Interface**: methods, properties and change signals for UI clients
//!
//! ## Architecture
//!
//! The daemon uses a provider-based dependency injection system with:
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - Main lifecycle manager
//! - [`EventBus`](event::EventBus) - Inter-service communication
//! - [`AppState`](app_context::AppState) - Shared application state
//! - Service providers for modular functionality
//!
//! ## Example
//!
//! ```no_run
//! use laptopctld::{application::Application, config::ConfigStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = ConfigStore::load(None).await?;
//!     Application::builder()
//!         .with_store(store)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod cli;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod dispatcher;
pub mod event;
pub mod fan_curve;
pub mod interface;
pub mod keyboard;
pub mod launcher;
pub mod providers;
pub mod sensors;
pub mod task_manager;
pub mod temperature_sensors;
