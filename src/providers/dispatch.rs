use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::{
    broadcast::{Receiver, error::RecvError},
    mpsc::UnboundedSender,
};
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    dispatcher::Action,
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Hardware event dispatch service provider.
///
/// Resolves every [`Event::Hardware`] on the bus into an [`Action`] and hands
/// it to the action executor, and turns power-source changes into
/// [`Action::ApplyPowerSource`]. Resolution only reads settings; side effects
/// happen on the executor's side of the channel.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes
pub struct DispatchServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    actions: UnboundedSender<Action>,
}

impl DispatchServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus, actions: UnboundedSender<Action>) -> Self {
        Self {
            state,
            event_bus,
            actions,
        }
    }
}

#[async_trait]
impl ServiceProvider for DispatchServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        // Subscribed before spawning so events published by later services are seen.
        let receiver = self.event_bus.subscribe();
        let actions = self.actions.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dispatch_service(state, receiver, actions, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DispatchService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_dispatch_service(
    state: Arc<AppState>,
    mut receiver: Receiver<Event>,
    actions: UnboundedSender<Action>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Dispatch service cancelled");
                break;
            }
            event = receiver.recv() => {
                match event {
                    Ok(Event::Hardware(hardware_event)) => {
                        let action = state.dispatcher.resolve(hardware_event).await;
                        if action != Action::None && actions.send(action).is_err() {
                            warn!("Action executor is gone, dropping event {hardware_event}");
                        }
                    }
                    Ok(Event::PowerSourceChanged(plugged)) => {
                        if actions.send(Action::ApplyPowerSource(plugged)).is_err() {
                            warn!("Action executor is gone, dropping power source change");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Dispatch service lagged, {skipped} events skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    Ok(())
}
