use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc::UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::{
    controller::UiController,
    dispatcher::Action,
    keyboard::KeyEmulator,
    launcher::ProcessLauncher,
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Components that carry out resolved actions.
pub struct ActionHandlers {
    pub controller: Arc<dyn UiController>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub keys: Arc<dyn KeyEmulator>,
}

impl ActionHandlers {
    async fn execute(&self, action: Action) {
        debug!("Executing {action:?}");
        match action {
            Action::ToggleVisibility => self.controller.toggle_visibility().await,
            Action::CyclePerformanceMode => self.controller.cycle_performance_mode().await,
            Action::CycleLightingMode => self.controller.cycle_lighting_mode().await,
            Action::PressKey(key) => self.keys.press(key),
            Action::Launch(command) => self.launcher.launch(&command),
            Action::ApplyPowerSource(plugged) => self.controller.apply_power_source(plugged).await,
            Action::None => {}
        }
    }
}

/// Action executor service provider.
///
/// The only consumer of the action channel, so actions run one at a time in
/// the order their events arrived.
///
/// # Priority and Criticality
///
/// - **Priority**: 9
/// - **Critical**: Yes
pub struct ActionServiceProvider {
    receiver: Mutex<Option<UnboundedReceiver<Action>>>,
    handlers: Arc<ActionHandlers>,
}

impl ActionServiceProvider {
    pub fn new(receiver: UnboundedReceiver<Action>, handlers: ActionHandlers) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            handlers: Arc::new(handlers),
        }
    }
}

#[async_trait]
impl ServiceProvider for ActionServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("Action executor already started"))?;
        let handlers = self.handlers.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_action_service(receiver, handlers, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ActionService"
    }

    fn priority(&self) -> i32 {
        9
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_action_service(
    mut receiver: UnboundedReceiver<Action>,
    handlers: Arc<ActionHandlers>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Action service cancelled");
                break;
            }
            action = receiver.recv() => match action {
                Some(action) => handlers.execute(action).await,
                None => {
                    info!("Action channel closed");
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        controller::MockUiController,
        keyboard::{MockKeyEmulator, VirtualKey},
        launcher::MockProcessLauncher,
    };
    use mockall::{Sequence, predicate::eq};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn handlers(
        controller: MockUiController,
        launcher: MockProcessLauncher,
        keys: MockKeyEmulator,
    ) -> ActionHandlers {
        ActionHandlers {
            controller: Arc::new(controller),
            launcher: Arc::new(launcher),
            keys: Arc::new(keys),
        }
    }

    #[tokio::test]
    async fn each_action_reaches_its_handler() {
        let mut controller = MockUiController::new();
        controller.expect_toggle_visibility().times(1).return_const(());
        controller
            .expect_cycle_performance_mode()
            .times(1)
            .return_const(());
        controller
            .expect_cycle_lighting_mode()
            .times(1)
            .return_const(());
        controller
            .expect_apply_power_source()
            .with(eq(false))
            .times(1)
            .return_const(());
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_launch()
            .with(eq("foo.exe"))
            .times(1)
            .return_const(());
        let mut keys = MockKeyEmulator::new();
        keys.expect_press()
            .with(eq(VirtualKey::MediaPlayPause))
            .times(1)
            .return_const(());

        let handlers = handlers(controller, launcher, keys);
        for action in [
            Action::ToggleVisibility,
            Action::CyclePerformanceMode,
            Action::CycleLightingMode,
            Action::PressKey(VirtualKey::MediaPlayPause),
            Action::Launch("foo.exe".to_string()),
            Action::ApplyPowerSource(false),
            Action::None,
        ] {
            handlers.execute(action).await;
        }
    }

    #[tokio::test]
    async fn actions_run_in_channel_order() {
        let mut seq = Sequence::new();
        let mut controller = MockUiController::new();
        controller
            .expect_cycle_performance_mode()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        controller
            .expect_toggle_visibility()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        controller
            .expect_cycle_performance_mode()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let (tx, rx) = mpsc::unbounded_channel();
        let provider = ActionServiceProvider::new(
            rx,
            handlers(controller, MockProcessLauncher::new(), MockKeyEmulator::new()),
        );
        let mut task_manager = TaskManager::new();
        provider.start(&mut task_manager).await.unwrap();

        tx.send(Action::CyclePerformanceMode).unwrap();
        tx.send(Action::ToggleVisibility).unwrap();
        tx.send(Action::CyclePerformanceMode).unwrap();
        drop(tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        task_manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let provider = ActionServiceProvider::new(
            rx,
            handlers(
                MockUiController::new(),
                MockProcessLauncher::new(),
                MockKeyEmulator::new(),
            ),
        );
        let mut task_manager = TaskManager::new();

        provider.start(&mut task_manager).await.unwrap();
        assert!(provider.start(&mut task_manager).await.is_err());

        task_manager.shutdown_all().await.unwrap();
    }
}
