use super::{Component, ComponentState, UvcCamOrchestrator};
use crate::error::{Result, UvcCamError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl UvcCamOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        let tasks = std::mem::take(&mut self.tasks);
        for (component, handle) in tasks {
            if let Err(e) = self.stop_task(component, handle).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        self.store.clear();

        self.set_component_state(Component::Camera, ComponentState::Stopping)
            .await;
        if self.source.is_initialized() {
            if let Err(e) = self.source.deinitialize().await {
                warn!("Camera deinitialization failed: {}", e);
                self.set_component_state(Component::Camera, ComponentState::Failed)
                    .await;
                exit_code = 1;
            } else {
                self.set_component_state(Component::Camera, ComponentState::Stopped)
                    .await;
            }
        } else {
            self.set_component_state(Component::Camera, ComponentState::Stopped)
                .await;
        }

        // The device stack has no teardown; the host sees the device until power-off
        self.set_component_state(Component::Usb, ComponentState::Stopped).await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop a specific task
    async fn stop_task(
        &self,
        component: Component,
        handle: tokio::task::JoinHandle<()>,
    ) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(TASK_STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(UvcCamError::component(
                    component.to_string(),
                    format!("task ended abnormally: {}", e),
                ))
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(UvcCamError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}
