use super::{ShutdownReason, UvcCamOrchestrator};
use crate::error::{Result, UvcCamError};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

impl UvcCamOrchestrator {
    /// Run until a shutdown signal arrives or the cancellation token fires,
    /// then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("UVC camera is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| UvcCamError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| UvcCamError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let cancel = self.cancellation_token.clone();
        let shutdown_reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| {
                UvcCamError::system("Shutdown channel closed unexpectedly")
            })?,
            _ = cancel.cancelled() => ShutdownReason::UserRequest,
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("UVC camera shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM - Unix only
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
