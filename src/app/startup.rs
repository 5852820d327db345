use super::status::{StatusMonitor, StatusReport};
use super::{Component, ComponentState, UvcCamOrchestrator};
use crate::camera::bring_up;
use crate::capture::{CaptureLoop, CaptureStats};
use crate::error::{Result, UvcCamError};
use crate::state::StreamControl;
use crate::streaming::{StreamingLoop, StreamingStats};
use crate::usb::{DeviceCallbacks, StreamInterface, UsbDescriptors};
use std::sync::Arc;
use tracing::{error, info, warn};

impl UvcCamOrchestrator {
    /// Register all components as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing UVC camera components");

        let mut states = self.component_states.lock().await;
        for component in Component::ALL {
            states.insert(component, ComponentState::Stopped);
        }
        drop(states);

        if self.config.camera.fb_count < 2 {
            warn!(
                "Only {} frame buffer configured; the store holds one, so capture stalls until it is replaced",
                self.config.camera.fb_count
            );
        }

        Ok(())
    }

    /// Bring up the camera and USB stack, then spawn the pipeline tasks.
    ///
    /// Camera and USB initialization failures are fatal.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting UVC camera");

        self.start_camera().await?;
        self.start_usb().await?;

        let cancel = self.cancellation_token.clone();

        // Capture loop
        self.set_component_state(Component::Capture, ComponentState::Starting)
            .await;
        let capture = CaptureLoop::new(
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            Arc::clone(&self.stream_state),
            self.config.camera.clone(),
            self.config.capture.clone(),
        );
        let capture_stats = capture.stats();
        self.capture_stats = Some(Arc::clone(&capture_stats));
        self.tasks
            .push((Component::Capture, tokio::spawn(capture.run(cancel.clone()))));
        self.set_component_state(Component::Capture, ComponentState::Running)
            .await;

        // Streaming loop
        self.set_component_state(Component::Streaming, ComponentState::Starting)
            .await;
        let streaming = StreamingLoop::new(
            Arc::clone(&self.store),
            Arc::clone(&self.stream_state),
            Arc::clone(&self.transport),
            self.config.stream.clone(),
        );
        let streaming_stats = streaming.stats();
        self.streaming_stats = Some(Arc::clone(&streaming_stats));
        self.tasks
            .push((Component::Streaming, tokio::spawn(streaming.run(cancel.clone()))));
        self.set_component_state(Component::Streaming, ComponentState::Running)
            .await;

        // Status monitor
        let monitor = self.status_monitor(capture_stats, streaming_stats);
        self.tasks.push((Component::Status, tokio::spawn(monitor.run(cancel))));
        self.set_component_state(Component::Status, ComponentState::Running)
            .await;

        info!("UVC camera started, waiting for host");
        Ok(())
    }

    async fn start_camera(&mut self) -> Result<()> {
        self.set_component_state(Component::Camera, ComponentState::Starting)
            .await;

        if let Err(e) = bring_up(self.source.as_ref(), &self.config.camera).await {
            error!("Camera initialization failed: {}", e);
            self.set_component_state(Component::Camera, ComponentState::Failed)
                .await;
            return Err(UvcCamError::startup(Component::Camera.name(), e));
        }

        self.set_component_state(Component::Camera, ComponentState::Running)
            .await;
        Ok(())
    }

    async fn start_usb(&mut self) -> Result<()> {
        self.set_component_state(Component::Usb, ComponentState::Starting)
            .await;

        let callbacks = DeviceCallbacks {
            descriptors: Arc::new(UsbDescriptors::new(&self.config.usb, &self.config.camera)),
            events: Arc::new(StreamControl::new(
                Arc::clone(&self.stream_state),
                self.config.stream.unmount_stops_stream,
            )),
        };

        if let Err(e) = self.transport.init(callbacks) {
            error!("USB device stack initialization failed: {}", e);
            self.set_component_state(Component::Usb, ComponentState::Failed).await;
            return Err(UvcCamError::startup(Component::Usb.name(), e));
        }

        self.set_component_state(Component::Usb, ComponentState::Running).await;
        info!(
            "USB device stack initialized ({:04X}:{:04X})",
            self.config.usb.vendor_id, self.config.usb.product_id
        );
        Ok(())
    }

    fn status_monitor(
        &self,
        capture_stats: Arc<CaptureStats>,
        streaming_stats: Arc<parking_lot::Mutex<StreamingStats>>,
    ) -> StatusMonitor {
        StatusMonitor {
            config: self.config.system.clone(),
            source: Arc::clone(&self.source),
            transport: Arc::clone(&self.transport),
            interface: StreamInterface {
                control: self.config.stream.control_interface,
                streaming: self.config.stream.streaming_interface,
            },
            state: Arc::clone(&self.stream_state),
            store: Arc::clone(&self.store),
            capture_stats,
            streaming_stats,
            started_at: self.started_at,
        }
    }

    /// Current status report, once the pipeline has started
    pub fn status_report(&self) -> Option<StatusReport> {
        let capture_stats = Arc::clone(self.capture_stats.as_ref()?);
        let streaming_stats = Arc::clone(self.streaming_stats.as_ref()?);
        Some(self.status_monitor(capture_stats, streaming_stats).report())
    }
}
