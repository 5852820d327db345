use super::types::{Component, ComponentState, ShutdownReason};
use crate::camera::FrameSource;
use crate::capture::CaptureStats;
use crate::config::UvcCamConfig;
use crate::error::Result;
use crate::state::StreamState;
use crate::store::FrameStore;
use crate::streaming::StreamingStats;
use crate::usb::UsbTransport;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Main application coordinator: owns the shared pipeline state and the
/// capture, streaming and status tasks.
pub struct UvcCamOrchestrator {
    pub(super) config: UvcCamConfig,
    pub(super) source: Arc<dyn FrameSource>,
    pub(super) transport: Arc<dyn UsbTransport>,
    pub(super) stream_state: Arc<StreamState>,
    pub(super) store: Arc<FrameStore>,

    // Filled in by start()
    pub(super) capture_stats: Option<Arc<CaptureStats>>,
    pub(super) streaming_stats: Option<Arc<parking_lot::Mutex<StreamingStats>>>,
    pub(super) tasks: Vec<(Component, JoinHandle<()>)>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<Component, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) started_at: DateTime<Utc>,
}

impl UvcCamOrchestrator {
    /// Create a new orchestrator around a camera and a USB device stack
    pub fn new(
        config: UvcCamConfig,
        source: Arc<dyn FrameSource>,
        transport: Arc<dyn UsbTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let store = Arc::new(FrameStore::new(Arc::clone(&source)));

        Ok(Self {
            config,
            source,
            transport,
            stream_state: Arc::new(StreamState::new()),
            store,
            capture_stats: None,
            streaming_stats: None,
            tasks: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            started_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &UvcCamConfig {
        &self.config
    }

    pub fn stream_state(&self) -> Arc<StreamState> {
        Arc::clone(&self.stream_state)
    }

    pub fn store(&self) -> Arc<FrameStore> {
        Arc::clone(&self.store)
    }

    /// Token cancelled when the orchestrator shuts down
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
