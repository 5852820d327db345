use crate::config::StreamConfig;
use crate::state::StreamState;
use crate::store::FrameStore;
use crate::usb::{StreamInterface, UsbTransport};
use crate::validator::{header_hex, is_valid_jpeg};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stats::StreamingStats;

/// Result of one streaming iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Host not streaming or endpoint not active; the loop slept
    Inactive,
    /// No frame became ready within the wait window
    NoFrame,
    Submitted { frame_id: u64, len: usize },
    /// The held frame failed re-validation and was not sent
    SkippedInvalid { frame_id: u64 },
    /// Signalled, but the store was empty
    EmptySlot,
    SubmitFailed { frame_id: u64 },
}

/// Consumer side of the pipeline: hand the newest frame to the USB stack.
///
/// Every iteration ends with a USB service step, whether or not a frame
/// was sent.
pub struct StreamingLoop {
    store: Arc<FrameStore>,
    state: Arc<StreamState>,
    transport: Arc<dyn UsbTransport>,
    interface: StreamInterface,
    config: StreamConfig,
    stats: Arc<Mutex<StreamingStats>>,
}

impl StreamingLoop {
    pub fn new(
        store: Arc<FrameStore>,
        state: Arc<StreamState>,
        transport: Arc<dyn UsbTransport>,
        config: StreamConfig,
    ) -> Self {
        let interface = StreamInterface {
            control: config.control_interface,
            streaming: config.streaming_interface,
        };
        Self {
            store,
            state,
            transport,
            interface,
            config,
            stats: Arc::new(Mutex::new(StreamingStats::default())),
        }
    }

    /// Shared handle to this loop's statistics
    pub fn stats(&self) -> Arc<Mutex<StreamingStats>> {
        Arc::clone(&self.stats)
    }

    pub fn interface(&self) -> StreamInterface {
        self.interface
    }

    /// Run until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("UVC streaming loop started on {}", self.interface);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.step() => {}
            }
            tokio::task::yield_now().await;
        }

        info!("UVC streaming loop stopped");
    }

    /// One iteration of the streaming loop
    pub async fn step(&mut self) -> StreamOutcome {
        let active =
            self.state.is_streaming() && self.transport.is_streaming_active(self.interface);

        let outcome = if active {
            self.stream_latest().await
        } else {
            sleep(self.config.idle_delay()).await;
            StreamOutcome::Inactive
        };

        self.transport.service_step();
        outcome
    }

    async fn stream_latest(&mut self) -> StreamOutcome {
        if !self.store.wait_for_frame(self.config.frame_wait()).await {
            return StreamOutcome::NoFrame;
        }

        // Borrow is released before the next await
        let Some(frame) = self.store.peek_current() else {
            warn!("Frame ready signal without a frame in the store");
            self.stats.lock().record_empty_slot();
            return StreamOutcome::EmptySlot;
        };

        let frame_id = frame.id;
        let len = frame.len();

        if !is_valid_jpeg(frame.data()) {
            warn!(
                "Frame {} failed validation before send: len={}, header={}",
                frame_id,
                len,
                header_hex(frame.data())
            );
            self.stats.lock().record_skipped_frame();
            return StreamOutcome::SkippedInvalid { frame_id };
        }

        // The transport copies the payload before returning
        match self.transport.submit_frame(self.interface, frame.data()) {
            Ok(()) => {
                drop(frame);
                let sent = {
                    let mut stats = self.stats.lock();
                    stats.update_frame_stats(len);
                    stats.frames_sent
                };
                if self.config.report_every_frames > 0 && sent % self.config.report_every_frames == 0
                {
                    info!("Sent frame {}: {} bytes", sent, len);
                } else {
                    debug!("Submitted frame {} ({} bytes)", frame_id, len);
                }
                StreamOutcome::Submitted { frame_id, len }
            }
            Err(e) => {
                drop(frame);
                warn!("Failed to submit frame {}: {}", frame_id, e);
                self.stats.lock().record_submit_error();
                StreamOutcome::SubmitFailed { frame_id }
            }
        }
    }
}
