use crate::camera::FrameSource;
use crate::capture::{CaptureStats, CaptureStatsSnapshot};
use crate::config::SystemConfig;
use crate::state::{StreamState, StreamStateSnapshot};
use crate::store::{FrameStore, FrameStoreStatsSnapshot};
use crate::streaming::StreamingStats;
use crate::usb::{StreamInterface, UsbTransport};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Point-in-time view of the whole pipeline
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: i64,
    pub camera: String,
    pub camera_initialized: bool,
    pub usb_mounted: bool,
    pub usb_ready: bool,
    pub transport_streaming: bool,
    pub frame_present: bool,
    /// Share of captured frames that passed validation
    pub acceptance_rate: f64,
    pub stream: StreamStateSnapshot,
    pub capture: CaptureStatsSnapshot,
    pub streaming: StreamingStats,
    pub store: FrameStoreStatsSnapshot,
}

impl StatusReport {
    pub fn summary(&self) -> String {
        format!(
            "streaming={}, mounted={}, endpoint_active={}, frame_present={}, camera_frames={}, sent={}, rejected={}, accepted={:.1}%, reinits={}, uptime={}s",
            self.stream.streaming,
            self.usb_mounted,
            self.transport_streaming,
            self.frame_present,
            self.capture.captured,
            self.streaming.frames_sent,
            self.capture.rejected,
            self.acceptance_rate * 100.0,
            self.capture.reinits,
            self.uptime_secs
        )
    }
}

/// Periodic health and statistics reporter
pub struct StatusMonitor {
    pub(super) config: SystemConfig,
    pub(super) source: Arc<dyn FrameSource>,
    pub(super) transport: Arc<dyn UsbTransport>,
    pub(super) interface: StreamInterface,
    pub(super) state: Arc<StreamState>,
    pub(super) store: Arc<FrameStore>,
    pub(super) capture_stats: Arc<CaptureStats>,
    pub(super) streaming_stats: Arc<Mutex<StreamingStats>>,
    pub(super) started_at: DateTime<Utc>,
}

impl StatusMonitor {
    pub fn report(&self) -> StatusReport {
        let timestamp = Utc::now();
        let capture = self.capture_stats.snapshot();
        StatusReport {
            timestamp,
            uptime_secs: (timestamp - self.started_at).num_seconds(),
            camera: self.source.name().to_string(),
            camera_initialized: self.source.is_initialized(),
            usb_mounted: self.transport.is_mounted(),
            usb_ready: self.transport.is_ready(),
            transport_streaming: self.transport.is_streaming_active(self.interface),
            frame_present: self.store.has_current(),
            acceptance_rate: capture.acceptance_rate(),
            stream: self.state.snapshot(),
            capture,
            streaming: self.streaming_stats.lock().clone(),
            store: self.store.stats(),
        }
    }

    fn emit(&self) {
        let report = self.report();
        if self.config.status_json {
            match serde_json::to_string(&report) {
                Ok(json) => info!(target: "uvccam::status", "{}", json),
                Err(e) => warn!("Failed to serialize status report: {}", e),
            }
        } else {
            info!("System status: {}", report.summary());
        }
    }

    /// Run until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.status_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let every = self.config.status_report_every.max(1);
        let mut ticks: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            ticks = ticks.wrapping_add(1);
            if ticks % every == 0 {
                self.emit();
            } else {
                debug!(
                    "Status tick {}: streaming={}",
                    ticks,
                    self.state.is_streaming()
                );
            }
        }

        debug!("Status monitor stopped");
    }
}
