use crate::camera::{reinitialize, FrameSource};
use crate::config::{CameraConfig, CaptureConfig};
use crate::recovery::{RecoveryAction, ReinitPolicy};
use crate::state::StreamState;
use crate::store::FrameStore;
use crate::validator::{header_hex, validate_frame, FrameVerdict};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::stats::CaptureStats;

/// Whether the loop is currently pulling frames from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// Result of one capture iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No host is streaming; the loop slept
    Idle,
    Deposited { frame_id: u64 },
    Rejected { frame_id: u64, verdict: FrameVerdict },
    Failed { consecutive: u32 },
    Reinitialized,
    ReinitFailed,
}

/// Producer side of the pipeline: capture, validate, deposit.
pub struct CaptureLoop {
    source: Arc<dyn FrameSource>,
    store: Arc<FrameStore>,
    state: Arc<StreamState>,
    camera_config: CameraConfig,
    config: CaptureConfig,
    policy: ReinitPolicy,
    stats: Arc<CaptureStats>,
    phase: CaptureState,
}

impl CaptureLoop {
    pub fn new(
        source: Arc<dyn FrameSource>,
        store: Arc<FrameStore>,
        state: Arc<StreamState>,
        camera_config: CameraConfig,
        config: CaptureConfig,
    ) -> Self {
        let policy = ReinitPolicy::new(config.error_threshold, config.retry_delay());
        Self {
            source,
            store,
            state,
            camera_config,
            config,
            policy,
            stats: Arc::new(CaptureStats::default()),
            phase: CaptureState::Idle,
        }
    }

    /// Shared handle to this loop's statistics
    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    pub fn phase(&self) -> CaptureState {
        self.phase
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.policy.consecutive_errors()
    }

    /// Run until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Capture loop started on camera {}", self.source.name());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.step() => {}
            }
            tokio::task::yield_now().await;
        }

        info!("Capture loop stopped");
    }

    /// One iteration of the capture loop
    pub async fn step(&mut self) -> CaptureOutcome {
        if !self.state.is_streaming() {
            self.enter(CaptureState::Idle);
            sleep(self.config.idle_poll()).await;
            return CaptureOutcome::Idle;
        }
        self.enter(CaptureState::Capturing);

        match self.source.capture().await {
            Ok(frame) => {
                self.policy.record_success();
                self.stats.record_capture(frame.id);

                let verdict = validate_frame(&frame);
                if verdict.is_valid() {
                    let frame_id = frame.id;
                    trace!(
                        "Depositing frame {} ({}, {} bytes)",
                        frame_id,
                        frame.resolution(),
                        frame.len()
                    );
                    self.store.deposit(frame);
                    self.stats.record_deposit();
                    CaptureOutcome::Deposited { frame_id }
                } else {
                    warn!(
                        "Invalid frame {} rejected ({}): len={}, header={}",
                        frame.id,
                        verdict,
                        frame.len(),
                        header_hex(frame.data())
                    );
                    let frame_id = frame.id;
                    self.source.release(frame);
                    self.stats.record_rejection();
                    CaptureOutcome::Rejected { frame_id, verdict }
                }
            }
            Err(e) => {
                self.stats.record_failure();
                match self.policy.record_failure(&e) {
                    RecoveryAction::RetryAfterDelay(delay) => {
                        sleep(delay).await;
                        CaptureOutcome::Failed {
                            consecutive: self.policy.consecutive_errors(),
                        }
                    }
                    RecoveryAction::Reinitialize => self.reinitialize().await,
                }
            }
        }
    }

    async fn reinitialize(&mut self) -> CaptureOutcome {
        // The held frame belongs to the pool being torn down
        self.store.clear();

        let result = reinitialize(
            self.source.as_ref(),
            &self.camera_config,
            self.config.reinit_settle(),
        )
        .await;

        match result {
            Ok(()) => {
                self.policy.reinit_succeeded();
                self.stats.record_reinit(true);
                sleep(self.config.retry_delay()).await;
                CaptureOutcome::Reinitialized
            }
            Err(e) => {
                error!(
                    "Camera reinitialization failed: {}, retrying in {:?}",
                    e,
                    self.config.reinit_backoff()
                );
                self.policy.reinit_failed();
                self.stats.record_reinit(false);
                sleep(self.config.reinit_backoff()).await;
                CaptureOutcome::ReinitFailed
            }
        }
    }

    fn enter(&mut self, phase: CaptureState) {
        if self.phase != phase {
            match phase {
                CaptureState::Capturing => info!("Host streaming, capture active"),
                CaptureState::Idle => info!("Host not streaming, capture idle"),
            }
            debug!("Capture state {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}
