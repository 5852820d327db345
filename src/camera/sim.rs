use super::sensor::SensorSettings;
use super::source::FrameSource;
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{Frame, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

/// Faults injected by the simulated peripheral
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Every n-th capture times out
    pub drop_every: Option<u64>,
    /// Every n-th captured frame has a broken start marker
    pub corrupt_every: Option<u64>,
    /// Number of initialization attempts that fail before one succeeds
    pub failed_inits: u32,
}

impl FaultPlan {
    fn hits(every: Option<u64>, sequence: u64) -> bool {
        matches!(every, Some(n) if n > 0 && (sequence + 1) % n == 0)
    }
}

struct PoolState {
    config: Option<CameraConfig>,
    free: Vec<usize>,
    /// Slot -> id of the frame currently holding it
    lent: HashMap<usize, u64>,
    failed_inits_left: u32,
}

/// Software stand-in for a JPEG camera with a fixed buffer pool
pub struct SimulatedCamera {
    frame_interval: Duration,
    faults: FaultPlan,
    pool: Mutex<PoolState>,
    frame_counter: AtomicU64,
    capture_attempts: AtomicU64,
    stale_releases: AtomicU64,
}

impl SimulatedCamera {
    pub fn new(frame_interval: Duration, faults: FaultPlan) -> Self {
        Self {
            frame_interval,
            faults,
            pool: Mutex::new(PoolState {
                config: None,
                free: Vec::new(),
                lent: HashMap::new(),
                failed_inits_left: faults.failed_inits,
            }),
            frame_counter: AtomicU64::new(0),
            capture_attempts: AtomicU64::new(0),
            stale_releases: AtomicU64::new(0),
        }
    }

    /// Buffers currently lent out
    pub fn outstanding(&self) -> usize {
        self.pool.lock().lent.len()
    }

    /// Releases of frames that no longer belonged to the pool
    pub fn stale_releases(&self) -> u64 {
        self.stale_releases.load(Ordering::Relaxed)
    }

    /// Get current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    fn take_slot(&self) -> Result<(usize, CameraConfig), CameraError> {
        let mut pool = self.pool.lock();
        let config = pool.config.clone().ok_or(CameraError::NotInitialized)?;
        let slot = pool.free.pop().ok_or(CameraError::PoolExhausted {
            count: config.fb_count,
        })?;
        Ok((slot, config))
    }

    fn return_slot(&self, slot: usize) {
        let mut pool = self.pool.lock();
        if pool.config.is_some() {
            pool.free.push(slot);
        }
    }

    fn synthesize(id: u64, config: &CameraConfig) -> Vec<u8> {
        match config.format {
            FrameFormat::Jpeg => {
                let mut data = vec![
                    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
                    0x01, 0x01, 0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
                ];

                // Higher quality values mean stronger compression
                let base = 4000usize.saturating_sub(config.jpeg_quality as usize * 50);
                let pattern_size = base + (id % 500) as usize;
                let pattern_byte = (id % 256) as u8;
                data.extend(std::iter::repeat(pattern_byte).take(pattern_size));
                data.extend_from_slice(&[0xFF, 0xD9]);
                data
            }
            format => vec![(id % 256) as u8; config.resolution.pixels() * format.bytes_per_pixel()],
        }
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    async fn initialize(&self, config: &CameraConfig) -> Result<(), CameraError> {
        let mut pool = self.pool.lock();

        if pool.failed_inits_left > 0 {
            pool.failed_inits_left -= 1;
            return Err(CameraError::Init {
                details: "sensor did not answer on SCCB".to_string(),
            });
        }

        pool.free = (0..config.fb_count).rev().collect();
        pool.lent.clear();
        pool.config = Some(config.clone());

        info!(
            "Simulated camera ready: {} {:?}, {} buffer(s) in {:?}",
            config.resolution, config.format, config.fb_count, config.fb_location
        );
        Ok(())
    }

    async fn capture(&self) -> Result<Frame, CameraError> {
        let attempt = self.capture_attempts.fetch_add(1, Ordering::Relaxed);

        let (slot, config) = match self.take_slot() {
            Ok(taken) => taken,
            Err(CameraError::PoolExhausted { .. }) => {
                // Wait out the capture timeout for a buffer to come back
                let timeout = self
                    .pool
                    .lock()
                    .config
                    .as_ref()
                    .map(|c| c.capture_timeout())
                    .unwrap_or_default();
                sleep(timeout).await;
                self.take_slot()?
            }
            Err(e) => return Err(e),
        };

        let timeout = config.capture_timeout();

        if FaultPlan::hits(self.faults.drop_every, attempt) {
            sleep(timeout).await;
            self.return_slot(slot);
            return Err(CameraError::CaptureTimeout { timeout });
        }

        sleep(self.frame_interval.min(timeout)).await;

        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let mut data = Self::synthesize(id, &config);
        if FaultPlan::hits(self.faults.corrupt_every, id) {
            data[0] = 0x00;
        }

        {
            let mut pool = self.pool.lock();
            if pool.config.is_none() {
                // Deinitialized while we were exposing
                return Err(CameraError::NotInitialized);
            }
            pool.lent.insert(slot, id);
        }

        trace!(
            "Generated simulated frame {} in slot {} ({} bytes)",
            id,
            slot,
            data.len()
        );

        Ok(Frame::new(id, slot, data, config.resolution, config.format))
    }

    fn release(&self, frame: Frame) {
        let mut pool = self.pool.lock();
        match pool.lent.get(&frame.slot) {
            Some(&id) if id == frame.id => {
                pool.lent.remove(&frame.slot);
                pool.free.push(frame.slot);
                trace!("Frame {} returned to slot {}", frame.id, frame.slot);
            }
            _ => {
                self.stale_releases.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Ignoring release of frame {} (slot {} no longer lent to it)",
                    frame.id, frame.slot
                );
            }
        }
    }

    async fn deinitialize(&self) -> Result<(), CameraError> {
        let mut pool = self.pool.lock();
        if pool.config.take().is_none() {
            return Err(CameraError::Deinit {
                details: "camera was not initialized".to_string(),
            });
        }
        if !pool.lent.is_empty() {
            warn!(
                "Deinitializing camera with {} buffer(s) still lent out",
                pool.lent.len()
            );
        }
        pool.free.clear();
        pool.lent.clear();
        info!("Simulated camera deinitialized");
        Ok(())
    }

    fn apply_sensor_settings(&self, settings: &SensorSettings) -> Result<(), CameraError> {
        if self.pool.lock().config.is_none() {
            return Err(CameraError::NotInitialized);
        }
        debug!(
            "Simulated sensor tuned (brightness {}, contrast {}, aec {})",
            settings.brightness, settings.contrast, settings.aec_value
        );
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.pool.lock().config.is_some()
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Builder for the simulated camera
pub struct SimulatedCameraBuilder {
    frame_interval: Duration,
    faults: FaultPlan,
}

impl SimulatedCameraBuilder {
    pub fn new() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            faults: FaultPlan::default(),
        }
    }

    /// Time the sensor needs to expose one frame
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    pub fn build(self) -> SimulatedCamera {
        SimulatedCamera::new(self.frame_interval, self.faults)
    }
}

impl Default for SimulatedCameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}
