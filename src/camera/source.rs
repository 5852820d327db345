use super::sensor::SensorSettings;
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::Frame;
use async_trait::async_trait;

/// Camera peripheral that lends out frame buffers.
///
/// Buffers come from a fixed pool owned by the peripheral. Every [`Frame`]
/// returned by [`capture`](FrameSource::capture) must come back through
/// [`release`](FrameSource::release) exactly once; a pool with every buffer
/// lent out cannot capture.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Power up the sensor and allocate the buffer pool
    async fn initialize(&self, config: &CameraConfig) -> Result<(), CameraError>;

    /// Wait for the next frame. The wait is bounded by the configured
    /// capture timeout; the source reports an error instead of hanging.
    async fn capture(&self) -> Result<Frame, CameraError>;

    /// Hand a buffer back to the pool
    fn release(&self, frame: Frame);

    /// Tear down the peripheral. Outstanding frames become invalid.
    async fn deinitialize(&self) -> Result<(), CameraError>;

    /// Push image tuning registers to the sensor
    fn apply_sensor_settings(&self, _settings: &SensorSettings) -> Result<(), CameraError> {
        Ok(())
    }

    fn is_initialized(&self) -> bool;

    /// Short name used in logs
    fn name(&self) -> &str;
}
