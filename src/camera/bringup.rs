use super::source::FrameSource;
use crate::config::CameraConfig;
use crate::error::CameraError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Initialize the peripheral, tune the sensor and take warm-up captures.
///
/// Only the initialization itself can fail; tuning and warm-up problems are
/// logged and bring-up continues.
pub async fn bring_up(source: &dyn FrameSource, config: &CameraConfig) -> Result<(), CameraError> {
    info!(
        "Initializing camera {} ({} {:?}, quality {}, {} buffer(s))",
        source.name(),
        config.resolution,
        config.format,
        config.jpeg_quality,
        config.fb_count
    );

    source.initialize(config).await?;

    sleep(config.settle_delay()).await;

    match apply_sensor_settings(source, config) {
        Ok(()) => warm_up(source, config.warmup_captures, config.warmup_interval()).await,
        Err(e) => warn!("Sensor tuning unavailable, skipping warm-up: {}", e),
    }

    info!("Camera initialized successfully");
    Ok(())
}

/// Full peripheral restart: deinitialize, settle, initialize
pub async fn reinitialize(
    source: &dyn FrameSource,
    config: &CameraConfig,
    settle: Duration,
) -> Result<(), CameraError> {
    if let Err(e) = source.deinitialize().await {
        warn!("Camera deinitialization reported an error: {}", e);
    }

    sleep(settle).await;

    source.initialize(config).await?;

    if let Err(e) = apply_sensor_settings(source, config) {
        warn!("Failed to restore sensor settings after restart: {}", e);
    }

    Ok(())
}

fn apply_sensor_settings(source: &dyn FrameSource, config: &CameraConfig) -> Result<(), CameraError> {
    let invalid = config.sensor.out_of_range();
    if !invalid.is_empty() {
        warn!("Sensor settings out of range, driver may clamp: {:?}", invalid);
    }

    source.apply_sensor_settings(&config.sensor)?;
    debug!("Applied sensor settings: {:?}", config.sensor);
    Ok(())
}

/// Capture and immediately release a few frames so auto exposure settles
async fn warm_up(source: &dyn FrameSource, captures: u32, interval: Duration) {
    for attempt in 1..=captures {
        match source.capture().await {
            Ok(frame) => {
                info!(
                    "Warmup capture {}: len={}, format={:?}",
                    attempt,
                    frame.len(),
                    frame.format
                );
                source.release(frame);
            }
            Err(e) => debug!("Warmup capture {} failed: {}", attempt, e),
        }
        sleep(interval).await;
    }
}
