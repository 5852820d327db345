use crate::error::CameraError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recovery action to take after a capture failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the capture after a delay
    RetryAfterDelay(Duration),
    /// Restart the camera peripheral before capturing again
    Reinitialize,
}

/// Consecutive-failure policy for the capture peripheral.
///
/// The counter saturates at the threshold: once reached, every further
/// failure asks for a reinitialization until one succeeds.
#[derive(Debug, Clone)]
pub struct ReinitPolicy {
    threshold: u32,
    retry_delay: Duration,
    consecutive_errors: u32,
}

impl ReinitPolicy {
    pub fn new(threshold: u32, retry_delay: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            retry_delay,
            consecutive_errors: 0,
        }
    }

    /// A capture produced a frame, valid or not
    pub fn record_success(&mut self) {
        if self.consecutive_errors > 0 {
            debug!(
                "Capture recovered after {} consecutive failure(s)",
                self.consecutive_errors
            );
        }
        self.consecutive_errors = 0;
    }

    /// Determine the recovery action for a failed capture
    pub fn record_failure(&mut self, error: &CameraError) -> RecoveryAction {
        self.consecutive_errors = (self.consecutive_errors + 1).min(self.threshold);

        if self.consecutive_errors >= self.threshold {
            warn!(
                "Camera failed {} consecutive captures ({}), reinitializing",
                self.consecutive_errors, error
            );
            RecoveryAction::Reinitialize
        } else {
            debug!(
                "Capture failed ({}/{}): {}",
                self.consecutive_errors, self.threshold, error
            );
            RecoveryAction::RetryAfterDelay(self.retry_delay)
        }
    }

    pub fn reinit_succeeded(&mut self) {
        info!("Camera reinitialized successfully");
        self.consecutive_errors = 0;
    }

    /// Stay at the threshold so the next failure retries the restart
    pub fn reinit_failed(&mut self) {
        self.consecutive_errors = self.threshold;
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> CameraError {
        CameraError::CaptureTimeout {
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_threshold_triggers_reinitialize() {
        let mut policy = ReinitPolicy::new(3, Duration::from_millis(100));

        assert_eq!(
            policy.record_failure(&timeout()),
            RecoveryAction::RetryAfterDelay(Duration::from_millis(100))
        );
        assert_eq!(
            policy.record_failure(&timeout()),
            RecoveryAction::RetryAfterDelay(Duration::from_millis(100))
        );
        assert_eq!(policy.record_failure(&timeout()), RecoveryAction::Reinitialize);
        assert_eq!(policy.consecutive_errors(), 3);
    }

    #[test]
    fn test_success_resets_counter() {
        let mut policy = ReinitPolicy::new(3, Duration::from_millis(100));
        policy.record_failure(&timeout());
        policy.record_failure(&timeout());
        policy.record_success();
        assert_eq!(policy.consecutive_errors(), 0);

        policy.record_failure(&timeout());
        policy.record_failure(&timeout());
        assert_eq!(policy.consecutive_errors(), 2);
    }

    #[test]
    fn test_counter_saturates_after_failed_reinit() {
        let mut policy = ReinitPolicy::new(2, Duration::from_millis(100));
        policy.record_failure(&timeout());
        assert_eq!(policy.record_failure(&timeout()), RecoveryAction::Reinitialize);

        policy.reinit_failed();
        assert_eq!(policy.consecutive_errors(), 2);
        assert_eq!(policy.record_failure(&timeout()), RecoveryAction::Reinitialize);
        assert_eq!(policy.consecutive_errors(), 2);

        policy.reinit_succeeded();
        assert_eq!(policy.consecutive_errors(), 0);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let mut policy = ReinitPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.threshold(), 1);
        assert_eq!(policy.record_failure(&timeout()), RecoveryAction::Reinitialize);
    }
}
