use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for capture loop monitoring
#[derive(Debug, Default)]
pub struct CaptureStats {
    captured: AtomicU64,
    deposited: AtomicU64,
    rejected: AtomicU64,
    failures: AtomicU64,
    reinits: AtomicU64,
    reinit_failures: AtomicU64,
    last_frame_id: AtomicU64,
}

/// Snapshot of capture statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStatsSnapshot {
    pub captured: u64,
    pub deposited: u64,
    pub rejected: u64,
    pub failures: u64,
    pub reinits: u64,
    pub reinit_failures: u64,
    pub last_frame_id: u64,
}

impl CaptureStats {
    pub(super) fn record_capture(&self, frame_id: u64) {
        self.captured.fetch_add(1, Ordering::Relaxed);
        self.last_frame_id.store(frame_id, Ordering::Relaxed);
    }

    pub(super) fn record_deposit(&self) {
        self.deposited.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_reinit(&self, succeeded: bool) {
        if succeeded {
            self.reinits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reinit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            deposited: self.deposited.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            reinits: self.reinits.load(Ordering::Relaxed),
            reinit_failures: self.reinit_failures.load(Ordering::Relaxed),
            last_frame_id: self.last_frame_id.load(Ordering::Relaxed),
        }
    }
}

impl CaptureStatsSnapshot {
    /// Share of captured frames that passed validation
    pub fn acceptance_rate(&self) -> f64 {
        if self.captured > 0 {
            self.deposited as f64 / self.captured as f64
        } else {
            1.0
        }
    }
}
