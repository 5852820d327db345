use crate::camera::FrameSource;
use crate::frame::Frame;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::trace;

/// Single-permit "new frame available" notification.
///
/// Firing stores at most one permit, so any number of fires before a wait
/// produce exactly one successful wait.
#[derive(Debug, Default)]
pub struct FrameSignal {
    notify: Notify,
}

impl FrameSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.notify.notify_one();
    }

    /// Wait for a fire, giving up after `window`. Returns `true` if the
    /// signal was consumed.
    pub async fn wait(&self, window: Duration) -> bool {
        timeout(window, self.notify.notified()).await.is_ok()
    }
}

/// Statistics for frame store monitoring
#[derive(Debug, Default)]
struct FrameStoreStats {
    deposits: AtomicU64,
    superseded: AtomicU64,
    peeks: AtomicU64,
}

/// Snapshot of frame store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrameStoreStatsSnapshot {
    pub deposits: u64,
    pub superseded: u64,
    pub peeks: u64,
}

/// Read-only borrow of the frame currently held by the store.
///
/// The capture side cannot replace the frame while this borrow is alive, so
/// keep it short and never hold it across an `.await`.
pub struct FrameRef<'a>(MappedMutexGuard<'a, Frame>);

impl Deref for FrameRef<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.0
    }
}

/// Latest-validated-frame exchange between the capture and streaming loops.
///
/// Holds at most one frame. Depositing releases the previous frame back to
/// its source, installs the new one and fires the frame-ready signal, in that
/// order, under the slot lock; a reader woken by the signal always observes
/// the frame that was installed before the fire.
pub struct FrameStore {
    source: Arc<dyn FrameSource>,
    current: Mutex<Option<Frame>>,
    signal: FrameSignal,
    stats: FrameStoreStats,
}

impl FrameStore {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self {
            source,
            current: Mutex::new(None),
            signal: FrameSignal::new(),
            stats: FrameStoreStats::default(),
        }
    }

    /// Replace the current frame and wake the streaming side
    pub fn deposit(&self, frame: Frame) {
        let id = frame.id;
        {
            let mut slot = self.current.lock();
            if let Some(previous) = slot.take() {
                trace!("Frame {} superseded by {}", previous.id, id);
                self.source.release(previous);
                self.stats.superseded.fetch_add(1, Ordering::Relaxed);
            }
            *slot = Some(frame);
        }

        self.stats.deposits.fetch_add(1, Ordering::Relaxed);
        self.signal.fire();
        trace!("Frame {} deposited", id);
    }

    /// Borrow the current frame without taking ownership
    pub fn peek_current(&self) -> Option<FrameRef<'_>> {
        let guard = MutexGuard::try_map(self.current.lock(), |slot| slot.as_mut()).ok()?;
        self.stats.peeks.fetch_add(1, Ordering::Relaxed);
        Some(FrameRef(guard))
    }

    /// Wait up to `window` for a deposit since the last successful wait
    pub async fn wait_for_frame(&self, window: Duration) -> bool {
        self.signal.wait(window).await
    }

    pub fn has_current(&self) -> bool {
        self.current.lock().is_some()
    }

    pub fn current_id(&self) -> Option<u64> {
        self.current.lock().as_ref().map(|frame| frame.id)
    }

    /// Give the held frame back to its source, leaving the slot empty
    pub fn clear(&self) {
        if let Some(frame) = self.current.lock().take() {
            self.source.release(frame);
        }
    }

    pub fn stats(&self) -> FrameStoreStatsSnapshot {
        FrameStoreStatsSnapshot {
            deposits: self.stats.deposits.load(Ordering::Relaxed),
            superseded: self.stats.superseded.load(Ordering::Relaxed),
            peeks: self.stats.peeks.load(Ordering::Relaxed),
        }
    }
}
