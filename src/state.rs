use crate::usb::{StreamInterface, UsbEventSink};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Host-driven streaming state shared by the USB callbacks and both loops.
///
/// `host_wants_stream` is written only by the USB event callbacks and read by
/// the capture and streaming loops.
#[derive(Debug, Default)]
pub struct StreamState {
    host_wants_stream: AtomicBool,
    mounted: AtomicBool,
    commits: AtomicU64,
    uncommits: AtomicU64,
    frames_completed: AtomicU64,
}

/// Snapshot of the stream state for status reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStateSnapshot {
    pub streaming: bool,
    pub mounted: bool,
    pub commits: u64,
    pub uncommits: u64,
    pub frames_completed: u64,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_streaming(&self) -> bool {
        self.host_wants_stream.load(Ordering::Acquire)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    fn set_streaming(&self, streaming: bool) -> bool {
        self.host_wants_stream.swap(streaming, Ordering::AcqRel)
    }

    fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::Release);
    }

    pub fn snapshot(&self) -> StreamStateSnapshot {
        StreamStateSnapshot {
            streaming: self.is_streaming(),
            mounted: self.is_mounted(),
            commits: self.commits.load(Ordering::Relaxed),
            uncommits: self.uncommits.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
        }
    }
}

/// USB lifecycle handler that drives [`StreamState`]
pub struct StreamControl {
    state: Arc<StreamState>,
    unmount_stops_stream: bool,
}

impl StreamControl {
    pub fn new(state: Arc<StreamState>, unmount_stops_stream: bool) -> Self {
        Self {
            state,
            unmount_stops_stream,
        }
    }
}

impl UsbEventSink for StreamControl {
    fn on_commit(&self, interface: StreamInterface) {
        self.state.commits.fetch_add(1, Ordering::Relaxed);
        self.state.set_streaming(true);
        info!(
            "UVC stream commit on {} - host requesting video stream start",
            interface
        );
    }

    fn on_uncommit(&self, control: u8) {
        self.state.uncommits.fetch_add(1, Ordering::Relaxed);
        self.state.set_streaming(false);
        info!("UVC stream uncommit on vc{} - host stopped video stream", control);
    }

    fn on_mount(&self) {
        self.state.set_mounted(true);
        info!("USB device mounted");
    }

    fn on_unmount(&self) {
        self.state.set_mounted(false);
        if self.unmount_stops_stream && self.state.set_streaming(false) {
            info!("USB device unmounted - stopping active stream");
        } else {
            info!("USB device unmounted");
        }
    }

    fn on_frame_complete(&self, control: u8) {
        let completed = self.state.frames_completed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Frame transfer {} complete on vc{}", completed, control);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO: StreamInterface = StreamInterface {
        control: 0,
        streaming: 0,
    };

    #[test]
    fn test_commit_and_uncommit_toggle_flag() {
        let state = Arc::new(StreamState::new());
        let control = StreamControl::new(state.clone(), true);
        assert!(!state.is_streaming());

        control.on_commit(VIDEO);
        assert!(state.is_streaming());

        control.on_uncommit(0);
        assert!(!state.is_streaming());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.commits, 1);
        assert_eq!(snapshot.uncommits, 1);
    }

    #[test]
    fn test_mount_does_not_start_stream() {
        let state = Arc::new(StreamState::new());
        let control = StreamControl::new(state.clone(), true);

        control.on_mount();
        assert!(state.is_mounted());
        assert!(!state.is_streaming());
    }

    #[test]
    fn test_unmount_policy() {
        let state = Arc::new(StreamState::new());
        let stopping = StreamControl::new(state.clone(), true);
        stopping.on_mount();
        stopping.on_commit(VIDEO);
        stopping.on_unmount();
        assert!(!state.is_mounted());
        assert!(!state.is_streaming());

        let state = Arc::new(StreamState::new());
        let keeping = StreamControl::new(state.clone(), false);
        keeping.on_mount();
        keeping.on_commit(VIDEO);
        keeping.on_unmount();
        assert!(!state.is_mounted());
        assert!(state.is_streaming());
    }

    #[test]
    fn test_frame_complete_counted() {
        let state = Arc::new(StreamState::new());
        let control = StreamControl::new(state.clone(), true);
        control.on_frame_complete(0);
        control.on_frame_complete(0);
        assert_eq!(state.snapshot().frames_completed, 2);
    }
}
