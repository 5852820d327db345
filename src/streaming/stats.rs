use serde::Serialize;
use std::time::Instant;

/// Statistics for streaming performance monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamingStats {
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub empty_slots: u64,
    pub submit_errors: u64,
    pub bytes_streamed: u64,
    #[serde(skip)]
    pub last_frame_time: Option<Instant>,
}

impl StreamingStats {
    pub fn update_frame_stats(&mut self, frame_size: usize) {
        self.frames_sent += 1;
        self.bytes_streamed += frame_size as u64;
        self.last_frame_time = Some(Instant::now());
    }

    pub fn record_skipped_frame(&mut self) {
        self.frames_skipped += 1;
    }

    pub fn record_empty_slot(&mut self) {
        self.empty_slots += 1;
    }

    pub fn record_submit_error(&mut self) {
        self.submit_errors += 1;
    }
}
