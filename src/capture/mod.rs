mod core;
mod stats;
#[cfg(test)]
mod tests;

pub use core::{CaptureLoop, CaptureOutcome, CaptureState};
pub use stats::{CaptureStats, CaptureStatsSnapshot};
