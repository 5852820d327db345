mod stats;
mod uvc;

pub use stats::StreamingStats;
pub use uvc::{StreamOutcome, StreamingLoop};
