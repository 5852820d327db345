//! Structural sanity checks for captured frames.
//!
//! Only the JPEG start-of-image and end-of-image markers are inspected. A
//! truncated image that happens to end in `FF D9` passes; decoding is left to
//! the host.

use crate::frame::{Frame, FrameFormat};
use std::fmt;

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Smallest buffer that can hold both markers
pub const MIN_JPEG_LEN: usize = 4;

/// Check that a buffer starts with SOI and ends with EOI
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    if data.len() < MIN_JPEG_LEN {
        return false;
    }

    data.starts_with(&JPEG_SOI) && data.ends_with(&JPEG_EOI)
}

/// Outcome of validating a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    Valid,
    /// The peripheral handed back a zero-length buffer
    Empty,
    /// The peripheral produced something other than JPEG
    WrongFormat(FrameFormat),
    /// Missing start or end marker
    BadMarkers,
}

impl FrameVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, FrameVerdict::Valid)
    }
}

impl fmt::Display for FrameVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameVerdict::Valid => write!(f, "valid"),
            FrameVerdict::Empty => write!(f, "empty buffer"),
            FrameVerdict::WrongFormat(format) => write!(f, "unexpected format {:?}", format),
            FrameVerdict::BadMarkers => write!(f, "missing JPEG markers"),
        }
    }
}

/// Validate a frame's format tag and payload
pub fn validate_frame(frame: &Frame) -> FrameVerdict {
    if frame.is_empty() {
        return FrameVerdict::Empty;
    }

    if frame.format != FrameFormat::Jpeg {
        return FrameVerdict::WrongFormat(frame.format);
    }

    if is_valid_jpeg(frame.data()) {
        FrameVerdict::Valid
    } else {
        FrameVerdict::BadMarkers
    }
}

/// First four bytes of a buffer as hex, for diagnostics
pub fn header_hex(data: &[u8]) -> String {
    data.iter()
        .take(4)
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
