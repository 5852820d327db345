use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Pixel format tag reported by the camera peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Baseline JPEG, one complete image per frame
    Jpeg,
    /// YUV 4:2:2 packed
    Yuv422,
    /// RGB 5-6-5 packed
    Rgb565,
    /// 8-bit luminance
    Grayscale,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Jpeg => 0, // Variable size, compressed
            FrameFormat::Yuv422 => 2,
            FrameFormat::Rgb565 => 2,
            FrameFormat::Grayscale => 1,
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const QVGA: Resolution = Resolution {
        width: 320,
        height: 240,
    };
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };
    pub const SVGA: Resolution = Resolution {
        width: 800,
        height: 600,
    };

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured image.
///
/// A `Frame` is not `Clone`: it stands for a buffer owned by the
/// camera peripheral, and exactly one component holds it at a time until it
/// is handed back through [`FrameSource::release`](crate::camera::FrameSource::release).
#[derive(Debug)]
pub struct Frame {
    /// Monotonic capture sequence number
    pub id: u64,
    /// Index of the peripheral buffer this frame occupies
    pub slot: usize,
    pub timestamp: SystemTime,
    pub format: FrameFormat,
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(
        id: u64,
        slot: usize,
        data: Vec<u8>,
        resolution: Resolution,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            slot,
            timestamp: SystemTime::now(),
            format,
            width: resolution.width,
            height: resolution.height,
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }
}
