use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a preview buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit luma only ("Y800" / GREY)
    Y800,
    /// YUV 4:2:0 semi-planar, luma plane followed by interleaved VU
    Nv21,
}

impl PixelFormat {
    /// Number of bytes a full frame occupies
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        match self {
            PixelFormat::Y800 => luma,
            PixelFormat::Nv21 => luma + luma / 2,
        }
    }

    /// Four-character code handed to decoders
    pub fn fourcc(&self) -> &'static str {
        match self {
            PixelFormat::Y800 => "Y800",
            PixelFormat::Nv21 => "NV21",
        }
    }
}

/// One preview frame delivered by the capture device
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Sequence number assigned by the device
    pub sequence: u64,
    /// Time the device delivered the frame
    pub timestamp: SystemTime,
    /// Raw pixel bytes (shared so the decoder never copies the buffer)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameBuffer {
    pub fn new(sequence: u64, data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            sequence,
            timestamp: SystemTime::now(),
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Expected byte length for the declared size and format
    pub fn expected_len(&self) -> usize {
        self.format.frame_len(self.width, self.height)
    }

    /// Whether the buffer is large enough for its declared size
    pub fn validate_size(&self) -> bool {
        self.data.len() >= self.expected_len()
    }

    /// Luma sample at (x, y); both formats start with a full luma plane
    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}
