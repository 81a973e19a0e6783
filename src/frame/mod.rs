// Frame types flowing through the recording pipeline
//
// RawFrame comes from the camera and is never mutated here. EncodableFrame is
// built fresh for every accepted frame and handed to the container writer.

pub mod convert;
pub mod transform;

pub use convert::{ConvertError, PixelConverter};
pub use transform::{
    resolve_transform, FrameTransformer, ResolvedTransform, Rotation, TransformPlan,
};

use std::sync::Arc;
use std::time::Duration;

/// Camera-native planar pixel formats accepted by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Biplanar 4:2:0, interleaved CbCr, full range (AR session default)
    Nv12FullRange,
    /// Biplanar 4:2:0, interleaved CbCr, video range (16-235)
    Nv12VideoRange,
    /// Triplanar 4:2:0, video range
    I420,
}

impl PixelFormat {
    /// Minimum buffer length for a frame with the given luma stride
    pub fn buffer_size(&self, stride: u32, height: u32) -> usize {
        let luma = stride as usize * height as usize;
        let chroma_rows = (height as usize + 1) / 2;
        match self {
            PixelFormat::Nv12FullRange | PixelFormat::Nv12VideoRange => {
                luma + stride as usize * chroma_rows
            }
            PixelFormat::I420 => luma + 2 * (stride as usize / 2) * chroma_rows,
        }
    }

    pub fn is_full_range(&self) -> bool {
        matches!(self, PixelFormat::Nv12FullRange)
    }
}

/// A camera frame as delivered by the frame source
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Planar pixel data: luma plane followed by chroma plane(s)
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per luma row (>= width)
    pub stride: u32,
    /// Monotonic capture time reported by the tracking session
    pub capture_time: Duration,
}

impl RawFrame {
    /// Create a tightly packed frame (stride == width)
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        format: PixelFormat,
        width: u32,
        height: u32,
        capture_time: Duration,
    ) -> Self {
        Self {
            data: data.into(),
            format,
            width,
            height,
            stride: width,
            capture_time,
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }
}

/// Rational presentation timestamp (`value / timescale` seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    pub const fn zero(timescale: i32) -> Self {
        Self { value: 0, timescale }
    }

    /// Nanoseconds since the session origin, rounded to nearest
    pub fn as_nanos(&self) -> u64 {
        if self.timescale <= 0 || self.value <= 0 {
            return 0;
        }
        let ts = self.timescale as u128;
        ((self.value as u128 * 1_000_000_000 + ts / 2) / ts) as u64
    }

    pub fn as_secs_f64(&self) -> f64 {
        if self.timescale <= 0 {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }
}

/// Packed BGRA frame sized to the encoded geometry, ready for the container
#[derive(Debug, Clone)]
pub struct EncodableFrame {
    /// BGRA pixels, `width * height * 4` bytes, no row padding
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pts: MediaTime,
    pub duration: MediaTime,
}
