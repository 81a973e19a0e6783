//! Planar YCbCr → packed BGRA conversion
//!
//! Camera frames arrive as 4:2:0 planar images (NV12 from AR sessions, I420 from
//! some capture paths). Encoders behind the container writer take packed BGRA,
//! so every accepted frame goes through [`PixelConverter::convert`].
//!
//! Coefficients are BT.601 in 10-bit fixed point. Full-range input uses the
//! JPEG/JFIF matrix, video-range input expands 16-235 luma first.

use super::{PixelFormat, RawFrame};

/// Error type for pixel conversion
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("Empty frame ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("4:2:0 frames need even dimensions, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },

    #[error("Stride {stride} is smaller than width {width}")]
    BadStride { stride: u32, width: u32 },

    #[error("Buffer too small: {actual} bytes, need {expected}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("Could not allocate {0} bytes for output frame")]
    Allocation(usize),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Bytes per output pixel
pub const BGRA_BYTES_PER_PIXEL: usize = 4;

/// Stateless converter from camera-native planar frames to packed BGRA
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelConverter;

impl PixelConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert a raw frame to a freshly allocated BGRA buffer of the same size.
    pub fn convert(&self, frame: &RawFrame) -> Result<Vec<u8>> {
        let (width, height, stride) = (frame.width, frame.height, frame.stride);
        if width == 0 || height == 0 {
            return Err(ConvertError::Empty { width, height });
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ConvertError::OddDimensions { width, height });
        }
        if stride < width {
            return Err(ConvertError::BadStride { stride, width });
        }

        let expected = frame.format.buffer_size(stride, height);
        if frame.data.len() < expected {
            return Err(ConvertError::BufferTooSmall {
                expected,
                actual: frame.data.len(),
            });
        }

        let out_len = width as usize * height as usize * BGRA_BYTES_PER_PIXEL;
        let mut out = Vec::new();
        out.try_reserve_exact(out_len)
            .map_err(|_| ConvertError::Allocation(out_len))?;
        out.resize(out_len, 0);

        let w = width as usize;
        let h = height as usize;
        let stride = stride as usize;
        let data = &frame.data[..];
        let luma_size = stride * h;
        let full_range = frame.format.is_full_range();

        for y in 0..h {
            let luma_row = &data[y * stride..y * stride + w];
            let row_bytes = w * BGRA_BYTES_PER_PIXEL;
            let out_row = &mut out[y * row_bytes..(y + 1) * row_bytes];

            match frame.format {
                PixelFormat::Nv12FullRange | PixelFormat::Nv12VideoRange => {
                    let chroma_start = luma_size + (y / 2) * stride;
                    let chroma_row = &data[chroma_start..chroma_start + w];
                    for x in 0..w {
                        let cb = chroma_row[x & !1];
                        let cr = chroma_row[(x & !1) + 1];
                        write_bgra(&mut out_row[x * 4..x * 4 + 4], luma_row[x], cb, cr, full_range);
                    }
                }
                PixelFormat::I420 => {
                    let chroma_stride = stride / 2;
                    let chroma_plane = chroma_stride * ((h + 1) / 2);
                    let cb_start = luma_size + (y / 2) * chroma_stride;
                    let cr_start = cb_start + chroma_plane;
                    let cb_row = &data[cb_start..cb_start + w / 2];
                    let cr_row = &data[cr_start..cr_start + w / 2];
                    for x in 0..w {
                        let (cb, cr) = (cb_row[x / 2], cr_row[x / 2]);
                        write_bgra(&mut out_row[x * 4..x * 4 + 4], luma_row[x], cb, cr, full_range);
                    }
                }
            }
        }

        Ok(out)
    }
}

#[inline]
fn write_bgra(px: &mut [u8], y: u8, cb: u8, cr: u8, full_range: bool) {
    let cb = cb as i32 - 128;
    let cr = cr as i32 - 128;

    let (r, g, b) = if full_range {
        let y = (y as i32) << 10;
        (
            (y + 1436 * cr + 512) >> 10,
            (y - 352 * cb - 731 * cr + 512) >> 10,
            (y + 1815 * cb + 512) >> 10,
        )
    } else {
        let y = (y as i32 - 16) * 1192;
        (
            (y + 1634 * cr + 512) >> 10,
            (y - 401 * cb - 832 * cr + 512) >> 10,
            (y + 2066 * cb + 512) >> 10,
        )
    };

    px[0] = b.clamp(0, 255) as u8;
    px[1] = g.clamp(0, 255) as u8;
    px[2] = r.clamp(0, 255) as u8;
    px[3] = 255;
}
