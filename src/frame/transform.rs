//! Orientation resolution and aspect-aware scale/crop
//!
//! Encoded frames always stay in the camera sensor's native (landscape) axis.
//! Device orientation is expressed as a track-level rotation that players apply
//! on display, so pixel data is never rotated per frame.
//!
//! Mapping a source frame onto the fixed encoded size covers the target and crops
//! the excess symmetrically; it never letterboxes.

use crate::config::{DeviceClass, Orientation};

/// Aspect ratios closer than this are treated as equal and only scaled
pub const ASPECT_TOLERANCE: f64 = 0.01;

/// Error type for frame transforms
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("Empty source frame ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("Source buffer too small: {actual} bytes, need {expected}")]
    BufferTooSmall { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Display rotation stored in the output track (clockwise)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Identity => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Value for the `image-orientation` stream tag
    pub fn image_orientation_tag(&self) -> &'static str {
        match self {
            Rotation::Identity => "rotate-0",
            Rotation::Rotate90 => "rotate-90",
            Rotation::Rotate180 => "rotate-180",
            Rotation::Rotate270 => "rotate-270",
        }
    }

    /// Whether the displayed picture has width and height swapped
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

/// Encoded geometry plus the rotation a player must apply to show it upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTransform {
    pub encoded_width: u32,
    pub encoded_height: u32,
    pub rotation: Rotation,
}

/// Resolve device orientation into sensor-aligned encoded dimensions and a track rotation.
///
/// `target_width`/`target_height` describe the upright picture. Phones have no
/// upside-down portrait interface, so that orientation resolves like `Portrait`.
/// Encoded dimensions are rounded down to even values (4:2:0 encoders need them).
pub fn resolve_transform(
    orientation: Orientation,
    device_class: DeviceClass,
    target_width: u32,
    target_height: u32,
) -> ResolvedTransform {
    let rotation = match (orientation, device_class) {
        (Orientation::LandscapeRight, _) => Rotation::Identity,
        (Orientation::LandscapeLeft, _) => Rotation::Rotate180,
        (Orientation::Portrait, _) => Rotation::Rotate90,
        (Orientation::PortraitUpsideDown, DeviceClass::Phone) => Rotation::Rotate90,
        (Orientation::PortraitUpsideDown, DeviceClass::Tablet) => Rotation::Rotate270,
    };

    let (w, h) = if rotation.swaps_axes() {
        (target_height, target_width)
    } else {
        (target_width, target_height)
    };

    ResolvedTransform {
        encoded_width: even(w),
        encoded_height: even(h),
        rotation,
    }
}

fn even(v: u32) -> u32 {
    (v & !1).max(2)
}

/// Scale and crop parameters for one source size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPlan {
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Pixels cut from the left (and right) of the scaled source
    pub crop_x: u32,
    /// Pixels cut from the top (and bottom) of the scaled source
    pub crop_y: u32,
}

impl TransformPlan {
    pub fn new(
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Self {
        let (ws, hs) = (source_width as f64, source_height as f64);
        let (wt, ht) = (target_width as f64, target_height as f64);

        let aspect_ratio = (ws / hs) / (wt / ht);
        if (aspect_ratio - 1.0).abs() <= ASPECT_TOLERANCE {
            return Self {
                source_width,
                source_height,
                target_width,
                target_height,
                scale_x: wt / ws,
                scale_y: ht / hs,
                crop_x: 0,
                crop_y: 0,
            };
        }

        // Cover: the axis that needs more scaling decides, the other overflows
        let scale = (wt / ws).max(ht / hs);
        let scaled_w = (ws * scale).round() as u32;
        let scaled_h = (hs * scale).round() as u32;

        Self {
            source_width,
            source_height,
            target_width,
            target_height,
            scale_x: scale,
            scale_y: scale,
            crop_x: scaled_w.saturating_sub(target_width) / 2,
            crop_y: scaled_h.saturating_sub(target_height) / 2,
        }
    }

    pub fn scaled_width(&self) -> u32 {
        (self.source_width as f64 * self.scale_x).round() as u32
    }

    pub fn scaled_height(&self) -> u32 {
        (self.source_height as f64 * self.scale_y).round() as u32
    }

    pub fn is_passthrough(&self) -> bool {
        self.source_width == self.target_width && self.source_height == self.target_height
    }

    /// Source-space x coordinate sampled for output column `x` (pixel centres)
    pub fn source_x(&self, x: u32) -> f64 {
        (x as f64 + self.crop_x as f64 + 0.5) / self.scale_x - 0.5
    }

    /// Source-space y coordinate sampled for output row `y` (pixel centres)
    pub fn source_y(&self, y: u32) -> f64 {
        (y as f64 + self.crop_y as f64 + 0.5) / self.scale_y - 0.5
    }
}

/// Maps converted BGRA frames of any size onto the fixed encoded size
pub struct FrameTransformer {
    target_width: u32,
    target_height: u32,
    plan: Option<TransformPlan>,
    /// Horizontal taps for the cached plan, one per output column
    columns: Vec<Tap>,
}

impl FrameTransformer {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            plan: None,
            columns: Vec::new(),
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Plan for the given source size, cached until the source size changes
    pub fn plan_for(&mut self, source_width: u32, source_height: u32) -> TransformPlan {
        if let Some(plan) = self.plan {
            if plan.source_width == source_width && plan.source_height == source_height {
                return plan;
            }
        }

        let plan = TransformPlan::new(
            source_width,
            source_height,
            self.target_width,
            self.target_height,
        );
        log::debug!(
            "[Transform] {}x{} -> {}x{} (scale {:.4}x{:.4}, crop {},{})",
            source_width,
            source_height,
            self.target_width,
            self.target_height,
            plan.scale_x,
            plan.scale_y,
            plan.crop_x,
            plan.crop_y
        );
        self.columns = (0..self.target_width)
            .map(|x| Tap::new(plan.source_x(x), source_width))
            .collect();
        self.plan = Some(plan);
        plan
    }

    /// Scale and crop a packed BGRA frame to exactly the target size.
    pub fn transform(
        &mut self,
        src: &[u8],
        source_width: u32,
        source_height: u32,
    ) -> Result<Vec<u8>> {
        if source_width == 0 || source_height == 0 {
            return Err(TransformError::Empty {
                width: source_width,
                height: source_height,
            });
        }
        let expected = source_width as usize * source_height as usize * 4;
        if src.len() < expected {
            return Err(TransformError::BufferTooSmall {
                expected,
                actual: src.len(),
            });
        }

        let plan = self.plan_for(source_width, source_height);
        if plan.is_passthrough() {
            return Ok(src[..expected].to_vec());
        }

        let (wt, ht) = (self.target_width as usize, self.target_height as usize);
        let ws = source_width as usize;

        let mut out = vec![0u8; wt * ht * 4];
        for (y, out_row) in out.chunks_exact_mut(wt * 4).enumerate() {
            let row = Tap::new(plan.source_y(y as u32), source_height);
            let row0 = &src[row.i0 * ws * 4..(row.i0 + 1) * ws * 4];
            let row1 = &src[row.i1 * ws * 4..(row.i1 + 1) * ws * 4];
            let (wy1, wy0) = (row.frac, 256 - row.frac);

            for (col, px) in self.columns.iter().zip(out_row.chunks_exact_mut(4)) {
                let (wx1, wx0) = (col.frac, 256 - col.frac);
                let (a, b) = (col.i0 * 4, col.i1 * 4);
                for c in 0..4 {
                    let v = row0[a + c] as u32 * wx0 * wy0
                        + row0[b + c] as u32 * wx1 * wy0
                        + row1[a + c] as u32 * wx0 * wy1
                        + row1[b + c] as u32 * wx1 * wy1;
                    px[c] = ((v + 32_768) >> 16) as u8;
                }
            }
        }

        Ok(out)
    }
}

/// Bilinear tap: two neighbouring indices and the weight (0..=256) of the second
#[derive(Clone, Copy)]
struct Tap {
    i0: usize,
    i1: usize,
    frac: u32,
}

impl Tap {
    fn new(coord: f64, len: u32) -> Self {
        let max = (len - 1) as f64;
        let c = coord.clamp(0.0, max);
        let i0 = c.floor() as usize;
        let i1 = (i0 + 1).min(len as usize - 1);
        let frac = ((c - i0 as f64) * 256.0).round() as u32;
        Self { i0, i1, frac }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_right_is_identity() {
        let t = resolve_transform(Orientation::LandscapeRight, DeviceClass::Phone, 1280, 720);
        assert_eq!(
            t,
            ResolvedTransform {
                encoded_width: 1280,
                encoded_height: 720,
                rotation: Rotation::Identity,
            }
        );
    }

    #[test]
    fn portrait_swaps_into_sensor_axes() {
        let t = resolve_transform(Orientation::Portrait, DeviceClass::Phone, 720, 1280);
        assert_eq!((t.encoded_width, t.encoded_height), (1280, 720));
        assert_eq!(t.rotation, Rotation::Rotate90);
        assert_eq!(t.rotation.image_orientation_tag(), "rotate-90");
    }

    #[test]
    fn upside_down_depends_on_device_class() {
        let upside_down = Orientation::PortraitUpsideDown;
        let phone = resolve_transform(upside_down, DeviceClass::Phone, 720, 1280);
        let tablet = resolve_transform(upside_down, DeviceClass::Tablet, 720, 1280);
        assert_eq!(phone.rotation, Rotation::Rotate90);
        assert_eq!(tablet.rotation, Rotation::Rotate270);
        assert_eq!((tablet.encoded_width, tablet.encoded_height), (1280, 720));
    }

    #[test]
    fn landscape_left_flips_without_swapping() {
        let t = resolve_transform(Orientation::LandscapeLeft, DeviceClass::Tablet, 1280, 720);
        assert_eq!(
            (t.encoded_width, t.encoded_height, t.rotation),
            (1280, 720, Rotation::Rotate180)
        );
    }

    #[test]
    fn odd_targets_round_down_to_even() {
        let t = resolve_transform(Orientation::LandscapeRight, DeviceClass::Phone, 1279, 1);
        assert_eq!((t.encoded_width, t.encoded_height), (1278, 2));
    }

    #[test]
    fn matching_aspect_only_scales() {
        let plan = TransformPlan::new(1920, 1080, 1280, 720);
        assert_eq!((plan.crop_x, plan.crop_y), (0, 0));
        assert!((plan.scale_x - 2.0 / 3.0).abs() < 1e-9);

        // Within 1%: 1280x722 against 1280x720
        let near = TransformPlan::new(1280, 722, 1280, 720);
        assert_eq!((near.crop_x, near.crop_y), (0, 0));
    }

    #[test]
    fn four_by_three_into_sixteen_by_nine_crops_vertically() {
        let plan = TransformPlan::new(640, 480, 1280, 720);
        assert_eq!(plan.scale_x, 2.0);
        assert_eq!(plan.scale_y, 2.0);
        assert_eq!((plan.scaled_width(), plan.scaled_height()), (1280, 960));
        assert_eq!((plan.crop_x, plan.crop_y), (0, 120));
        // Symmetric: what is cut from the top equals what is cut from the bottom
        assert_eq!(plan.scaled_height() - 720 - plan.crop_y, plan.crop_y);
    }

    #[test]
    fn wide_source_crops_horizontally() {
        let plan = TransformPlan::new(1920, 1080, 1440, 1080);
        assert_eq!(plan.scale_x, 1.0);
        assert_eq!((plan.crop_x, plan.crop_y), (240, 0));
    }

    #[test]
    fn transform_outputs_exact_target_size() {
        let mut t = FrameTransformer::new(64, 36);
        let src = vec![200u8; 48 * 48 * 4];
        let out = t.transform(&src, 48, 48).unwrap();
        assert_eq!(out.len(), 64 * 36 * 4);
        assert!(out.iter().all(|&v| v == 200));
    }

    #[test]
    fn transform_crops_symmetrically_without_letterboxing() {
        // 8x6 source (4:3) with blue = row * 40, into 16x8 (2:1)
        let (ws, hs) = (8u32, 6u32);
        let mut src = Vec::new();
        for row in 0..hs {
            for _ in 0..ws {
                src.extend_from_slice(&[(row * 40) as u8, 0, 0, 255]);
            }
        }

        let mut t = FrameTransformer::new(16, 8);
        let out = t.transform(&src, ws, hs).unwrap();
        let plan = t.plan_for(ws, hs);
        assert_eq!((plan.crop_x, plan.crop_y), (0, 2));

        let blue_at = |row: usize| out[row * 16 * 4];
        let first = blue_at(0);
        let last = blue_at(7);
        assert_eq!(first, 30);
        assert_eq!(last, 170);
        // Equal distance from the source extremes on both ends
        assert_eq!(first, 200 - last);
        // No border rows: every output pixel is opaque
        assert!(out.chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn plan_is_recomputed_when_source_size_changes() {
        let mut t = FrameTransformer::new(1280, 720);
        let a = t.plan_for(640, 480);
        let b = t.plan_for(1920, 1080);
        assert_ne!(a, b);
        assert_eq!(t.plan_for(1920, 1080), b);
    }

    #[test]
    fn column_taps_follow_source_size() {
        // Every channel holds x * 10, so a column's value shows where it sampled
        let gradient = |w: u32, h: u32| -> Vec<u8> {
            (0..h).flat_map(|_| (0..w).flat_map(|x| [(x * 10) as u8; 4])).collect()
        };

        let mut t = FrameTransformer::new(4, 2);
        let small = t.transform(&gradient(8, 4), 8, 4).unwrap();
        assert_eq!(t.columns.len(), 4);
        assert_eq!(t.columns[3].i0, 6);
        assert_eq!(small[3 * 4], 65);

        let large = t.transform(&gradient(16, 8), 16, 8).unwrap();
        assert_eq!(t.columns[3].i0, 13);
        assert_eq!(large[3 * 4], 135);
    }

    #[test]
    fn rejects_short_buffers() {
        let mut t = FrameTransformer::new(4, 4);
        assert!(matches!(t.transform(&[0u8; 8], 4, 4), Err(TransformError::BufferTooSmall { .. })));
        assert!(matches!(t.transform(&[], 0, 4), Err(TransformError::Empty { .. })));
    }
}
