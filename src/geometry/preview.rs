use super::rotation::ScreenOrientation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack added to the aspect tolerance so a ratio sitting exactly on the edge
/// is not rejected by binary rounding (1.6 - 1.5 > 0.1 in f64).
const RATIO_EPSILON: f64 = 1e-9;

/// A preview buffer size supported by the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewSize {
    pub width: u32,
    pub height: u32,
}

impl PreviewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for PreviewSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Target aspect ratio and height for a preview surface.
///
/// Sensor buffers are landscape, so unless the screen is landscape the
/// surface dimensions are swapped first. Returns `None` for a surface that has
/// not been laid out.
pub fn preview_target(
    surface_w: u32,
    surface_h: u32,
    orientation: ScreenOrientation,
) -> Option<(f64, u32)> {
    let (w, h) = match orientation {
        ScreenOrientation::Landscape => (surface_w, surface_h),
        _ => (surface_h, surface_w),
    };

    if w == 0 || h == 0 {
        return None;
    }

    Some((w as f64 / h as f64, h))
}

/// Pick the preview size closest to `target_height` among those whose aspect
/// ratio is within `tolerance` of `target_ratio`; if none qualifies, ignore
/// the ratio and pick on height alone. Earlier candidates win ties.
pub fn select_preview_size(
    candidates: &[PreviewSize],
    target_ratio: f64,
    target_height: u32,
    tolerance: f64,
) -> Option<PreviewSize> {
    let ratio_fits = candidates.iter().filter(|size| {
        size.height > 0 && (size.aspect_ratio() - target_ratio).abs() <= tolerance + RATIO_EPSILON
    });

    closest_height(ratio_fits, target_height)
        .or_else(|| closest_height(candidates.iter(), target_height))
}

fn closest_height<'a>(
    sizes: impl Iterator<Item = &'a PreviewSize>,
    target_height: u32,
) -> Option<PreviewSize> {
    let mut best: Option<(PreviewSize, i64)> = None;
    for size in sizes {
        let diff = (size.height as i64 - target_height as i64).abs();
        if best.map_or(true, |(_, best_diff)| diff < best_diff) {
            best = Some((*size, diff));
        }
    }
    best.map(|(size, _)| size)
}
