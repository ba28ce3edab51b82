use super::rect::{rotate_rect, scale_rect, translate_rect, CoordSpace, Rect, NORMALIZED_EXTENT};
use super::rotation::{RotationCount, ScreenOrientation};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::debug;

/// Map the overlay scan window onto the preview buffer the decoder crops from.
///
/// The window is first scaled into the display-aligned buffer space (buffer
/// dimensions swapped when the screen and buffer orientations disagree), then
/// rotated into raw buffer coordinates.
pub fn decode_crop(
    window: Rect,
    overlay: (u32, u32),
    buffer: (u32, u32),
    orientation: ScreenOrientation,
    rotation: RotationCount,
) -> Rect {
    let (buffer_w, buffer_h) = buffer;
    let (width, height) = match orientation {
        ScreenOrientation::Portrait if buffer_h < buffer_w => (buffer_h, buffer_w),
        ScreenOrientation::Landscape if buffer_h > buffer_w => (buffer_h, buffer_w),
        _ => (buffer_w, buffer_h),
    };

    let scaled = scale_rect(
        window,
        overlay.0,
        overlay.1,
        width,
        height,
        CoordSpace::SensorBuffer,
    );
    rotate_rect(scaled, rotation, buffer_w, buffer_h)
}

/// Map the overlay scan window onto the centered 2000x2000 focus-area space
pub fn focus_area(window: Rect, overlay: (u32, u32), rotation: RotationCount) -> Rect {
    let scaled = scale_rect(
        window,
        overlay.0,
        overlay.1,
        NORMALIZED_EXTENT,
        NORMALIZED_EXTENT,
        CoordSpace::Normalized,
    );
    let rotated = rotate_rect(scaled, rotation, NORMALIZED_EXTENT, NORMALIZED_EXTENT);
    let half = (NORMALIZED_EXTENT / 2) as i32;
    translate_rect(rotated, -half, -half, CoordSpace::FocusArea)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropKey {
    window: Rect,
    overlay: (u32, u32),
    buffer: (u32, u32),
    orientation: ScreenOrientation,
    rotation: RotationCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FocusKey {
    window: Rect,
    overlay: (u32, u32),
    rotation: RotationCount,
}

/// Memoized scan-window mappings, recomputed only when an input changes
#[derive(Debug, Default)]
pub struct GeometryCache {
    crop: Option<(CropKey, Rect)>,
    focus: Option<(FocusKey, Rect)>,
    recomputations: u64,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode crop for the given inputs, reusing the last result if unchanged
    pub fn crop_rect(
        &mut self,
        window: Rect,
        overlay: (u32, u32),
        buffer: (u32, u32),
        orientation: ScreenOrientation,
        rotation: RotationCount,
    ) -> Rect {
        let key = CropKey {
            window,
            overlay,
            buffer,
            orientation,
            rotation,
        };

        if let Some((cached_key, rect)) = self.crop {
            if cached_key == key {
                return rect;
            }
        }

        let rect = decode_crop(window, overlay, buffer, orientation, rotation);
        debug!(
            "Decode crop {} for window {} (overlay {}x{}, buffer {}x{}, rotation {})",
            rect,
            window,
            overlay.0,
            overlay.1,
            buffer.0,
            buffer.1,
            rotation.count()
        );
        self.crop = Some((key, rect));
        self.recomputations += 1;
        rect
    }

    /// Focus area for the given inputs, reusing the last result if unchanged
    pub fn focus_rect(
        &mut self,
        window: Rect,
        overlay: (u32, u32),
        rotation: RotationCount,
    ) -> Rect {
        let key = FocusKey {
            window,
            overlay,
            rotation,
        };

        if let Some((cached_key, rect)) = self.focus {
            if cached_key == key {
                return rect;
            }
        }

        let rect = focus_area(window, overlay, rotation);
        debug!("Focus area {} for window {}", rect, window);
        self.focus = Some((key, rect));
        self.recomputations += 1;
        rect
    }

    /// Drop both cached mappings
    pub fn invalidate(&mut self) {
        self.crop = None;
        self.focus = None;
    }

    /// Number of times a mapping had to be recomputed
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

/// Per-session geometry cache shared between the device and UI contexts
#[derive(Debug, Clone, Default)]
pub struct SharedGeometry {
    inner: Arc<Mutex<GeometryCache>>,
}

impl SharedGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, GeometryCache> {
        self.inner.lock()
    }

    pub fn invalidate(&self) {
        self.inner.lock().invalidate();
    }
}
