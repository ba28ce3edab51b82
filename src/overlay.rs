use crate::config::ScanWindowConfig;
use crate::geometry::{CoordSpace, DisplayRotation, Rect, ScreenOrientation};
use parking_lot::RwLock;
use tracing::debug;

/// The view that draws the scan window over the preview
pub trait Overlay: Send + Sync {
    /// Current scan window in overlay pixels; `None` skips this cycle
    fn scan_window(&self) -> Option<Rect>;

    /// Overlay size in pixels
    fn size(&self) -> (u32, u32);

    /// Layout pass after the overlay changed size
    fn resize(&self, width: u32, height: u32);
}

/// Display rotation and size, queried on every geometry computation
pub trait DisplayInfo: Send + Sync {
    fn rotation(&self) -> DisplayRotation;

    fn screen_size(&self) -> (u32, u32);

    fn orientation(&self) -> ScreenOrientation {
        let (width, height) = self.screen_size();
        ScreenOrientation::from_size(width, height)
    }
}

#[derive(Debug, Default)]
struct Layout {
    size: (u32, u32),
    window: Option<Rect>,
}

/// Overlay with a window sized relative to its own width
#[derive(Debug)]
pub struct ScanWindowOverlay {
    config: ScanWindowConfig,
    layout: RwLock<Layout>,
}

impl ScanWindowOverlay {
    pub fn new(config: ScanWindowConfig) -> Self {
        Self {
            config,
            layout: RwLock::new(Layout::default()),
        }
    }

    pub fn with_size(config: ScanWindowConfig, width: u32, height: u32) -> Self {
        let overlay = Self::new(config);
        overlay.resize(width, height);
        overlay
    }

    fn framing_rect(&self, width: u32, height: u32) -> Option<Rect> {
        let window_w = (width as f64 * self.config.width_ratio) as i32;
        let window_h = (self.config.height_width_ratio * window_w as f64) as i32;
        if window_w <= 0 || window_h <= 0 {
            return None;
        }

        let left = if self.config.left_offset < 0 {
            (width as i32 - window_w) / 2
        } else {
            self.config.left_offset
        };
        let top = if self.config.top_offset < 0 {
            (height as i32 - window_h) / 2
        } else {
            self.config.top_offset
        };

        Some(Rect::new(
            left,
            top,
            left + window_w,
            top + window_h,
            CoordSpace::Overlay,
        ))
    }
}

impl Overlay for ScanWindowOverlay {
    fn scan_window(&self) -> Option<Rect> {
        self.layout.read().window
    }

    fn size(&self) -> (u32, u32) {
        self.layout.read().size
    }

    fn resize(&self, width: u32, height: u32) {
        let window = if width == 0 || height == 0 {
            None
        } else {
            self.framing_rect(width, height)
        };

        debug!("Overlay resized to {}x{}, scan window {:?}", width, height, window);
        let mut layout = self.layout.write();
        layout.size = (width, height);
        layout.window = window;
    }
}

/// Display whose rotation and size are set by the host
#[derive(Debug)]
pub struct StaticDisplay {
    rotation: RwLock<DisplayRotation>,
    size: RwLock<(u32, u32)>,
}

impl StaticDisplay {
    pub fn new(rotation: DisplayRotation, width: u32, height: u32) -> Self {
        Self {
            rotation: RwLock::new(rotation),
            size: RwLock::new((width, height)),
        }
    }

    pub fn set_rotation(&self, rotation: DisplayRotation) {
        *self.rotation.write() = rotation;
    }

    pub fn set_screen_size(&self, width: u32, height: u32) {
        *self.size.write() = (width, height);
    }
}

impl DisplayInfo for StaticDisplay {
    fn rotation(&self) -> DisplayRotation {
        *self.rotation.read()
    }

    fn screen_size(&self) -> (u32, u32) {
        *self.size.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(rect: Rect) -> (i32, i32, i32, i32) {
        (rect.left(), rect.top(), rect.right(), rect.bottom())
    }

    #[test]
    fn test_default_window_is_centered_horizontally() {
        let overlay = ScanWindowOverlay::with_size(ScanWindowConfig::default(), 1080, 1920);

        assert_eq!(overlay.size(), (1080, 1920));
        assert_eq!(bounds(overlay.scan_window().unwrap()), (54, 100, 1026, 488));
    }

    #[test]
    fn test_negative_top_offset_centers_vertically() {
        let config = ScanWindowConfig {
            top_offset: -1,
            ..ScanWindowConfig::default()
        };
        let overlay = ScanWindowOverlay::with_size(config, 1000, 1000);

        assert_eq!(bounds(overlay.scan_window().unwrap()), (50, 320, 950, 680));
    }

    #[test]
    fn test_explicit_offsets() {
        let config = ScanWindowConfig {
            width_ratio: 0.5,
            height_width_ratio: 1.0,
            left_offset: 10,
            top_offset: 20,
        };
        let overlay = ScanWindowOverlay::with_size(config, 400, 800);

        assert_eq!(bounds(overlay.scan_window().unwrap()), (10, 20, 210, 220));
    }

    #[test]
    fn test_window_absent_until_laid_out() {
        let overlay = ScanWindowOverlay::new(ScanWindowConfig::default());
        assert!(overlay.scan_window().is_none());

        overlay.resize(1080, 1920);
        assert!(overlay.scan_window().is_some());

        overlay.resize(0, 1920);
        assert!(overlay.scan_window().is_none());
    }

    #[test]
    fn test_static_display_orientation() {
        let display = StaticDisplay::new(DisplayRotation::Rotation0, 1080, 1920);
        assert_eq!(display.orientation(), ScreenOrientation::Portrait);

        display.set_screen_size(1920, 1080);
        display.set_rotation(DisplayRotation::Rotation90);
        assert_eq!(display.orientation(), ScreenOrientation::Landscape);
        assert_eq!(display.rotation(), DisplayRotation::Rotation90);
    }
}
