use super::rotation::RotationCount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the normalized square the camera focus API works in
pub const NORMALIZED_EXTENT: u32 = 2000;

/// Coordinate space a rectangle is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordSpace {
    /// Overlay (scan window view) pixels
    Overlay,
    /// 2000x2000 space with the origin at the top-left corner
    Normalized,
    /// Raw preview buffer pixels as delivered by the sensor
    SensorBuffer,
    /// 2000x2000 space centered on the origin, as used for focus areas
    FocusArea,
}

/// Axis-aligned integer rectangle. Bounds are half-open like the platform's.
///
/// Construction enforces `left < right` and `top < bottom`; a rectangle that
/// would violate this is a programming error and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    space: CoordSpace,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32, space: CoordSpace) -> Self {
        assert!(
            left < right && top < bottom,
            "invalid {:?} rectangle [{},{}][{},{}]",
            space,
            left,
            top,
            right,
            bottom
        );
        Self {
            left,
            top,
            right,
            bottom,
            space,
        }
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn space(&self) -> CoordSpace {
        self.space
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }

    /// Whether the rectangle lies fully inside a `width` x `height` space
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right as i64 <= width as i64
            && self.bottom as i64 <= height as i64
    }

    /// Intersection with `[0,width) x [0,height)`; `None` when nothing is left
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let max_x = width.min(i32::MAX as u32) as i32;
        let max_y = height.min(i32::MAX as u32) as i32;
        let left = self.left.clamp(0, max_x);
        let top = self.top.clamp(0, max_y);
        let right = self.right.clamp(0, max_x);
        let bottom = self.bottom.clamp(0, max_y);

        if left < right && top < bottom {
            Some(Rect::new(left, top, right, bottom, self.space))
        } else {
            None
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Scale every bound by `to / from` on its axis, truncating toward zero.
///
/// # Panics
///
/// Panics if `from_w` or `from_h` is zero; callers must not map a window
/// whose overlay has not been laid out yet.
pub fn scale_rect(
    rect: Rect,
    from_w: u32,
    from_h: u32,
    to_w: u32,
    to_h: u32,
    space: CoordSpace,
) -> Rect {
    assert!(
        from_w > 0 && from_h > 0,
        "cannot scale {} out of a zero-sized {}x{} space",
        rect,
        from_w,
        from_h
    );

    let scale_x = |v: i32| (v as i64 * to_w as i64 / from_w as i64) as i32;
    let scale_y = |v: i32| (v as i64 * to_h as i64 / from_h as i64) as i32;

    Rect::new(
        scale_x(rect.left),
        scale_y(rect.top),
        scale_x(rect.right),
        scale_y(rect.bottom),
        space,
    )
}

/// Rotate a rectangle counter to the sensor's clockwise correction so it keeps
/// covering the same scene region once the buffer is logically rotated.
///
/// `space_w` x `space_h` is the space the result lives in. For odd rotation
/// counts the input lives in the transposed `space_h` x `space_w` space.
pub fn rotate_rect(rect: Rect, rotation: RotationCount, space_w: u32, space_h: u32) -> Rect {
    let w = space_w as i32;
    let h = space_h as i32;
    let Rect {
        left,
        top,
        right,
        bottom,
        space,
    } = rect;

    match rotation.count() {
        0 => rect,
        1 => Rect::new(top, h - right, bottom, h - left, space),
        2 => Rect::new(w - right, h - bottom, w - left, h - top, space),
        3 => Rect::new(w - bottom, left, w - top, right, space),
        _ => unreachable!("rotation count is always within 0..=3"),
    }
}

/// Offset every bound by (`dx`, `dy`)
pub fn translate_rect(rect: Rect, dx: i32, dy: i32, space: CoordSpace) -> Rect {
    Rect::new(
        rect.left + dx,
        rect.top + dy,
        rect.right + dx,
        rect.bottom + dy,
        space,
    )
}
