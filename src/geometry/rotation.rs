use crate::device::{CameraFacing, CameraInfo};
use serde::{Deserialize, Serialize};

/// Number of clockwise quarter turns that align sensor output with the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RotationCount(u8);

impl RotationCount {
    pub const NONE: RotationCount = RotationCount(0);

    /// # Panics
    ///
    /// Panics if `count` is outside `0..=3`.
    pub fn new(count: u8) -> Self {
        assert!(count < 4, "rotation count must be within 0..=3, got {}", count);
        Self(count)
    }

    /// # Panics
    ///
    /// Panics unless `degrees` is one of 0, 90, 180 or 270.
    pub fn from_degrees(degrees: u32) -> Self {
        assert!(
            degrees % 90 == 0 && degrees < 360,
            "rotation must be a quarter turn below 360 degrees, got {}",
            degrees
        );
        Self((degrees / 90) as u8)
    }

    pub fn count(self) -> u8 {
        self.0
    }

    pub fn degrees(self) -> u32 {
        self.0 as u32 * 90
    }

    /// Rotation that undoes this one
    pub fn inverse(self) -> Self {
        Self((4 - self.0) % 4)
    }

    /// Whether the rotation exchanges the width and height axes
    pub fn swaps_axes(self) -> bool {
        self.0 % 2 == 1
    }
}

/// Rotation of the display relative to its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayRotation {
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    pub fn degrees(&self) -> u32 {
        match self {
            DisplayRotation::Rotation0 => 0,
            DisplayRotation::Rotation90 => 90,
            DisplayRotation::Rotation180 => 180,
            DisplayRotation::Rotation270 => 270,
        }
    }
}

/// Screen orientation derived from which side of the screen is longer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenOrientation {
    Portrait,
    Landscape,
    Square,
}

impl ScreenOrientation {
    pub fn from_size(width: u32, height: u32) -> Self {
        if width == height {
            ScreenOrientation::Square
        } else if width < height {
            ScreenOrientation::Portrait
        } else {
            ScreenOrientation::Landscape
        }
    }
}

/// Clockwise degrees the preview must be rotated to appear upright.
///
/// Front-facing sensors are mirrored, so their correction is compensated.
pub fn display_orientation(camera: &CameraInfo, display: DisplayRotation) -> u32 {
    let degrees = display.degrees();
    let mount = camera.orientation % 360;
    match camera.facing {
        CameraFacing::Front => (360 - (mount + degrees) % 360) % 360,
        CameraFacing::Back => (mount + 360 - degrees) % 360,
    }
}

/// Rotation count for the current display rotation; cheap, never cached
pub fn rotation_count(camera: &CameraInfo, display: DisplayRotation) -> RotationCount {
    RotationCount::from_degrees(display_orientation(camera, display))
}
