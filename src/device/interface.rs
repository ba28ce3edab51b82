use crate::error::DeviceError;
use crate::frame::FrameBuffer;
use crate::geometry::{PreviewSize, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One-shot frame delivery; consumed by the first frame after registration
pub type FrameCallback = Box<dyn FnOnce(FrameBuffer) + Send + 'static>;

/// Auto-focus completion; the flag is the hardware's reported success
pub type FocusCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Which way a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraFacing {
    Back,
    Front,
}

/// Static description of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraInfo {
    pub facing: CameraFacing,
    /// Clockwise degrees the sensor image is mounted at (0, 90, 180 or 270)
    pub orientation: u32,
}

/// Surface the device renders its preview onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewSurface {
    pub width: u32,
    pub height: u32,
}

/// Weighted metering rectangle in the centered 2000x2000 focus space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusArea {
    pub rect: Rect,
    pub weight: i32,
}

/// Lifecycle and configuration calls on an opened capture device
pub trait DeviceSession: Send {
    fn info(&self) -> CameraInfo;

    fn supported_preview_sizes(&self) -> Result<Vec<PreviewSize>, DeviceError>;

    fn preview_size(&self) -> Result<PreviewSize, DeviceError>;

    fn set_preview_size(&mut self, size: PreviewSize) -> Result<(), DeviceError>;

    fn set_preview_display(&mut self, surface: Option<PreviewSurface>) -> Result<(), DeviceError>;

    /// Clockwise rotation applied to the rendered preview
    fn set_display_orientation(&mut self, degrees: u32) -> Result<(), DeviceError>;

    fn set_auto_focus_mode(&mut self) -> Result<(), DeviceError>;

    fn start_preview(&mut self) -> Result<(), DeviceError>;

    fn stop_preview(&mut self) -> Result<(), DeviceError>;

    /// Release the hardware handle. Every other call fails afterwards.
    fn release(&mut self);
}

/// Single-shot preview frame delivery
pub trait FrameSource: Send {
    /// Register (or with `None`, clear) the callback for the next frame only
    fn set_one_shot_frame_callback(
        &mut self,
        callback: Option<FrameCallback>,
    ) -> Result<(), DeviceError>;
}

/// Auto-focus capability
pub trait FocusController: Send {
    fn auto_focus(&mut self, callback: FocusCallback) -> Result<(), DeviceError>;

    fn cancel_auto_focus(&mut self) -> Result<(), DeviceError>;

    /// Number of focus areas the hardware accepts; zero means unsupported
    fn max_focus_areas(&self) -> u32;

    fn set_focus_areas(&mut self, areas: &[FocusArea]) -> Result<(), DeviceError>;
}

/// A fully capable capture device handle
pub trait CaptureDevice: DeviceSession + FrameSource + FocusController {}

impl<T: DeviceSession + FrameSource + FocusController> CaptureDevice for T {}

/// Enumerates and opens cameras. Opening may block.
pub trait CameraProvider: Send + Sync {
    fn camera_count(&self) -> usize;

    fn camera_info(&self, index: usize) -> Option<CameraInfo>;

    /// Open a camera; `None` opens the platform's default camera
    fn open(&self, index: Option<usize>) -> Result<Box<dyn CaptureDevice>, DeviceError>;
}

/// First back-facing camera, else the last camera, else the platform default
pub fn default_camera_index(provider: &dyn CameraProvider) -> Option<usize> {
    let count = provider.camera_count();
    let back = (0..count).find(|&index| {
        provider
            .camera_info(index)
            .is_some_and(|info| info.facing == CameraFacing::Back)
    });

    let index = back.or_else(|| count.checked_sub(1));
    debug!("Default camera index: {:?} ({} cameras)", index, count);
    index
}
