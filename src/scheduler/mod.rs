mod focus;
mod frame;
#[cfg(test)]
mod tests;

pub use focus::{FocusScheduler, FocusState, FocusStats};
pub use frame::{FrameOutcome, FrameScheduler, FrameStats};

use crate::decoder::Decoder;
use crate::device::CameraInfo;
use crate::events::EventBus;
use crate::geometry::{rotation_count, RotationCount, SharedGeometry};
use crate::overlay::{DisplayInfo, Overlay};
use std::sync::Arc;

/// Collaborators both schedulers read from, shared for one session
#[derive(Clone)]
pub struct ScanContext {
    pub decoder: Arc<dyn Decoder>,
    pub overlay: Arc<dyn Overlay>,
    pub display: Arc<dyn DisplayInfo>,
    pub geometry: SharedGeometry,
    pub events: EventBus,
}

impl ScanContext {
    /// Quarter turns from sensor output to the display, at this instant
    pub fn rotation(&self, camera: &CameraInfo) -> RotationCount {
        rotation_count(camera, self.display.rotation())
    }
}
