use crate::device::{CameraFacing, CameraInfo, CaptureDevice, DeviceSession};
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle of the device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Previewing,
    Stopped,
}

/// Snapshot of the controller's state, observable from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session: Option<Uuid>,
    pub camera_index: Option<usize>,
    /// Why the last open failed
    pub error: Option<String>,
}

impl SessionStatus {
    pub fn closed() -> Self {
        Self {
            state: SessionState::Closed,
            session: None,
            camera_index: None,
            error: None,
        }
    }

    pub fn opening() -> Self {
        Self {
            state: SessionState::Opening,
            ..Self::closed()
        }
    }
}

/// An opened camera, owned by the device context.
///
/// The handle is released exactly once: explicitly through [`Session::release`]
/// or, on any other exit path, when the session is dropped.
pub struct Session {
    id: Uuid,
    index: Option<usize>,
    info: CameraInfo,
    device: Box<dyn CaptureDevice>,
    released: bool,
}

impl Session {
    pub fn new(index: Option<usize>, device: Box<dyn CaptureDevice>) -> Self {
        let info = device.info();
        Self {
            id: Uuid::new_v4(),
            index,
            info,
            device,
            released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn info(&self) -> CameraInfo {
        self.info
    }

    pub fn is_front_facing(&self) -> bool {
        self.info.facing == CameraFacing::Front
    }

    pub fn device(&mut self) -> &mut dyn CaptureDevice {
        self.device.as_mut()
    }

    pub fn release(mut self) {
        self.release_device();
    }

    fn release_device(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.release();
        info!("Camera {:?} released (session {})", self.index, self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.released {
            debug!("Session {} dropped while holding the camera", self.id);
            self.release_device();
        }
    }
}
