mod interface;
mod mock;
mod queue;

pub use interface::{
    default_camera_index, CameraFacing, CameraInfo, CameraProvider, CaptureDevice, DeviceSession,
    FocusArea, FocusCallback, FocusController, FrameCallback, FrameSource, PreviewSurface,
};
pub use mock::{DeviceCall, MockCamera, MockCameraProvider, MockFaults};
pub use queue::{DeviceCommand, DeviceQueue};
