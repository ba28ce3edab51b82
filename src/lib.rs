pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod overlay;
pub mod scheduler;
pub mod session;

pub use config::ScanConfig;
pub use decoder::{Decoder, DecoderConfig, ScanResult, Symbol, SymbolFormat};
#[cfg(feature = "qr")]
pub use decoder::QrDecoder;
pub use device::{
    CameraFacing, CameraInfo, CameraProvider, CaptureDevice, MockCameraProvider, PreviewSurface,
};
pub use error::{DecodeError, DeviceError, Result, ScanError};
pub use events::{EventBus, EventFilter, EventReceiver, ScanEvent};
pub use frame::{FrameBuffer, PixelFormat};
pub use geometry::{DisplayRotation, PreviewSize, Rect};
pub use overlay::{DisplayInfo, Overlay, ScanWindowOverlay, StaticDisplay};
pub use scheduler::{FocusScheduler, FrameScheduler};
pub use session::{SessionController, SessionControllerBuilder, SessionState, SessionStatus};
