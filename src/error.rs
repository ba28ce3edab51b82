use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Camera device {index:?} unavailable: {details}")]
    DeviceUnavailable { index: Option<usize>, details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ScanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is local to one frame or focus cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, ScanError::Device(_) | ScanError::Decode(_))
    }
}

/// Faults raised by a capture device adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to open camera {index:?}: {details}")]
    Open { index: Option<usize>, details: String },

    #[error("Hardware call {operation} failed: {details}")]
    Hardware {
        operation: &'static str,
        details: String,
    },

    #[error("Device handle already released")]
    Released,
}

impl DeviceError {
    pub fn hardware<S: Into<String>>(operation: &'static str, details: S) -> Self {
        Self::Hardware {
            operation,
            details: details.into(),
        }
    }
}

/// Faults raised by a decoder for a single frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed frame buffer: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("Crop {crop} lies outside the {width}x{height} frame")]
    CropOutOfBounds {
        crop: String,
        width: u32,
        height: u32,
    },

    #[error("Decoder failure: {details}")]
    Backend { details: String },
}

/// Faults seen by event bus subscribers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Event receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, ScanError>;
