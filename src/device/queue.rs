use super::interface::{FocusCallback, FrameCallback, PreviewSurface};
use crate::frame::FrameBuffer;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;
use uuid::Uuid;

/// Work items executed on the device context, in arrival order
#[derive(Debug)]
pub enum DeviceCommand {
    /// Open the configured camera
    Open,
    /// Configure and start streaming the preview
    StartPreview { session: Uuid },
    /// Preview surface became available
    SurfaceCreated(PreviewSurface),
    /// Preview surface was resized
    SurfaceChanged(PreviewSurface),
    /// Preview surface went away
    SurfaceDestroyed,
    /// A one-shot frame callback fired
    FrameDelivered { session: Uuid, frame: FrameBuffer },
    /// Consumer wants one more frame decoded
    RequestFrame,
    /// Auto-focus reported completion
    FocusSettled { session: Uuid, success: bool },
    /// Delayed auto-focus re-entry is due
    FocusRetry { session: Uuid },
    /// Tear the session down and terminate the device context
    Stop { ack: Option<oneshot::Sender<()>> },
}

impl DeviceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::Open => "open",
            DeviceCommand::StartPreview { .. } => "start_preview",
            DeviceCommand::SurfaceCreated(_) => "surface_created",
            DeviceCommand::SurfaceChanged(_) => "surface_changed",
            DeviceCommand::SurfaceDestroyed => "surface_destroyed",
            DeviceCommand::FrameDelivered { .. } => "frame_delivered",
            DeviceCommand::RequestFrame => "request_frame",
            DeviceCommand::FocusSettled { .. } => "focus_settled",
            DeviceCommand::FocusRetry { .. } => "focus_retry",
            DeviceCommand::Stop { .. } => "stop",
        }
    }
}

/// Sending half of the device context's command queue.
///
/// Hardware callbacks are turned into commands here so they are always
/// handled on the device context, tagged with the session they belong to.
#[derive(Debug, Clone)]
pub struct DeviceQueue {
    sender: mpsc::UnboundedSender<DeviceCommand>,
}

impl DeviceQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeviceCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Post a command; returns false once the device context has exited
    pub fn post(&self, command: DeviceCommand) -> bool {
        trace!("Posting device command: {}", command.name());
        self.sender.send(command).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// One-shot frame callback that forwards the frame to this queue
    pub fn frame_callback(&self, session: Uuid) -> FrameCallback {
        let queue = self.clone();
        Box::new(move |frame| {
            queue.post(DeviceCommand::FrameDelivered { session, frame });
        })
    }

    /// Focus completion callback that forwards the result to this queue
    pub fn focus_callback(&self, session: Uuid) -> FocusCallback {
        let queue = self.clone();
        Box::new(move |success| {
            queue.post(DeviceCommand::FocusSettled { session, success });
        })
    }
}
