use super::state::{SessionState, SessionStatus};
use super::worker::DeviceWorker;
use crate::config::ScanConfig;
use crate::decoder::Decoder;
use crate::device::{CameraProvider, DeviceCommand, DeviceQueue, PreviewSurface};
use crate::error::{Result, ScanError};
use crate::events::{EventBus, ScanEvent};
use crate::geometry::SharedGeometry;
use crate::overlay::{DisplayInfo, Overlay};
use crate::scheduler::ScanContext;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEVICE_THREAD_NAME: &str = "scancam-device";

#[derive(Default)]
struct DeviceContext {
    queue: Option<DeviceQueue>,
    thread: Option<JoinHandle<()>>,
    geometry: SharedGeometry,
    surface: Option<PreviewSurface>,
}

/// UI-facing handle that drives one camera session at a time.
///
/// All hardware work runs on a dedicated device thread; the methods here
/// only post commands to it and observe its state.
pub struct SessionController {
    provider: Arc<dyn CameraProvider>,
    decoder: Arc<dyn Decoder>,
    overlay: Arc<dyn Overlay>,
    display: Arc<dyn DisplayInfo>,
    config: ScanConfig,
    events: EventBus,
    status: Arc<watch::Sender<SessionStatus>>,
    device: Mutex<DeviceContext>,
}

impl SessionController {
    pub(super) fn new(
        provider: Arc<dyn CameraProvider>,
        decoder: Arc<dyn Decoder>,
        overlay: Arc<dyn Overlay>,
        display: Arc<dyn DisplayInfo>,
        config: ScanConfig,
        events: EventBus,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::closed());
        Self {
            provider,
            decoder,
            overlay,
            display,
            config,
            events,
            status: Arc::new(status),
            device: Mutex::new(DeviceContext::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Closed -> Opening. Returns immediately; see [`Self::wait_opened`].
    pub fn start(&self) -> Result<()> {
        let mut device = self.device.lock();

        let state = self.state();
        if state != SessionState::Closed {
            warn!("Start ignored: session is {:?}", state);
            return Ok(());
        }

        // a previous context that failed to open has already exited
        device.thread.take();

        let (queue, commands) = DeviceQueue::new();
        let geometry = SharedGeometry::new();
        let context = ScanContext {
            decoder: Arc::clone(&self.decoder),
            overlay: Arc::clone(&self.overlay),
            display: Arc::clone(&self.display),
            geometry: geometry.clone(),
            events: self.events.clone(),
        };
        let worker = DeviceWorker::new(
            Arc::clone(&self.provider),
            self.config.clone(),
            queue.clone(),
            commands,
            context,
            Arc::clone(&self.status),
            device.surface,
        );

        self.status.send_replace(SessionStatus::opening());
        queue.post(DeviceCommand::Open);

        let thread = std::thread::Builder::new()
            .name(DEVICE_THREAD_NAME.to_string())
            .spawn(move || worker.run_blocking())
            .map_err(|e| {
                self.status.send_replace(SessionStatus::closed());
                ScanError::system(format!("Failed to spawn device thread: {}", e))
            })?;

        info!("Session starting");
        device.queue = Some(queue);
        device.thread = Some(thread);
        device.geometry = geometry;
        Ok(())
    }

    /// Wait for the open started by [`Self::start`] to finish
    pub async fn wait_opened(&self) -> Result<Uuid> {
        let mut receiver = self.status.subscribe();
        let wait = async {
            receiver
                .wait_for(|status| status.state != SessionState::Opening)
                .await
                .map(|status| status.clone())
        };

        let status = tokio::time::timeout(self.config.camera.open_timeout(), wait)
            .await
            .map_err(|_| ScanError::system("Timed out waiting for the camera to open"))?
            .map_err(|_| ScanError::system("Session status channel closed"))?;

        match status.state {
            SessionState::Open | SessionState::Previewing => status
                .session
                .ok_or_else(|| ScanError::system("Open session has no id")),
            SessionState::Closed => match status.error {
                Some(details) => Err(ScanError::DeviceUnavailable {
                    index: status.camera_index,
                    details,
                }),
                None => Err(ScanError::system("Session is not open")),
            },
            state => Err(ScanError::component(
                "session".to_string(),
                format!("Session is {:?}", state),
            )),
        }
    }

    /// Tear the session down and wait for the device context to exit.
    ///
    /// A no-op when nothing is running.
    pub async fn stop(&self) -> Result<()> {
        let (queue, thread) = {
            let mut device = self.device.lock();
            (device.queue.take(), device.thread.take())
        };

        let Some(queue) = queue else {
            debug!("Stop requested with no device context");
            return Ok(());
        };

        let (ack, acked) = oneshot::channel();
        if queue.post(DeviceCommand::Stop { ack: Some(ack) }) {
            if acked.await.is_err() {
                debug!("Device context exited before acknowledging stop");
            }
        }

        if let Some(thread) = thread {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| ScanError::system(format!("Failed to join device thread: {}", e)))?
                .map_err(|_| ScanError::system("Device thread panicked"))?;
        }

        info!("Session stopped");
        Ok(())
    }

    /// Ask for one more frame to be decoded after a result
    pub fn request_next_frame(&self) -> bool {
        self.post(DeviceCommand::RequestFrame)
    }

    pub fn surface_created(&self, width: u32, height: u32) {
        let surface = PreviewSurface { width, height };
        self.device.lock().surface = Some(surface);
        self.post(DeviceCommand::SurfaceCreated(surface));
    }

    pub fn surface_changed(&self, width: u32, height: u32) {
        let surface = PreviewSurface { width, height };
        self.device.lock().surface = Some(surface);
        self.post(DeviceCommand::SurfaceChanged(surface));
    }

    pub fn surface_destroyed(&self) {
        self.device.lock().surface = None;
        self.post(DeviceCommand::SurfaceDestroyed);
    }

    /// Lay the overlay out again and drop cached mappings
    pub fn overlay_resized(&self, width: u32, height: u32) {
        self.overlay.resize(width, height);
        self.device.lock().geometry.invalidate();
    }

    fn post(&self, command: DeviceCommand) -> bool {
        match self.device.lock().queue.as_ref() {
            Some(queue) => queue.post(command),
            None => {
                debug!("No device context for {}", command.name());
                false
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let device = self.device.get_mut();
        if let Some(queue) = device.queue.take() {
            queue.post(DeviceCommand::Stop { ack: None });
        }
        if let Some(thread) = device.thread.take() {
            if thread.join().is_err() {
                error!("Device thread panicked");
            }
        }
    }
}
