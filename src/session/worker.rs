use super::state::{Session, SessionState, SessionStatus};
use crate::config::ScanConfig;
use crate::device::{
    default_camera_index, CameraProvider, CaptureDevice, DeviceCommand, DeviceQueue,
    DeviceSession, PreviewSurface,
};
use crate::error::DeviceError;
use crate::events::ScanEvent;
use crate::geometry::{display_orientation, preview_target, select_preview_size, PreviewSize};
use crate::scheduler::{FocusScheduler, FrameScheduler, ScanContext};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

struct ActiveSession {
    session: Session,
    frame: FrameScheduler,
    focus: FocusScheduler,
    previewing: bool,
}

/// Owns the camera and runs every hardware call, one command at a time
pub(super) struct DeviceWorker {
    provider: Arc<dyn CameraProvider>,
    config: ScanConfig,
    queue: DeviceQueue,
    commands: mpsc::UnboundedReceiver<DeviceCommand>,
    context: ScanContext,
    status: Arc<watch::Sender<SessionStatus>>,
    surface: Option<PreviewSurface>,
    surface_handling: bool,
    active: Option<ActiveSession>,
}

impl DeviceWorker {
    pub(super) fn new(
        provider: Arc<dyn CameraProvider>,
        config: ScanConfig,
        queue: DeviceQueue,
        commands: mpsc::UnboundedReceiver<DeviceCommand>,
        context: ScanContext,
        status: Arc<watch::Sender<SessionStatus>>,
        surface: Option<PreviewSurface>,
    ) -> Self {
        Self {
            provider,
            config,
            queue,
            commands,
            context,
            status,
            surface,
            surface_handling: false,
            active: None,
        }
    }

    /// Thread entry point: a single-threaded runtime for timers and the command loop
    pub(super) fn run_blocking(self) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();

        match runtime {
            Ok(runtime) => runtime.block_on(self.run()),
            Err(e) => {
                error!("Failed to build device runtime: {}", e);
                self.status.send_replace(SessionStatus {
                    error: Some(format!("device runtime unavailable: {}", e)),
                    ..SessionStatus::closed()
                });
            }
        }
    }

    async fn run(mut self) {
        debug!("Device context started");

        while let Some(command) = self.commands.recv().await {
            trace!("Handling device command: {}", command.name());
            match command {
                DeviceCommand::Open => {
                    if !self.open() {
                        break;
                    }
                }
                DeviceCommand::StartPreview { session } => {
                    if self.current(session).is_some() {
                        self.start_preview();
                    }
                }
                DeviceCommand::SurfaceCreated(surface) => self.on_surface_created(surface),
                DeviceCommand::SurfaceChanged(surface) => self.on_surface_changed(surface),
                DeviceCommand::SurfaceDestroyed => self.on_surface_destroyed(),
                DeviceCommand::FrameDelivered { session, frame } => {
                    if let Some(active) = self.current(session) {
                        let ActiveSession {
                            session, frame: scheduler, ..
                        } = active;
                        scheduler.on_frame(session.device(), frame);
                    }
                }
                DeviceCommand::RequestFrame => self.request_frame(),
                DeviceCommand::FocusSettled { session, success } => {
                    if let Some(active) = self.current(session) {
                        active.focus.on_settled(success);
                    }
                }
                DeviceCommand::FocusRetry { session } => {
                    let has_surface = self.surface.is_some();
                    if let Some(active) = self.current(session) {
                        if active.previewing && has_surface {
                            let ActiveSession { session, focus, .. } = active;
                            focus.on_retry(session.device());
                        } else if active.previewing {
                            active.focus.skip_retry();
                        }
                    }
                }
                DeviceCommand::Stop { ack } => {
                    self.shutdown();
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }

        debug!("Device context exiting");
    }

    /// The active session, if `id` still names it
    fn current(&mut self, id: Uuid) -> Option<&mut ActiveSession> {
        match self.active.as_mut() {
            Some(active) if active.session.id() == id => Some(active),
            _ => {
                trace!("Dropping command for stale session {}", id);
                None
            }
        }
    }

    fn set_status(&self, state: SessionState) {
        self.status.send_modify(|status| {
            status.state = state;
            if state == SessionState::Closed {
                status.session = None;
            }
        });
    }

    /// Opening -> Open, or back to Closed on failure (returns false)
    fn open(&mut self) -> bool {
        let index = self
            .config
            .camera
            .index
            .or_else(|| default_camera_index(self.provider.as_ref()));
        info!("Opening camera {:?}", index);

        let device = match self.provider.open(index) {
            Ok(device) => device,
            Err(e) => {
                error!("Camera {:?} unavailable: {}", index, e);
                self.status.send_replace(SessionStatus {
                    camera_index: index,
                    error: Some(e.to_string()),
                    ..SessionStatus::closed()
                });
                self.context.events.publish(ScanEvent::DeviceUnavailable {
                    camera_index: index,
                    details: e.to_string(),
                });
                return false;
            }
        };

        let mut session = Session::new(index, device);
        let id = session.id();
        let camera = session.info();
        self.context.geometry.invalidate();

        let frame = FrameScheduler::new(id, camera, self.queue.clone(), self.context.clone());
        let focus = FocusScheduler::new(
            id,
            camera,
            self.queue.clone(),
            self.context.clone(),
            self.config.focus.clone(),
        );

        self.status.send_replace(SessionStatus {
            state: SessionState::Open,
            session: Some(id),
            camera_index: index,
            error: None,
        });
        self.context.events.publish(ScanEvent::SessionOpened {
            session: id,
            camera_index: index,
            front_facing: session.is_front_facing(),
        });

        if let Err(e) = session.device().set_auto_focus_mode() {
            warn!("Failed to enable auto focus mode: {}", e);
        }

        self.active = Some(ActiveSession {
            session,
            frame,
            focus,
            previewing: false,
        });
        self.queue.post(DeviceCommand::StartPreview { session: id });
        true
    }

    /// Open -> Previewing; a fault leaves the session Open
    fn start_preview(&mut self) {
        let surface = self.surface;
        let target = surface
            .map(|s| (s.width, s.height))
            .unwrap_or_else(|| self.context.overlay.size());
        let tolerance = self.config.preview.aspect_tolerance;

        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.previewing {
            debug!("Preview already running");
            return;
        }

        let ActiveSession {
            session,
            frame,
            focus,
            previewing,
        } = active;
        let id = session.id();
        let device = session.device();

        match configure_preview(&mut *device, frame, surface, target, &self.context, tolerance) {
            Ok((preview_size, degrees)) => {
                *previewing = true;
                if surface.is_some() {
                    focus.start(&mut *device);
                } else {
                    focus.start_deferred();
                }
                self.surface_handling = true;
                self.set_status(SessionState::Previewing);
                self.context.events.publish(ScanEvent::PreviewStarted {
                    session: id,
                    preview_size,
                    display_orientation: degrees,
                });
            }
            Err(e) => {
                frame.pause();
                self.context.events.publish(ScanEvent::PreviewFailed {
                    session: id,
                    details: e.to_string(),
                });
            }
        }
    }

    /// Previewing -> Open without releasing the camera
    fn pause_preview(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.previewing {
            return;
        }

        active.previewing = false;
        active.frame.pause();
        let id = active.session.id();
        let device = active.session.device();

        let result = active
            .focus
            .pause(&mut *device)
            .and_then(|_| device.set_one_shot_frame_callback(None))
            .and_then(|_| device.stop_preview());
        if let Err(e) = result {
            warn!("Stopping preview failed: {}", e);
        }

        self.set_status(SessionState::Open);
        self.context
            .events
            .publish(ScanEvent::PreviewStopped { session: id });
    }

    fn on_surface_created(&mut self, surface: PreviewSurface) {
        debug!("Preview surface created: {}x{}", surface.width, surface.height);
        self.surface = Some(surface);
        if !self.surface_handling {
            return;
        }

        let previewing = self.active.as_ref().is_some_and(|active| active.previewing);
        if !previewing {
            self.start_preview();
            return;
        }

        // preview kept running without a surface; focus was waiting for one
        if let Some(ActiveSession { session, focus, .. }) = self.active.as_mut() {
            focus.start(session.device());
        }
    }

    fn on_surface_changed(&mut self, surface: PreviewSurface) {
        debug!("Preview surface changed: {}x{}", surface.width, surface.height);
        self.surface = Some(surface);
        if self.surface_handling {
            self.pause_preview();
            self.start_preview();
        }
    }

    fn on_surface_destroyed(&mut self) {
        debug!("Preview surface destroyed");
        self.surface = None;
        if self.surface_handling {
            self.pause_preview();
        }
    }

    fn request_frame(&mut self) {
        let Some(active) = self.active.as_mut() else {
            debug!("Frame requested without an open camera");
            return;
        };
        if !active.previewing {
            debug!("Frame requested while preview is stopped");
            return;
        }

        let ActiveSession { session, frame, .. } = active;
        if let Err(e) = frame.request_next_frame(session.device()) {
            warn!("Failed to request a frame: {}", e);
        }
    }

    /// Previewing/Open -> Stopped -> Closed. Release happens on every path.
    fn shutdown(&mut self) {
        self.surface_handling = false;

        let Some(mut active) = self.active.take() else {
            self.set_status(SessionState::Closed);
            self.context
                .events
                .publish(ScanEvent::SessionClosed { session: None });
            return;
        };

        self.set_status(SessionState::Stopped);
        let id = active.session.id();
        info!("Stopping session {}", id);

        let device = active.session.device();
        let mut fault: Option<DeviceError> = None;

        if let Err(e) = active.focus.stop(&mut *device) {
            fault = Some(e);
        }

        if fault.is_none() {
            if let Err(e) = active.frame.stop(&mut *device) {
                fault = Some(e);
            }
        } else {
            active.frame.halt();
        }

        if fault.is_none() && active.previewing {
            if let Err(e) = device.stop_preview() {
                fault = Some(e);
            }
        }

        if let Some(e) = fault {
            warn!("Teardown hardware call failed, skipping the remaining steps: {}", e);
        }

        let ActiveSession {
            session,
            frame,
            focus,
            ..
        } = active;
        debug!(
            "Session {} totals: frames {:?}, focus {:?}",
            id,
            frame.stats(),
            focus.stats()
        );
        drop(focus);
        drop(frame);
        session.release();

        self.set_status(SessionState::Closed);
        self.context
            .events
            .publish(ScanEvent::SessionClosed { session: Some(id) });
    }
}

/// Preview configuration in its mandated order, ending with the stream running
fn configure_preview(
    device: &mut dyn CaptureDevice,
    frame: &mut FrameScheduler,
    surface: Option<PreviewSurface>,
    target: (u32, u32),
    context: &ScanContext,
    tolerance: f64,
) -> Result<(PreviewSize, u32), DeviceError> {
    let orientation = context.display.orientation();
    match preview_target(target.0, target.1, orientation) {
        Some((ratio, height)) => {
            let sizes = device.supported_preview_sizes()?;
            if let Some(size) = select_preview_size(&sizes, ratio, height, tolerance) {
                debug!("Selected preview size {} for target ratio {:.3}", size, ratio);
                device.set_preview_size(size)?;
            }
        }
        None => debug!("Preview surface has no size yet, keeping the current preview size"),
    }

    device.set_preview_display(surface)?;

    let degrees = display_orientation(&device.info(), context.display.rotation());
    device.set_display_orientation(degrees)?;

    frame.request_next_frame(&mut *device)?;
    device.start_preview()?;

    Ok((device.preview_size()?, degrees))
}
