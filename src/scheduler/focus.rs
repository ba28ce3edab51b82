use super::ScanContext;
use crate::config::FocusConfig;
use crate::device::{CameraInfo, DeviceCommand, DeviceQueue, FocusArea, FocusController};
use crate::error::DeviceError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Auto-focus cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    /// Waiting for the next attempt (a retry timer may be pending)
    Idle,
    /// `auto_focus` issued, completion outstanding
    Requested,
    /// Last attempt completed
    Settled,
    /// Last attempt failed synchronously
    Failed,
    /// Preview stopped; resumed by `start`
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusStats {
    pub attempts: u64,
    pub settled: u64,
    pub failed: u64,
    pub retries_scheduled: u64,
}

/// Re-issues auto-focus after a fixed delay for as long as the preview runs
pub struct FocusScheduler {
    session: Uuid,
    camera: CameraInfo,
    queue: DeviceQueue,
    context: ScanContext,
    config: FocusConfig,
    state: FocusState,
    retry: Option<CancellationToken>,
    stats: FocusStats,
}

impl FocusScheduler {
    pub fn new(
        session: Uuid,
        camera: CameraInfo,
        queue: DeviceQueue,
        context: ScanContext,
        config: FocusConfig,
    ) -> Self {
        Self {
            session,
            camera,
            queue,
            context,
            config,
            state: FocusState::Idle,
            retry: None,
            stats: FocusStats::default(),
        }
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn stats(&self) -> FocusStats {
        self.stats
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Begin (or resume) the focus cycle with an immediate attempt
    pub fn start<D: FocusController + ?Sized>(&mut self, device: &mut D) {
        match self.state {
            FocusState::Stopped => debug!("Focus scheduler already stopped"),
            FocusState::Requested => trace!("Focus attempt already in flight"),
            _ => {
                self.state = FocusState::Idle;
                self.attempt(device);
            }
        }
    }

    /// Begin the cycle after one retry delay, for when the surface is not ready yet
    pub fn start_deferred(&mut self) {
        if matches!(self.state, FocusState::Stopped | FocusState::Requested) {
            return;
        }
        self.state = FocusState::Idle;
        self.schedule_retry();
    }

    /// The delayed re-entry fired
    pub fn on_retry<D: FocusController + ?Sized>(&mut self, device: &mut D) {
        if self.state != FocusState::Idle || self.retry.is_none() {
            trace!("Ignoring focus retry in state {:?}", self.state);
            return;
        }
        self.retry = None;
        self.attempt(device);
    }

    /// The delayed re-entry fired with no surface to focus on; the cycle waits for `start`
    pub fn skip_retry(&mut self) {
        if self.state == FocusState::Idle && self.retry.take().is_some() {
            debug!("No preview surface, auto-focus waits for the next start");
        }
    }

    /// Hardware reported completion of the in-flight attempt
    pub fn on_settled(&mut self, success: bool) {
        if self.state != FocusState::Requested {
            trace!("Ignoring focus completion in state {:?}", self.state);
            return;
        }

        debug!("Auto-focus settled (success: {})", success);
        self.state = FocusState::Settled;
        self.stats.settled += 1;
        self.schedule_retry();
        self.state = FocusState::Idle;
    }

    fn attempt<D: FocusController + ?Sized>(&mut self, device: &mut D) {
        if self.config.adjust_focus_area && device.max_focus_areas() > 0 {
            self.apply_focus_area(device);
        }

        self.stats.attempts += 1;
        match device.auto_focus(self.queue.focus_callback(self.session)) {
            Ok(()) => {
                trace!("Auto-focus requested");
                self.state = FocusState::Requested;
            }
            Err(e) => {
                warn!("Auto-focus failed: {}", e);
                self.state = FocusState::Failed;
                self.stats.failed += 1;
                self.schedule_retry();
                self.state = FocusState::Idle;
            }
        }
    }

    fn apply_focus_area<D: FocusController + ?Sized>(&mut self, device: &mut D) {
        let overlay = &self.context.overlay;
        let Some(window) = overlay.scan_window() else {
            debug!("Scan window not laid out, keeping previous focus area");
            return;
        };

        let rotation = self.context.rotation(&self.camera);
        let rect = self
            .context
            .geometry
            .lock()
            .focus_rect(window, overlay.size(), rotation);
        let area = FocusArea {
            rect,
            weight: self.config.focus_area_weight,
        };

        if let Err(e) = device.set_focus_areas(&[area]) {
            warn!("Failed to set focus area {}: {}", rect, e);
        }
    }

    fn schedule_retry(&mut self) {
        self.cancel_retry();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let queue = self.queue.clone();
        let session = self.session;
        let delay = Duration::from_millis(self.config.retry_delay_ms);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    queue.post(DeviceCommand::FocusRetry { session });
                }
            }
        });

        self.retry = Some(token);
        self.stats.retries_scheduled += 1;
        trace!("Next auto-focus in {:?}", delay);
    }

    fn cancel_retry(&mut self) {
        if let Some(token) = self.retry.take() {
            token.cancel();
        }
    }

    /// Cancel the cycle and any in-flight focus until `start` is called again
    pub fn pause<D: FocusController + ?Sized>(&mut self, device: &mut D) -> Result<(), DeviceError> {
        if self.state == FocusState::Stopped {
            return Ok(());
        }
        self.cancel_retry();
        self.state = FocusState::Paused;
        device.cancel_auto_focus()
    }

    /// Terminal stop without touching hardware
    pub fn halt(&mut self) -> FocusStats {
        self.cancel_retry();
        self.state = FocusState::Stopped;
        debug!("Focus scheduler stopped: {:?}", self.stats);
        self.stats
    }

    /// Terminal stop that also cancels any in-flight focus
    pub fn stop<D: FocusController + ?Sized>(&mut self, device: &mut D) -> Result<FocusStats, DeviceError> {
        let stats = self.halt();
        device.cancel_auto_focus()?;
        Ok(stats)
    }
}

impl Drop for FocusScheduler {
    fn drop(&mut self) {
        self.cancel_retry();
    }
}
