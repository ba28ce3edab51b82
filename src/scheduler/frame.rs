use super::ScanContext;
use crate::decoder::ScanResult;
use crate::device::{CameraInfo, DeviceQueue, FrameSource};
use crate::error::DeviceError;
use crate::events::ScanEvent;
use crate::frame::FrameBuffer;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Per-scheduler frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub delivered: u64,
    pub decoded: u64,
    pub empty: u64,
    pub errors: u64,
    pub skipped: u64,
    pub rearmed: u64,
}

/// What happened to one delivered frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Decoded(ScanResult),
    Empty,
    Failed,
    Skipped,
    /// Arrived while the scheduler was paused or stopped
    Dropped,
}

/// Keeps at most one frame request outstanding and decodes each delivery
pub struct FrameScheduler {
    session: Uuid,
    camera: CameraInfo,
    queue: DeviceQueue,
    context: ScanContext,
    armed: bool,
    paused: bool,
    stopped: bool,
    stats: FrameStats,
}

impl FrameScheduler {
    pub fn new(session: Uuid, camera: CameraInfo, queue: DeviceQueue, context: ScanContext) -> Self {
        Self {
            session,
            camera,
            queue,
            context,
            armed: false,
            paused: false,
            stopped: false,
            stats: FrameStats::default(),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Arm a one-shot delivery; no-op while one is outstanding.
    ///
    /// Returns whether a new callback was registered.
    pub fn request_next_frame<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<bool, DeviceError> {
        if self.stopped {
            debug!("Frame request after stop ignored");
            return Ok(false);
        }
        self.paused = false;
        if self.armed {
            trace!("Frame request already outstanding");
            return Ok(false);
        }

        source.set_one_shot_frame_callback(Some(self.queue.frame_callback(self.session)))?;
        self.armed = true;
        Ok(true)
    }

    /// Handle one delivered frame; exactly one outcome per frame
    pub fn on_frame<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        frame: FrameBuffer,
    ) -> FrameOutcome {
        if self.stopped || self.paused {
            trace!("Dropping frame {} delivered while inactive", frame.sequence);
            return FrameOutcome::Dropped;
        }

        // the one-shot callback was consumed by this delivery
        self.armed = false;
        self.stats.delivered += 1;

        let outcome = self.decode(&frame);
        match &outcome {
            FrameOutcome::Decoded(result) => {
                self.stats.decoded += 1;
                self.context.events.publish(ScanEvent::Decoded {
                    result: result.clone(),
                });
            }
            FrameOutcome::Empty => self.stats.empty += 1,
            FrameOutcome::Failed => self.stats.errors += 1,
            FrameOutcome::Skipped => self.stats.skipped += 1,
            FrameOutcome::Dropped => {}
        }

        if !matches!(outcome, FrameOutcome::Decoded(_)) {
            self.rearm(source);
        }
        outcome
    }

    fn decode(&self, frame: &FrameBuffer) -> FrameOutcome {
        let overlay = &self.context.overlay;
        let Some(window) = overlay.scan_window() else {
            debug!("Scan window not laid out, skipping frame {}", frame.sequence);
            return FrameOutcome::Skipped;
        };
        let overlay_size = overlay.size();
        if overlay_size.0 == 0 || overlay_size.1 == 0 {
            return FrameOutcome::Skipped;
        }

        let orientation = self.context.display.orientation();
        let rotation = self.context.rotation(&self.camera);

        // geometry invariant violations propagate; only the decoder is guarded
        let mapped = self.context.geometry.lock().crop_rect(
            window,
            overlay_size,
            (frame.width, frame.height),
            orientation,
            rotation,
        );
        let Some(crop) = mapped.clamp_to(frame.width, frame.height) else {
            debug!(
                "Scan window maps to {} outside the {}x{} frame, skipping frame {}",
                mapped, frame.width, frame.height, frame.sequence
            );
            return FrameOutcome::Skipped;
        };
        if crop != mapped {
            trace!("Crop {} clamped to {}", mapped, crop);
        }

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.context.decoder.decode(frame, crop)
        }));

        match attempt {
            Ok(Ok(symbols)) => match ScanResult::from_symbols(&symbols, self.session) {
                Some(result) => FrameOutcome::Decoded(result),
                None => FrameOutcome::Empty,
            },
            Ok(Err(e)) => {
                warn!("Decoding frame {} failed: {}", frame.sequence, e);
                FrameOutcome::Failed
            }
            Err(_) => {
                error!("Decoder panicked on frame {}", frame.sequence);
                FrameOutcome::Failed
            }
        }
    }

    fn rearm<S: FrameSource + ?Sized>(&mut self, source: &mut S) {
        match source.set_one_shot_frame_callback(Some(self.queue.frame_callback(self.session))) {
            Ok(()) => {
                self.armed = true;
                self.stats.rearmed += 1;
            }
            Err(e) => warn!("Failed to re-arm frame callback: {}", e),
        }
    }

    /// Stop handling deliveries until the next request, without clearing hardware state
    pub fn pause(&mut self) {
        self.armed = false;
        self.paused = true;
    }

    /// Terminal stop without touching hardware
    pub fn halt(&mut self) -> FrameStats {
        self.armed = false;
        self.stopped = true;
        debug!("Frame scheduler stopped: {:?}", self.stats);
        self.stats
    }

    /// Terminal stop that also clears the pending frame callback
    pub fn stop<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<FrameStats, DeviceError> {
        let stats = self.halt();
        source.set_one_shot_frame_callback(None)?;
        Ok(stats)
    }
}
