use super::interface::{
    CameraFacing, CameraInfo, CameraProvider, CaptureDevice, DeviceSession, FocusArea,
    FocusCallback, FocusController, FrameCallback, FrameSource, PreviewSurface,
};
use crate::error::DeviceError;
use crate::frame::{FrameBuffer, PixelFormat};
use crate::geometry::PreviewSize;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Hardware call recorded by the mock device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Open(Option<usize>),
    SetPreviewSize(PreviewSize),
    SetPreviewDisplay(Option<PreviewSurface>),
    SetDisplayOrientation(u32),
    SetAutoFocusMode,
    StartPreview,
    StopPreview,
    SetFrameCallback(bool),
    AutoFocus,
    CancelAutoFocus,
    SetFocusAreas(Vec<FocusArea>),
    Release,
}

/// Hardware calls the mock should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFaults {
    pub open: bool,
    pub start_preview: bool,
    pub stop_preview: bool,
    pub auto_focus: bool,
    pub cancel_auto_focus: bool,
    pub frame_callback: bool,
}

struct MockState {
    calls: Vec<DeviceCall>,
    calls_after_release: Vec<DeviceCall>,
    faults: MockFaults,
    frame_callback: Option<FrameCallback>,
    focus_callback: Option<FocusCallback>,
    preview_sizes: Vec<PreviewSize>,
    preview_size: PreviewSize,
    max_focus_areas: u32,
    auto_focus_result: Option<bool>,
    still_frame: Option<Arc<Vec<u8>>>,
    sequence: u64,
    previewing: bool,
    released: bool,
    open_count: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            calls_after_release: Vec::new(),
            faults: MockFaults::default(),
            frame_callback: None,
            focus_callback: None,
            preview_sizes: vec![
                PreviewSize::new(640, 480),
                PreviewSize::new(1280, 720),
                PreviewSize::new(1920, 1080),
            ],
            preview_size: PreviewSize::new(640, 480),
            max_focus_areas: 1,
            auto_focus_result: None,
            still_frame: None,
            sequence: 0,
            previewing: false,
            released: false,
            open_count: 0,
        }
    }
}

/// Scriptable camera provider for testing without real hardware.
///
/// Clones share state, so a test can keep one handle while the session
/// controller owns another.
#[derive(Clone)]
pub struct MockCameraProvider {
    cameras: Arc<Vec<CameraInfo>>,
    state: Arc<Mutex<MockState>>,
    open_delay: Duration,
}

impl MockCameraProvider {
    pub fn new(cameras: Vec<CameraInfo>) -> Self {
        Self {
            cameras: Arc::new(cameras),
            state: Arc::new(Mutex::new(MockState::default())),
            open_delay: Duration::ZERO,
        }
    }

    /// A single back-facing camera mounted at 90 degrees
    pub fn single_back_camera() -> Self {
        Self::new(vec![CameraInfo {
            facing: CameraFacing::Back,
            orientation: 90,
        }])
    }

    pub fn with_preview_sizes(self, sizes: Vec<PreviewSize>) -> Self {
        {
            let mut state = self.state.lock();
            if let Some(first) = sizes.first() {
                state.preview_size = *first;
            }
            state.preview_sizes = sizes;
        }
        self
    }

    pub fn with_max_focus_areas(self, max: u32) -> Self {
        self.state.lock().max_focus_areas = max;
        self
    }

    /// Block inside `open` for this long
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Complete every auto-focus request immediately with `success`
    pub fn with_auto_focus_result(self, success: bool) -> Self {
        self.state.lock().auto_focus_result = Some(success);
        self
    }

    /// Serve every frame from this luma image; it becomes the only preview size
    pub fn with_still_frame(self, width: u32, height: u32, luma: Vec<u8>) -> Self {
        {
            let mut state = self.state.lock();
            let size = PreviewSize::new(width, height);
            state.preview_sizes = vec![size];
            state.preview_size = size;
            state.still_frame = Some(Arc::new(luma));
        }
        self
    }

    pub fn set_faults(&self, faults: MockFaults) {
        self.state.lock().faults = faults;
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    /// Calls that reached the device after it was released
    pub fn calls_after_release(&self) -> Vec<DeviceCall> {
        self.state.lock().calls_after_release.clone()
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    pub fn is_previewing(&self) -> bool {
        self.state.lock().previewing
    }

    pub fn has_frame_callback(&self) -> bool {
        self.state.lock().frame_callback.is_some()
    }

    pub fn has_focus_callback(&self) -> bool {
        self.state.lock().focus_callback.is_some()
    }

    /// Fire the armed one-shot frame callback; false when nothing is armed
    pub fn deliver_frame(&self, frame: FrameBuffer) -> bool {
        let callback = {
            let mut state = self.state.lock();
            if !state.previewing {
                return false;
            }
            state.frame_callback.take()
        };

        match callback {
            Some(callback) => {
                callback(frame);
                true
            }
            None => false,
        }
    }

    /// Deliver the configured still image (or mid-grey) at the current preview size
    pub fn deliver_still_frame(&self) -> bool {
        let frame = {
            let mut state = self.state.lock();
            state.sequence += 1;
            let size = state.preview_size;
            let data = match &state.still_frame {
                Some(luma) => luma.as_ref().clone(),
                None => vec![0x80; PixelFormat::Y800.frame_len(size.width, size.height)],
            };
            FrameBuffer::new(state.sequence, data, size.width, size.height, PixelFormat::Y800)
        };
        self.deliver_frame(frame)
    }

    /// Report completion of the pending auto-focus request
    pub fn complete_focus(&self, success: bool) -> bool {
        let callback = self.state.lock().focus_callback.take();
        match callback {
            Some(callback) => {
                callback(success);
                true
            }
            None => false,
        }
    }
}

impl CameraProvider for MockCameraProvider {
    fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    fn camera_info(&self, index: usize) -> Option<CameraInfo> {
        self.cameras.get(index).copied()
    }

    fn open(&self, index: Option<usize>) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }

        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Open(index));

        if state.faults.open {
            return Err(DeviceError::Open {
                index,
                details: "camera is in use by another client".to_string(),
            });
        }

        let info = match index {
            Some(index) => self.cameras.get(index).copied(),
            None => self.cameras.first().copied(),
        }
        .ok_or_else(|| DeviceError::Open {
            index,
            details: "no such camera".to_string(),
        })?;

        state.released = false;
        state.previewing = false;
        state.open_count += 1;
        debug!("Mock camera {:?} opened", index);

        Ok(Box::new(MockCamera {
            info,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Device handle returned by [`MockCameraProvider::open`]
pub struct MockCamera {
    info: CameraInfo,
    state: Arc<Mutex<MockState>>,
}

impl MockCamera {
    /// Log `call`, failing if the camera is released or the fault is injected
    fn record(
        &self,
        call: DeviceCall,
        operation: &'static str,
        faulted: fn(&MockFaults) -> bool,
    ) -> Result<(), DeviceError> {
        self.record_then(call, operation, faulted, |_| ())
    }

    /// Like [`Self::record`], then apply the call's effect under the same lock
    fn record_then<R>(
        &self,
        call: DeviceCall,
        operation: &'static str,
        faulted: fn(&MockFaults) -> bool,
        effect: impl FnOnce(&mut MockState) -> R,
    ) -> Result<R, DeviceError> {
        let mut state = self.state.lock();
        if state.released {
            state.calls_after_release.push(call);
            return Err(DeviceError::Released);
        }

        state.calls.push(call);
        if faulted(&state.faults) {
            return Err(DeviceError::hardware(operation, "injected fault"));
        }
        Ok(effect(&mut *state))
    }
}

impl DeviceSession for MockCamera {
    fn info(&self) -> CameraInfo {
        self.info
    }

    fn supported_preview_sizes(&self) -> Result<Vec<PreviewSize>, DeviceError> {
        let state = self.state.lock();
        if state.released {
            return Err(DeviceError::Released);
        }
        Ok(state.preview_sizes.clone())
    }

    fn preview_size(&self) -> Result<PreviewSize, DeviceError> {
        let state = self.state.lock();
        if state.released {
            return Err(DeviceError::Released);
        }
        Ok(state.preview_size)
    }

    fn set_preview_size(&mut self, size: PreviewSize) -> Result<(), DeviceError> {
        self.record_then(
            DeviceCall::SetPreviewSize(size),
            "set_preview_size",
            |_| false,
            |state| state.preview_size = size,
        )
    }

    fn set_preview_display(&mut self, surface: Option<PreviewSurface>) -> Result<(), DeviceError> {
        self.record(
            DeviceCall::SetPreviewDisplay(surface),
            "set_preview_display",
            |_| false,
        )
    }

    fn set_display_orientation(&mut self, degrees: u32) -> Result<(), DeviceError> {
        self.record(
            DeviceCall::SetDisplayOrientation(degrees),
            "set_display_orientation",
            |_| false,
        )
    }

    fn set_auto_focus_mode(&mut self) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetAutoFocusMode, "set_auto_focus_mode", |_| false)
    }

    fn start_preview(&mut self) -> Result<(), DeviceError> {
        self.record_then(
            DeviceCall::StartPreview,
            "start_preview",
            |f| f.start_preview,
            |state| state.previewing = true,
        )
    }

    fn stop_preview(&mut self) -> Result<(), DeviceError> {
        self.record_then(
            DeviceCall::StopPreview,
            "stop_preview",
            |f| f.stop_preview,
            |state| {
                state.previewing = false;
                state.frame_callback = None;
            },
        )
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        if state.released {
            state.calls_after_release.push(DeviceCall::Release);
            return;
        }
        state.calls.push(DeviceCall::Release);
        state.released = true;
        state.previewing = false;
        state.frame_callback = None;
        state.focus_callback = None;
        debug!("Mock camera released");
    }
}

impl FrameSource for MockCamera {
    fn set_one_shot_frame_callback(
        &mut self,
        callback: Option<FrameCallback>,
    ) -> Result<(), DeviceError> {
        self.record_then(
            DeviceCall::SetFrameCallback(callback.is_some()),
            "set_one_shot_frame_callback",
            |f| f.frame_callback,
            |state| state.frame_callback = callback,
        )
    }
}

impl FocusController for MockCamera {
    fn auto_focus(&mut self, callback: FocusCallback) -> Result<(), DeviceError> {
        let immediate = self.record_then(
            DeviceCall::AutoFocus,
            "auto_focus",
            |f| f.auto_focus,
            |state| match state.auto_focus_result {
                Some(success) => Some((callback, success)),
                None => {
                    state.focus_callback = Some(callback);
                    None
                }
            },
        )?;

        // completion runs outside the lock, as a real driver would call back later
        if let Some((callback, success)) = immediate {
            callback(success);
        }
        Ok(())
    }

    fn cancel_auto_focus(&mut self) -> Result<(), DeviceError> {
        self.record_then(
            DeviceCall::CancelAutoFocus,
            "cancel_auto_focus",
            |f| f.cancel_auto_focus,
            |state| state.focus_callback = None,
        )
    }

    fn max_focus_areas(&self) -> u32 {
        self.state.lock().max_focus_areas
    }

    fn set_focus_areas(&mut self, areas: &[FocusArea]) -> Result<(), DeviceError> {
        self.record(
            DeviceCall::SetFocusAreas(areas.to_vec()),
            "set_focus_areas",
            |_| false,
        )
    }
}
