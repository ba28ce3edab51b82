use super::*;
use crate::config::{FocusConfig, ScanWindowConfig};
use crate::decoder::{Decoder, Symbol, SymbolFormat};
use crate::device::{
    CameraFacing, CameraInfo, CameraProvider, DeviceCall, DeviceCommand, DeviceQueue,
    MockCameraProvider, MockFaults,
};
use crate::error::DecodeError;
use crate::events::{EventBus, ScanEvent};
use crate::frame::{FrameBuffer, PixelFormat};
use crate::geometry::{CoordSpace, DisplayRotation, Rect, SharedGeometry};
use crate::overlay::{Overlay, ScanWindowOverlay, StaticDisplay};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

struct EmptyDecoder;

impl Decoder for EmptyDecoder {
    fn decode(&self, _frame: &FrameBuffer, _crop: Rect) -> Result<Vec<Symbol>, DecodeError> {
        Ok(Vec::new())
    }
}

struct FixedDecoder(&'static str);

impl Decoder for FixedDecoder {
    fn decode(&self, _frame: &FrameBuffer, _crop: Rect) -> Result<Vec<Symbol>, DecodeError> {
        Ok(vec![Symbol {
            data: self.0.as_bytes().to_vec(),
            format: SymbolFormat::QrCode,
        }])
    }
}

struct FailingDecoder;

impl Decoder for FailingDecoder {
    fn decode(&self, _frame: &FrameBuffer, _crop: Rect) -> Result<Vec<Symbol>, DecodeError> {
        Err(DecodeError::Backend {
            details: "scanner out of memory".to_string(),
        })
    }
}

struct PanickingDecoder;

impl Decoder for PanickingDecoder {
    fn decode(&self, _frame: &FrameBuffer, _crop: Rect) -> Result<Vec<Symbol>, DecodeError> {
        panic!("decoder bug");
    }
}

#[derive(Default)]
struct RecordingDecoder {
    crops: Mutex<Vec<Rect>>,
}

impl Decoder for RecordingDecoder {
    fn decode(&self, _frame: &FrameBuffer, crop: Rect) -> Result<Vec<Symbol>, DecodeError> {
        self.crops.lock().push(crop);
        Ok(Vec::new())
    }
}

/// Overlay with a fixed window, regardless of layout passes
struct FixedOverlay {
    window: Rect,
    size: (u32, u32),
}

impl Overlay for FixedOverlay {
    fn scan_window(&self) -> Option<Rect> {
        Some(self.window)
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&self, _width: u32, _height: u32) {}
}

fn back_camera() -> CameraInfo {
    CameraInfo {
        facing: CameraFacing::Back,
        orientation: 90,
    }
}

fn portrait_overlay() -> Arc<dyn Overlay> {
    Arc::new(ScanWindowOverlay::with_size(
        ScanWindowConfig::default(),
        1080,
        1920,
    ))
}

fn context(
    decoder: Arc<dyn Decoder>,
    overlay: Arc<dyn Overlay>,
) -> (ScanContext, broadcast::Receiver<ScanEvent>) {
    let events = EventBus::new(16);
    let receiver = events.subscribe();
    let context = ScanContext {
        decoder,
        overlay,
        display: Arc::new(StaticDisplay::new(DisplayRotation::Rotation0, 1080, 1920)),
        geometry: SharedGeometry::new(),
        events,
    };
    (context, receiver)
}

fn frame(sequence: u64) -> FrameBuffer {
    FrameBuffer::new(sequence, vec![0u8; 1280 * 720], 1280, 720, PixelFormat::Y800)
}

fn focus_config() -> FocusConfig {
    FocusConfig {
        retry_delay_ms: 1000,
        adjust_focus_area: false,
        focus_area_weight: 1000,
    }
}

async fn next_frame(commands: &mut tokio::sync::mpsc::UnboundedReceiver<DeviceCommand>) -> FrameBuffer {
    match commands.recv().await {
        Some(DeviceCommand::FrameDelivered { frame, .. }) => frame,
        other => panic!("expected a frame delivery, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_frames_rearm_without_results() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    let (queue, mut commands) = DeviceQueue::new();
    let (context, mut events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    assert!(scheduler.request_next_frame(&mut *device).unwrap());
    // second request while one is outstanding is a no-op
    assert!(!scheduler.request_next_frame(&mut *device).unwrap());

    for sequence in 0..5 {
        assert!(provider.deliver_frame(frame(sequence)));
        let delivered = next_frame(&mut commands).await;
        assert_eq!(scheduler.on_frame(&mut *device, delivered), FrameOutcome::Empty);
        assert!(provider.has_frame_callback());
        assert!(scheduler.is_armed());
    }

    let stats = scheduler.stats();
    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.empty, 5);
    assert_eq!(stats.rearmed, 5);
    assert_eq!(stats.decoded, 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_decoded_frame_publishes_and_stops_requesting() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    let (queue, mut commands) = DeviceQueue::new();
    let (context, mut events) = context(Arc::new(FixedDecoder("hello")), portrait_overlay());
    let session = Uuid::new_v4();
    let mut scheduler = FrameScheduler::new(session, back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    provider.deliver_frame(frame(1));
    let delivered = next_frame(&mut commands).await;

    match scheduler.on_frame(&mut *device, delivered) {
        FrameOutcome::Decoded(result) => assert_eq!(result.contents, "hello"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!provider.has_frame_callback());
    assert!(!scheduler.is_armed());

    match events.try_recv() {
        Ok(ScanEvent::Decoded { result }) => {
            assert_eq!(result.session, session);
            assert_eq!(result.format, SymbolFormat::QrCode);
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(scheduler.request_next_frame(&mut *device).unwrap());
    assert!(provider.has_frame_callback());
}

#[tokio::test]
async fn test_decoder_errors_and_panics_rearm() {
    for decoder in [
        Arc::new(FailingDecoder) as Arc<dyn Decoder>,
        Arc::new(PanickingDecoder) as Arc<dyn Decoder>,
    ] {
        let provider = MockCameraProvider::single_back_camera();
        let mut device = provider.open(None).unwrap();
        device.start_preview().unwrap();

        let (queue, mut commands) = DeviceQueue::new();
        let (context, mut events) = context(decoder, portrait_overlay());
        let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

        scheduler.request_next_frame(&mut *device).unwrap();
        provider.deliver_frame(frame(1));
        let delivered = next_frame(&mut commands).await;

        assert_eq!(scheduler.on_frame(&mut *device, delivered), FrameOutcome::Failed);
        assert!(provider.has_frame_callback());
        assert_eq!(scheduler.stats().errors, 1);
        assert_eq!(scheduler.stats().rearmed, 1);
        assert!(events.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_absent_window_skips_and_rearms() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    let unlaid: Arc<dyn Overlay> = Arc::new(ScanWindowOverlay::new(ScanWindowConfig::default()));
    let recorder = Arc::new(RecordingDecoder::default());
    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(recorder.clone(), unlaid);
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    provider.deliver_frame(frame(1));
    let delivered = next_frame(&mut commands).await;

    assert_eq!(scheduler.on_frame(&mut *device, delivered), FrameOutcome::Skipped);
    assert!(provider.has_frame_callback());
    assert!(recorder.crops.lock().is_empty());
}

#[tokio::test]
async fn test_decoder_receives_rotated_crop() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    let recorder = Arc::new(RecordingDecoder::default());
    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(recorder.clone(), portrait_overlay());
    let geometry = context.geometry.clone();
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    for sequence in 0..2 {
        provider.deliver_frame(frame(sequence));
        let delivered = next_frame(&mut commands).await;
        scheduler.on_frame(&mut *device, delivered);
    }

    let expected = Rect::new(66, 36, 325, 684, CoordSpace::SensorBuffer);
    assert_eq!(*recorder.crops.lock(), vec![expected, expected]);
    assert_eq!(geometry.lock().recomputations(), 1);
}

#[tokio::test]
async fn test_window_past_overlay_edge_is_clamped() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    // default window is taller than a 300px overlay
    let overlay: Arc<dyn Overlay> = Arc::new(ScanWindowOverlay::with_size(
        ScanWindowConfig::default(),
        1000,
        300,
    ));
    assert_eq!(
        overlay.scan_window(),
        Some(Rect::new(50, 100, 950, 460, CoordSpace::Overlay))
    );

    let recorder = Arc::new(RecordingDecoder::default());
    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(recorder.clone(), overlay);
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    for sequence in 0..3 {
        provider.deliver_frame(frame(sequence));
        let delivered = next_frame(&mut commands).await;
        assert_eq!(scheduler.on_frame(&mut *device, delivered), FrameOutcome::Empty);
    }

    let expected = Rect::new(426, 36, 1280, 684, CoordSpace::SensorBuffer);
    assert_eq!(*recorder.crops.lock(), vec![expected; 3]);
    let stats = scheduler.stats();
    assert_eq!(stats.empty, 3);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_window_outside_frame_skips_and_rearms() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    let overlay: Arc<dyn Overlay> = Arc::new(FixedOverlay {
        window: Rect::new(1100, 0, 1200, 100, CoordSpace::Overlay),
        size: (1080, 1920),
    });
    let recorder = Arc::new(RecordingDecoder::default());
    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(recorder.clone(), overlay);
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    provider.deliver_frame(frame(1));
    let delivered = next_frame(&mut commands).await;

    assert_eq!(scheduler.on_frame(&mut *device, delivered), FrameOutcome::Skipped);
    assert!(provider.has_frame_callback());
    assert!(recorder.crops.lock().is_empty());
}

#[tokio::test]
#[should_panic(expected = "invalid")]
async fn test_collapsed_crop_panics_instead_of_rearming() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    // one overlay pixel scales to zero buffer pixels
    let overlay: Arc<dyn Overlay> = Arc::new(FixedOverlay {
        window: Rect::new(0, 0, 1, 1, CoordSpace::Overlay),
        size: (1080, 1920),
    });
    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(EmptyDecoder), overlay);
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    provider.deliver_frame(frame(1));
    let delivered = next_frame(&mut commands).await;

    scheduler.on_frame(&mut *device, delivered);
}

#[tokio::test]
async fn test_frames_after_stop_are_dropped() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();
    device.start_preview().unwrap();

    let (queue, _commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(FixedDecoder("late")), portrait_overlay());
    let mut scheduler = FrameScheduler::new(Uuid::new_v4(), back_camera(), queue, context);

    scheduler.request_next_frame(&mut *device).unwrap();
    scheduler.stop(&mut *device).unwrap();
    assert!(!provider.has_frame_callback());
    assert!(scheduler.is_stopped());

    assert_eq!(scheduler.on_frame(&mut *device, frame(9)), FrameOutcome::Dropped);
    assert!(!scheduler.request_next_frame(&mut *device).unwrap());
    assert_eq!(scheduler.stats().delivered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_focus_failure_schedules_one_retry() {
    let provider = MockCameraProvider::single_back_camera();
    provider.set_faults(MockFaults {
        auto_focus: true,
        ..MockFaults::default()
    });
    let mut device = provider.open(None).unwrap();

    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let mut focus =
        FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, context, focus_config());

    let started = tokio::time::Instant::now();
    focus.start(&mut *device);
    assert_eq!(focus.state(), FocusState::Idle);
    assert!(focus.has_pending_retry());
    assert_eq!(focus.stats().failed, 1);

    let command = commands.recv().await;
    assert!(matches!(command, Some(DeviceCommand::FocusRetry { .. })));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1000) && elapsed < Duration::from_millis(1010));
    assert_eq!(focus.state(), FocusState::Idle);

    provider.set_faults(MockFaults::default());
    focus.on_retry(&mut *device);
    assert_eq!(focus.state(), FocusState::Requested);
    assert_eq!(focus.stats().retries_scheduled, 1);
    assert!(commands.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_focus_completion_cycles_after_delay() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();

    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let mut focus =
        FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, context, focus_config());

    focus.start(&mut *device);
    assert_eq!(focus.state(), FocusState::Requested);
    assert!(!focus.has_pending_retry());

    // failure reported by the hardware is still a completion
    assert!(provider.complete_focus(false));
    match commands.recv().await {
        Some(DeviceCommand::FocusSettled { success, .. }) => focus.on_settled(success),
        other => panic!("unexpected command {:?}", other),
    }
    assert_eq!(focus.state(), FocusState::Idle);
    assert_eq!(focus.stats().settled, 1);

    assert!(matches!(
        commands.recv().await,
        Some(DeviceCommand::FocusRetry { .. })
    ));
    focus.on_retry(&mut *device);
    assert_eq!(focus.state(), FocusState::Requested);

    let auto_focus_calls = provider
        .calls()
        .into_iter()
        .filter(|call| *call == DeviceCall::AutoFocus)
        .count();
    assert_eq!(auto_focus_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    let provider = MockCameraProvider::single_back_camera();
    provider.set_faults(MockFaults {
        auto_focus: true,
        ..MockFaults::default()
    });
    let mut device = provider.open(None).unwrap();

    let (queue, mut commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let mut focus =
        FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, context, focus_config());

    focus.start(&mut *device);
    assert!(focus.has_pending_retry());

    focus.stop(&mut *device).unwrap();
    assert_eq!(focus.state(), FocusState::Stopped);
    assert!(!focus.has_pending_retry());
    assert!(provider.calls().contains(&DeviceCall::CancelAutoFocus));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(commands.try_recv().is_err());

    // stopped is terminal
    focus.start(&mut *device);
    focus.on_settled(true);
    assert_eq!(focus.state(), FocusState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pause_ignores_late_completion_and_resumes() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();

    let (queue, _commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let mut focus =
        FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, context, focus_config());

    focus.start(&mut *device);
    focus.pause(&mut *device).unwrap();
    assert_eq!(focus.state(), FocusState::Paused);

    focus.on_settled(true);
    assert_eq!(focus.state(), FocusState::Paused);
    assert!(!focus.has_pending_retry());

    focus.start(&mut *device);
    assert_eq!(focus.state(), FocusState::Requested);
}

#[tokio::test]
async fn test_focus_area_targets_scan_window() {
    let provider = MockCameraProvider::single_back_camera();
    let mut device = provider.open(None).unwrap();

    let (queue, _commands) = DeviceQueue::new();
    let (context, _events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let config = FocusConfig {
        adjust_focus_area: true,
        ..focus_config()
    };
    let mut focus = FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, context, config);

    focus.start(&mut *device);

    let area = crate::device::FocusArea {
        rect: Rect::new(-896, -900, -492, 900, CoordSpace::FocusArea),
        weight: 1000,
    };
    let calls = provider.calls();
    let area_call = calls
        .iter()
        .position(|call| *call == DeviceCall::SetFocusAreas(vec![area]))
        .expect("focus area was not set");
    let focus_call = calls
        .iter()
        .position(|call| *call == DeviceCall::AutoFocus)
        .unwrap();
    assert!(area_call < focus_call);
}

#[tokio::test]
async fn test_focus_area_skipped_without_support_or_window() {
    let config = FocusConfig {
        adjust_focus_area: true,
        ..focus_config()
    };

    let unsupported = MockCameraProvider::single_back_camera().with_max_focus_areas(0);
    let mut device = unsupported.open(None).unwrap();
    let (queue, _commands) = DeviceQueue::new();
    let (supported_ctx, _events) = context(Arc::new(EmptyDecoder), portrait_overlay());
    let mut focus =
        FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, supported_ctx, config.clone());
    focus.start(&mut *device);

    let unlaid: Arc<dyn Overlay> = Arc::new(ScanWindowOverlay::new(ScanWindowConfig::default()));
    let no_window = MockCameraProvider::single_back_camera();
    let mut other = no_window.open(None).unwrap();
    let (queue, _commands) = DeviceQueue::new();
    let (unlaid_ctx, _events) = context(Arc::new(EmptyDecoder), unlaid);
    let mut skipped = FocusScheduler::new(Uuid::new_v4(), back_camera(), queue, unlaid_ctx, config);
    skipped.start(&mut *other);

    for provider in [unsupported, no_window] {
        let calls = provider.calls();
        assert!(!calls
            .iter()
            .any(|call| matches!(call, DeviceCall::SetFocusAreas(_))));
        assert!(calls.contains(&DeviceCall::AutoFocus));
    }
    assert_eq!(focus.state(), FocusState::Requested);
    assert_eq!(skipped.state(), FocusState::Requested);
}
