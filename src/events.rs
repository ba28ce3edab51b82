use crate::decoder::ScanResult;
use crate::error::EventBusError;
use crate::geometry::PreviewSize;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events the scanner core reports to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A camera was opened and owns a fresh session
    SessionOpened {
        session: Uuid,
        camera_index: Option<usize>,
        front_facing: bool,
    },
    /// The camera could not be opened; the start sequence is over
    DeviceUnavailable {
        camera_index: Option<usize>,
        details: String,
    },
    /// Preview is streaming
    PreviewStarted {
        session: Uuid,
        preview_size: PreviewSize,
        display_orientation: u32,
    },
    /// Preview could not be started; the session stays open
    PreviewFailed { session: Uuid, details: String },
    /// Preview stopped because its surface went away
    PreviewStopped { session: Uuid },
    /// A symbol was decoded; no further frame is requested until asked
    Decoded { result: ScanResult },
    /// Device released and device context terminated
    SessionClosed { session: Option<Uuid> },
}

impl ScanEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::SessionOpened {
                camera_index,
                front_facing,
                ..
            } => format!(
                "Camera {:?} opened ({})",
                camera_index,
                if *front_facing { "front" } else { "back" }
            ),
            ScanEvent::DeviceUnavailable {
                camera_index,
                details,
            } => format!("Camera {:?} unavailable: {}", camera_index, details),
            ScanEvent::PreviewStarted {
                preview_size,
                display_orientation,
                ..
            } => format!(
                "Preview started at {} rotated {}",
                preview_size, display_orientation
            ),
            ScanEvent::PreviewFailed { details, .. } => format!("Preview failed: {}", details),
            ScanEvent::PreviewStopped { .. } => "Preview stopped".to_string(),
            ScanEvent::Decoded { result } => {
                format!("Decoded {}: {}", result.format, result.contents)
            }
            ScanEvent::SessionClosed { .. } => "Session closed".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::SessionOpened { .. } => "session_opened",
            ScanEvent::DeviceUnavailable { .. } => "device_unavailable",
            ScanEvent::PreviewStarted { .. } => "preview_started",
            ScanEvent::PreviewFailed { .. } => "preview_failed",
            ScanEvent::PreviewStopped { .. } => "preview_stopped",
            ScanEvent::Decoded { .. } => "decoded",
            ScanEvent::SessionClosed { .. } => "session_closed",
        }
    }
}

/// Broadcast bus carrying [`ScanEvent`]s from the device context to the UI
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish without waiting; returns how many subscribers saw the event
    pub fn publish(&self, event: ScanEvent) -> usize {
        match &event {
            ScanEvent::DeviceUnavailable { .. } | ScanEvent::PreviewFailed { .. } => {
                error!("{}", event.description());
            }
            ScanEvent::SessionOpened { .. }
            | ScanEvent::PreviewStarted { .. }
            | ScanEvent::Decoded { .. }
            | ScanEvent::SessionClosed { .. } => {
                info!("{}", event.description());
            }
            ScanEvent::PreviewStopped { .. } => {
                debug!("{}", event.description());
            }
        }

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("No subscribers for scan event");
                0
            }
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events belonging to one session
    Session(Uuid),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Session(id) => match event {
                ScanEvent::SessionOpened { session, .. }
                | ScanEvent::PreviewStarted { session, .. }
                | ScanEvent::PreviewFailed { session, .. }
                | ScanEvent::PreviewStopped { session } => session == id,
                ScanEvent::Decoded { result } => result.session == *id,
                ScanEvent::SessionClosed { session } => session.as_ref() == Some(id),
                ScanEvent::DeviceUnavailable { .. } => false,
            },
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ScanEvent>, filter: EventFilter, name: &str) -> Self {
        Self {
            receiver,
            filter,
            name: name.to_string(),
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<ScanEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!("Receiver '{}' received: {}", self.name, event.description());
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SymbolFormat;
    use chrono::Utc;
    use tokio::time::{timeout, Duration};

    fn decoded(session: Uuid) -> ScanEvent {
        ScanEvent::Decoded {
            result: ScanResult {
                contents: "hello".to_string(),
                format: SymbolFormat::QrCode,
                session,
                decoded_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let session = Uuid::new_v4();
        assert_eq!(event_bus.publish(decoded(session)), 1);

        match receiver.recv().await.unwrap() {
            ScanEvent::Decoded { result } => {
                assert_eq!(result.contents, "hello");
                assert_eq!(result.session, session);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let event_bus = EventBus::new(4);
        assert_eq!(event_bus.subscriber_count(), 0);
        assert_eq!(event_bus.publish(ScanEvent::SessionClosed { session: None }), 0);
    }

    #[test]
    fn test_event_filter() {
        let session = Uuid::new_v4();
        let by_type = EventFilter::EventTypes(vec!["decoded"]);
        let by_session = EventFilter::Session(session);

        assert!(by_type.matches(&decoded(session)));
        assert!(!by_type.matches(&ScanEvent::SessionClosed { session: None }));

        assert!(by_session.matches(&decoded(session)));
        assert!(!by_session.matches(&decoded(Uuid::new_v4())));
        assert!(by_session.matches(&ScanEvent::SessionClosed {
            session: Some(session)
        }));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::EventTypes(vec!["decoded"]),
            "test",
        );

        let session = Uuid::new_v4();
        event_bus.publish(ScanEvent::PreviewStopped { session });
        event_bus.publish(decoded(session));

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "decoded");
    }

    #[tokio::test]
    async fn test_receiver_reports_closed_bus() {
        let event_bus = EventBus::new(4);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), EventFilter::All, "test");
        drop(event_bus);

        assert!(matches!(receiver.recv().await, Err(EventBusError::ChannelClosed)));
    }
}
