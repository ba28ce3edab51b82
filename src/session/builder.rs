use super::controller::SessionController;
use crate::config::ScanConfig;
use crate::decoder::Decoder;
use crate::device::CameraProvider;
use crate::error::{Result, ScanError};
use crate::events::EventBus;
use crate::overlay::{DisplayInfo, Overlay, ScanWindowOverlay};
use std::sync::Arc;

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    provider: Option<Arc<dyn CameraProvider>>,
    decoder: Option<Arc<dyn Decoder>>,
    overlay: Option<Arc<dyn Overlay>>,
    display: Option<Arc<dyn DisplayInfo>>,
    config: Option<ScanConfig>,
    events: Option<EventBus>,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            decoder: None,
            overlay: None,
            display: None,
            config: None,
            events: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn CameraProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn overlay(mut self, overlay: Arc<dyn Overlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn display(mut self, display: Arc<dyn DisplayInfo>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<SessionController> {
        let provider = self
            .provider
            .ok_or_else(|| ScanError::system("Camera provider must be specified"))?;
        let decoder = self
            .decoder
            .ok_or_else(|| ScanError::system("Decoder must be specified"))?;
        let display = self
            .display
            .ok_or_else(|| ScanError::system("Display must be specified"))?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let overlay = self.overlay.unwrap_or_else(|| {
            Arc::new(ScanWindowOverlay::new(config.scan_window.clone())) as Arc<dyn Overlay>
        });
        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(config.system.event_bus_capacity));

        Ok(SessionController::new(
            provider, decoder, overlay, display, config, events,
        ))
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
