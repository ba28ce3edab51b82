use crate::decoder::{DecoderConfig, SymbolFormat};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScanConfig {
    pub camera: CameraConfig,
    pub preview: PreviewConfig,
    pub focus: FocusConfig,
    pub decoder: DecoderConfig,
    pub scan_window: ScanWindowConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera index to open; unset picks the first back-facing camera
    #[serde(default)]
    pub index: Option<usize>,

    /// How long `wait_opened` waits for the device before giving up
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Maximum difference between a preview size's aspect ratio and the surface's
    #[serde(default = "default_aspect_tolerance")]
    pub aspect_tolerance: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FocusConfig {
    /// Delay before the next auto-focus attempt, in milliseconds
    #[serde(default = "default_focus_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Aim auto-focus at the scan window instead of the frame center
    #[serde(default = "default_adjust_focus_area")]
    pub adjust_focus_area: bool,

    /// Weight assigned to the scan-window focus area
    #[serde(default = "default_focus_area_weight")]
    pub focus_area_weight: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScanWindowConfig {
    /// Scan window width as a fraction of the overlay width
    #[serde(default = "default_width_ratio")]
    pub width_ratio: f64,

    /// Scan window height as a fraction of its own width
    #[serde(default = "default_height_width_ratio")]
    pub height_width_ratio: f64,

    /// Left offset in overlay pixels; negative centers horizontally
    #[serde(default = "default_left_offset")]
    pub left_offset: i32,

    /// Top offset in overlay pixels; negative centers vertically
    #[serde(default = "default_top_offset")]
    pub top_offset: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// UI event queue capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Cooldown before the demo asks for another frame after a result
    #[serde(default = "default_rescan_delay_ms")]
    pub rescan_delay_ms: u64,
}

impl FocusConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl CameraConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl SystemConfig {
    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms)
    }
}

impl ScanConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("scancam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let formats: Vec<String> = default_formats()
            .iter()
            .map(|format| format.name().to_string())
            .collect();

        let settings = Config::builder()
            .set_default("camera.open_timeout_ms", default_open_timeout_ms())?
            .set_default("preview.aspect_tolerance", default_aspect_tolerance())?
            .set_default("focus.retry_delay_ms", default_focus_retry_delay_ms())?
            .set_default("focus.adjust_focus_area", default_adjust_focus_area())?
            .set_default("focus.focus_area_weight", default_focus_area_weight() as i64)?
            .set_default("decoder.formats", formats)?
            .set_default("decoder.x_density", default_density() as i64)?
            .set_default("decoder.y_density", default_density() as i64)?
            .set_default("scan_window.width_ratio", default_width_ratio())?
            .set_default("scan_window.height_width_ratio", default_height_width_ratio())?
            .set_default("scan_window.left_offset", default_left_offset() as i64)?
            .set_default("scan_window.top_offset", default_top_offset() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.rescan_delay_ms", default_rescan_delay_ms())?
            .add_source(File::with_name(&path_str).required(false))
            // SCANCAM_FOCUS__RETRY_DELAY_MS -> focus.retry_delay_ms
            .add_source(
                Environment::with_prefix("SCANCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ScanConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.open_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera open_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if !(self.preview.aspect_tolerance >= 0.0) {
            return Err(ConfigError::Message(
                "Preview aspect_tolerance must not be negative".to_string(),
            ));
        }

        if self.focus.retry_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Focus retry_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.focus.focus_area_weight < 1 || self.focus.focus_area_weight > 1000 {
            return Err(ConfigError::Message(
                "Focus focus_area_weight must be within 1..=1000".to_string(),
            ));
        }

        if self.decoder.formats.is_empty() {
            return Err(ConfigError::Message(
                "Decoder must enable at least one symbol format".to_string(),
            ));
        }

        if self.decoder.x_density == 0 || self.decoder.y_density == 0 {
            return Err(ConfigError::Message(
                "Decoder densities must be greater than 0".to_string(),
            ));
        }

        let window = &self.scan_window;
        if !(window.width_ratio > 0.0 && window.width_ratio <= 1.0) {
            return Err(ConfigError::Message(
                "Scan window width_ratio must be within (0, 1]".to_string(),
            ));
        }

        if !(window.height_width_ratio > 0.0) {
            return Err(ConfigError::Message(
                "Scan window height_width_ratio must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: None,
                open_timeout_ms: default_open_timeout_ms(),
            },
            preview: PreviewConfig {
                aspect_tolerance: default_aspect_tolerance(),
            },
            focus: FocusConfig {
                retry_delay_ms: default_focus_retry_delay_ms(),
                adjust_focus_area: default_adjust_focus_area(),
                focus_area_weight: default_focus_area_weight(),
            },
            decoder: DecoderConfig {
                formats: default_formats(),
                x_density: default_density(),
                y_density: default_density(),
            },
            scan_window: ScanWindowConfig {
                width_ratio: default_width_ratio(),
                height_width_ratio: default_height_width_ratio(),
                left_offset: default_left_offset(),
                top_offset: default_top_offset(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                rescan_delay_ms: default_rescan_delay_ms(),
            },
        }
    }
}

impl Default for ScanWindowConfig {
    fn default() -> Self {
        ScanConfig::default().scan_window
    }
}

// Default value functions
fn default_open_timeout_ms() -> u64 {
    5000
}

fn default_aspect_tolerance() -> f64 {
    0.1
}

fn default_focus_retry_delay_ms() -> u64 {
    1000
}
fn default_adjust_focus_area() -> bool {
    false
}
fn default_focus_area_weight() -> i32 {
    1000
}

fn default_formats() -> Vec<SymbolFormat> {
    SymbolFormat::ALL.to_vec()
}
pub(crate) fn default_density() -> u32 {
    3
}

fn default_width_ratio() -> f64 {
    0.9
}
fn default_height_width_ratio() -> f64 {
    0.4
}
fn default_left_offset() -> i32 {
    -1
}
fn default_top_offset() -> i32 {
    100
}

fn default_event_bus_capacity() -> usize {
    64
}
fn default_rescan_delay_ms() -> u64 {
    2000
}
