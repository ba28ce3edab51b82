use crate::config::default_density;
use crate::error::DecodeError;
use crate::frame::FrameBuffer;
use crate::geometry::Rect;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Symbologies a decoder can be asked to recognize (values are zbar symbol ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolFormat {
    #[serde(rename = "EAN8")]
    Ean8 = 8,
    #[serde(rename = "UPCE")]
    Upce = 9,
    #[serde(rename = "ISBN10")]
    Isbn10 = 10,
    #[serde(rename = "UPCA")]
    Upca = 12,
    #[serde(rename = "EAN13")]
    Ean13 = 13,
    #[serde(rename = "ISBN13")]
    Isbn13 = 14,
    #[serde(rename = "I25")]
    I25 = 25,
    #[serde(rename = "DATABAR")]
    Databar = 34,
    #[serde(rename = "DATABAR_EXP")]
    DatabarExp = 35,
    #[serde(rename = "CODABAR")]
    Codabar = 38,
    #[serde(rename = "CODE39")]
    Code39 = 39,
    #[serde(rename = "PDF417")]
    Pdf417 = 57,
    #[serde(rename = "QRCODE")]
    QrCode = 64,
    #[serde(rename = "CODE93")]
    Code93 = 93,
    #[serde(rename = "CODE128")]
    Code128 = 128,
}

impl SymbolFormat {
    pub const ALL: [SymbolFormat; 15] = [
        SymbolFormat::Ean8,
        SymbolFormat::Upce,
        SymbolFormat::Isbn10,
        SymbolFormat::Upca,
        SymbolFormat::Ean13,
        SymbolFormat::Isbn13,
        SymbolFormat::I25,
        SymbolFormat::Databar,
        SymbolFormat::DatabarExp,
        SymbolFormat::Codabar,
        SymbolFormat::Code39,
        SymbolFormat::Pdf417,
        SymbolFormat::QrCode,
        SymbolFormat::Code93,
        SymbolFormat::Code128,
    ];

    pub fn id(&self) -> u32 {
        *self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            SymbolFormat::Ean8 => "EAN8",
            SymbolFormat::Upce => "UPCE",
            SymbolFormat::Isbn10 => "ISBN10",
            SymbolFormat::Upca => "UPCA",
            SymbolFormat::Ean13 => "EAN13",
            SymbolFormat::Isbn13 => "ISBN13",
            SymbolFormat::I25 => "I25",
            SymbolFormat::Databar => "DATABAR",
            SymbolFormat::DatabarExp => "DATABAR_EXP",
            SymbolFormat::Codabar => "CODABAR",
            SymbolFormat::Code39 => "CODE39",
            SymbolFormat::Pdf417 => "PDF417",
            SymbolFormat::QrCode => "QRCODE",
            SymbolFormat::Code93 => "CODE93",
            SymbolFormat::Code128 => "CODE128",
        }
    }
}

impl std::fmt::Display for SymbolFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoder settings, handed to the decoder when it is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Enabled symbologies
    pub formats: Vec<SymbolFormat>,

    /// Scan every n-th column
    #[serde(default = "default_density")]
    pub x_density: u32,

    /// Scan every n-th row
    #[serde(default = "default_density")]
    pub y_density: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            formats: SymbolFormat::ALL.to_vec(),
            x_density: default_density(),
            y_density: default_density(),
        }
    }
}

impl DecoderConfig {
    pub fn is_enabled(&self, format: SymbolFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// One symbol found in a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub data: Vec<u8>,
    pub format: SymbolFormat,
}

/// Decoded result handed to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub contents: String,
    pub format: SymbolFormat,
    pub session: Uuid,
    pub decoded_at: DateTime<Utc>,
}

impl ScanResult {
    /// First symbol whose UTF-8 contents are non-empty, if any
    pub fn from_symbols(symbols: &[Symbol], session: Uuid) -> Option<Self> {
        symbols.iter().find_map(|symbol| {
            let contents = String::from_utf8_lossy(&symbol.data);
            if contents.is_empty() {
                return None;
            }
            Some(Self {
                contents: contents.into_owned(),
                format: symbol.format,
                session,
                decoded_at: Utc::now(),
            })
        })
    }
}

/// Symbol decoder invoked on the device context for every requested frame.
///
/// `crop` is in raw buffer coordinates. An empty vector means nothing was
/// found; errors are per-frame and never end the session.
pub trait Decoder: Send + Sync {
    fn decode(&self, frame: &FrameBuffer, crop: Rect) -> Result<Vec<Symbol>, DecodeError>;
}

/// Checks shared by every decoder before touching pixels
pub fn check_frame(frame: &FrameBuffer, crop: Rect) -> Result<(), DecodeError> {
    if !frame.validate_size() {
        return Err(DecodeError::BufferTooSmall {
            expected: frame.expected_len(),
            actual: frame.data.len(),
        });
    }

    if !crop.fits_within(frame.width, frame.height) {
        return Err(DecodeError::CropOutOfBounds {
            crop: crop.to_string(),
            width: frame.width,
            height: frame.height,
        });
    }

    Ok(())
}

#[cfg(feature = "qr")]
pub use qr::QrDecoder;

#[cfg(feature = "qr")]
mod qr {
    use super::{check_frame, Decoder, DecoderConfig, Symbol, SymbolFormat};
    use crate::error::DecodeError;
    use crate::frame::FrameBuffer;
    use crate::geometry::Rect;
    use tracing::{debug, trace};

    /// QR decoder over the luma plane inside the crop, backed by `rqrr`.
    ///
    /// Densities are ignored; `rqrr` always looks at every pixel.
    pub struct QrDecoder {
        config: DecoderConfig,
    }

    impl QrDecoder {
        pub fn new(config: DecoderConfig) -> Self {
            if !config.is_enabled(SymbolFormat::QrCode) {
                debug!("QR codes are disabled; QrDecoder will report nothing");
            }
            Self { config }
        }
    }

    impl Decoder for QrDecoder {
        fn decode(&self, frame: &FrameBuffer, crop: Rect) -> Result<Vec<Symbol>, DecodeError> {
            check_frame(frame, crop)?;

            if !self.config.is_enabled(SymbolFormat::QrCode) {
                return Ok(Vec::new());
            }

            let stride = frame.width as usize;
            let left = crop.left() as usize;
            let top = crop.top() as usize;
            let data = frame.data.as_slice();

            let mut image = rqrr::PreparedImage::prepare_from_greyscale(
                crop.width() as usize,
                crop.height() as usize,
                |x, y| data[(top + y) * stride + left + x],
            );

            let symbols: Vec<Symbol> = image
                .detect_grids()
                .into_iter()
                .filter_map(|grid| match grid.decode() {
                    Ok((_, content)) => Some(Symbol {
                        data: content.into_bytes(),
                        format: SymbolFormat::QrCode,
                    }),
                    Err(e) => {
                        trace!("QR grid found but not decodable: {:?}", e);
                        None
                    }
                })
                .collect();

            trace!(
                "Frame {} crop {}: {} QR symbols",
                frame.sequence,
                crop,
                symbols.len()
            );
            Ok(symbols)
        }
    }
}
