//! Weather data received from the companion device
//!
//! The companion pushes the weather as three independent text fields. The
//! description and the temperature are kept in a [`WeatherRecord`] and
//! combined into a single label whenever one of them changes, the city is
//! handed straight to its own label.

use heapless::String;

use crate::companion::TransportError;

/// Size of a field buffer on the companion side, terminator included
pub const FIELD_CAPACITY: usize = 80;

/// Maximum length of a stored field in bytes
pub const FIELD_LEN: usize = FIELD_CAPACITY - 1;

/// Maximum length of the combined weather label in bytes
pub const LABEL_LEN: usize = 2 * FIELD_LEN + 1;

/// Text of a single weather field
pub type FieldText = String<FIELD_LEN>;

/// Combined `temperature description` label
pub type RenderedLabel = String<LABEL_LEN>;

/// Temperature shown until the companion device delivers the first update
pub const CONNECTING: &str = "Connecting...";

/// Slot of the weather data a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WeatherField {
    Description,
    Temperature,
    City,
}

impl WeatherField {
    /// Dictionary key the companion device uses for this field
    pub const fn key(self) -> u32 {
        match self {
            WeatherField::Description => 0x0,
            WeatherField::Temperature => 0x1,
            WeatherField::City => 0x2,
        }
    }

    /// Look up the field for a dictionary key
    pub fn from_key(key: u32) -> Option<Self> {
        match key {
            0x0 => Some(WeatherField::Description),
            0x1 => Some(WeatherField::Temperature),
            0x2 => Some(WeatherField::City),
            _ => None,
        }
    }
}

/// Outcome of copying inbound text into a bounded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stored {
    Complete,
    Truncated,
}

/// Copy inbound bytes into `dst`, replacing its previous content.
///
/// Everything after the first NUL byte is ignored, invalid UTF-8 sequences
/// become U+FFFD and text that does not fit is cut at the last character
/// boundary that does.
pub fn store_text<const N: usize>(dst: &mut String<N>, bytes: &[u8]) -> Stored {
    dst.clear();

    let bytes = match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    };

    for chunk in bytes.utf8_chunks() {
        if push_truncated(dst, chunk.valid()) == Stored::Truncated {
            return Stored::Truncated;
        }
        if !chunk.invalid().is_empty() && dst.push(char::REPLACEMENT_CHARACTER).is_err() {
            return Stored::Truncated;
        }
    }

    Stored::Complete
}

fn push_truncated<const N: usize>(dst: &mut String<N>, text: &str) -> Stored {
    if dst.push_str(text).is_ok() {
        return Stored::Complete;
    }

    let mut end = N - dst.len();
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    // The prefix fits by construction
    let _ = dst.push_str(&text[..end]);

    Stored::Truncated
}

/// Latest weather description and temperature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherRecord {
    description: FieldText,
    temperature: FieldText,
}

impl WeatherRecord {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn temperature(&self) -> &str {
        &self.temperature
    }

    /// `temperature + " " + description`
    pub fn label(&self) -> RenderedLabel {
        let mut label = RenderedLabel::new();
        // Both fields are bounded by FIELD_LEN, so the label always fits
        let _ = label.push_str(&self.temperature);
        let _ = label.push(' ');
        let _ = label.push_str(&self.description);
        label
    }
}

/// What the display has to show after an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutput {
    /// New text for the weather label
    Weather(RenderedLabel),
    /// New text for the city label
    City(FieldText),
}

/// Weather state kept in sync with the companion device
#[derive(Debug, Clone)]
pub struct WeatherSyncState {
    record: WeatherRecord,
    transport_errors: u32,
}

impl Default for WeatherSyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherSyncState {
    /// Create the state with the placeholder shown before the first update
    pub fn new() -> Self {
        let mut temperature = FieldText::new();
        let _ = temperature.push_str(CONNECTING);

        Self {
            record: WeatherRecord {
                description: FieldText::new(),
                temperature,
            },
            transport_errors: 0,
        }
    }

    /// Store a value received for `field`.
    ///
    /// Description and temperature overwrite their slot and yield the new
    /// weather label. City values are not stored and yield the city label.
    pub fn apply_update(&mut self, field: WeatherField, value: &[u8]) -> SyncOutput {
        let (slot, stored) = match field {
            WeatherField::City => {
                let mut city = FieldText::new();
                if store_text(&mut city, value) == Stored::Truncated {
                    warn!("City truncated to {} bytes", FIELD_LEN);
                }
                debug!("City: {}", city.as_str());
                return SyncOutput::City(city);
            }
            WeatherField::Description => {
                let stored = store_text(&mut self.record.description, value);
                ("description", stored)
            }
            WeatherField::Temperature => {
                let stored = store_text(&mut self.record.temperature, value);
                ("temperature", stored)
            }
        };

        if stored == Stored::Truncated {
            warn!("Weather {} truncated to {} bytes", slot, FIELD_LEN);
        }

        let label = self.record.label();
        debug!("Weather label: {}", label.as_str());
        SyncOutput::Weather(label)
    }

    /// Record a failed delivery. The weather data stays as it was.
    pub fn apply_transport_error(&mut self, error: TransportError) {
        self.transport_errors = self.transport_errors.wrapping_add(1);
        error!("Weather sync error: {}", error);
    }

    /// Currently composed weather label
    pub fn label(&self) -> RenderedLabel {
        self.record.label()
    }

    pub fn record(&self) -> &WeatherRecord {
        &self.record
    }

    /// Number of failed deliveries since start
    pub fn transport_errors(&self) -> u32 {
        self.transport_errors
    }
}
