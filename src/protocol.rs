//! Line protocol spoken by the glove bridge process
//!
//! The bridge writes one record per line on stdout:
//!
//! ```text
//! <gesture_id>,<sensor_0>,<sensor_1>,...,<sensor_17>
//! ```
//!
//! Fields are comma separated with no escaping. The gesture id is a signed
//! integer (`-1` when no gesture is recognised) and every sensor value is a
//! scaled reading, nominally in `[0.0, 1.0]`. The range is not enforced here.

use std::fmt;
use std::fmt::Write as _;

use thiserror::Error;

/// Number of sensor channels reported by the glove
pub const CHANNEL_COUNT: usize = 18;

/// Fields per line: the gesture id followed by one value per channel
pub const FIELD_COUNT: usize = CHANNEL_COUNT + 1;

/// Channel names, in wire order
pub const SENSOR_NAMES: [&str; CHANNEL_COUNT] = [
    "Thumb Near",
    "Thumb Far",
    "Thumb/Index",
    "Index Near",
    "Index Far",
    "Index/Middle",
    "Middle Near",
    "Middle Far",
    "Middle/Ring",
    "Ring Near",
    "Ring Far",
    "Ring/Little",
    "Little Near",
    "Little Far",
    "Thumb Palm",
    "Wrist Bend",
    "Roll",
    "Pitch",
];

/// Gesture classification reported by the glove firmware
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GestureId(pub i32);

impl GestureId {
    /// The firmware's "no gesture recognised" value
    pub const NONE: GestureId = GestureId(-1);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for GestureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One scaled value per channel. Lower means more open.
pub type SensorReading = [f64; CHANNEL_COUNT];

/// A fully decoded line
#[derive(Clone, Debug, PartialEq)]
pub struct GestureRecord {
    pub gesture: GestureId,
    pub reading: SensorReading,
}

/// Why a line was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("gesture id {field:?} is not an integer")]
    GestureId { field: String },

    #[error("value {field:?} for channel {channel} is not a number")]
    SensorValue { channel: usize, field: String },

    #[error("value for channel {channel} is not finite")]
    NonFinite { channel: usize },
}

/// Decode a single line into a record.
pub fn decode_line(line: &str) -> Result<GestureRecord, DecodeError> {
    let line = line.trim();
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let gesture_field = fields[0].trim();
    let gesture = gesture_field
        .parse::<i32>()
        .map(GestureId)
        .map_err(|_| DecodeError::GestureId {
            field: gesture_field.to_string(),
        })?;

    let mut reading = [0.0f64; CHANNEL_COUNT];
    for (channel, field) in fields[1..].iter().enumerate() {
        let field = field.trim();
        let value: f64 = field.parse().map_err(|_| DecodeError::SensorValue {
            channel,
            field: field.to_string(),
        })?;
        if !value.is_finite() {
            return Err(DecodeError::NonFinite { channel });
        }
        reading[channel] = value;
    }

    Ok(GestureRecord { gesture, reading })
}

/// Decode a line, logging and discarding it if malformed.
///
/// This is what the poll loop calls: a bad line costs one warning and
/// nothing else.
pub fn parse_line(line: &str) -> Option<GestureRecord> {
    match decode_line(line) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Dropping malformed line ({}): {:?}", e, line);
            None
        }
    }
}

/// Format a record the way the bridge prints it (`%d` then `,%.3f` per value).
pub fn encode_record(record: &GestureRecord) -> String {
    let mut line = record.gesture.to_string();
    for value in &record.reading {
        // Writing to a String cannot fail
        let _ = write!(line, ",{:.3}", value);
    }
    line
}
