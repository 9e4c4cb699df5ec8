//! Positional tags and the recognized-key table.
//!
//! Tags carry key-value metadata alongside the sample stream. Each tag is
//! attached to an absolute sample offset. The key decides where the tag lands
//! in a SigMF metadata document:
//!
//! | Key                  | Class         | Destination                       |
//! |----------------------|---------------|-----------------------------------|
//! | `rx_time`            | Capture       | `captures[].core:datetime`        |
//! | `rx_freq`            | Capture       | `captures[].core:frequency`       |
//! | `rx_rate`            | SampleRate    | `global.core:sample_rate`         |
//! | `core:*` (table)     | Core          | `annotations[].<key>`             |
//! | `ns:name`            | Core          | `annotations[].<key>`             |
//! | anything else        | Unrecognized  | `annotations[].unknown:<key>`     |

use serde_json::Value;
use std::fmt;

/// Tag value. Closed set of the scalar types a recording can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Absolute time as (whole epoch seconds, fractional seconds)
    Time(i64, f64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(v) => write!(f, "{v}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v:.6}"),
            TagValue::String(v) => write!(f, "\"{v}\""),
            TagValue::Time(secs, frac) => write!(f, "({secs}, {frac})"),
        }
    }
}

impl TagValue {
    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TagValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as float. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TagValue::Float(v) => Some(*v),
            TagValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as a (seconds, fraction) time pair.
    ///
    /// A plain float is split into whole and fractional seconds.
    pub fn as_time(&self) -> Option<(i64, f64)> {
        match self {
            TagValue::Time(secs, frac) => Some((*secs, *frac)),
            TagValue::Float(v) if v.is_finite() => {
                let secs = v.floor();
                Some((secs as i64, v - secs))
            }
            TagValue::Int(v) => Some((*v, 0.0)),
            _ => None,
        }
    }

    /// JSON form stored in a metadata document.
    ///
    /// Times become a `[secs, frac]` array; non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            TagValue::Bool(v) => Value::Bool(*v),
            TagValue::Int(v) => Value::from(*v),
            TagValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TagValue::String(v) => Value::String(v.clone()),
            TagValue::Time(secs, frac) => Value::Array(vec![
                Value::from(*secs),
                serde_json::Number::from_f64(*frac)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            ]),
        }
    }

    /// Recover a tag value from a stored JSON value.
    ///
    /// Returns `None` for values outside the tag value set (null, objects,
    /// other arrays); those stay in the document untouched.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(TagValue::Bool(*v)),
            Value::Number(n) => n
                .as_i64()
                .map(TagValue::Int)
                .or_else(|| n.as_f64().map(TagValue::Float)),
            Value::String(s) => Some(TagValue::String(s.clone())),
            Value::Array(items) => match items.as_slice() {
                [Value::Number(secs), Value::Number(frac)] if secs.is_i64() && frac.is_f64() => {
                    Some(TagValue::Time(secs.as_i64()?, frac.as_f64()?))
                }
                _ => None,
            },
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::String(v)
    }
}

/// A single positional tag: key-value pair at a sample offset.
///
/// Offsets handed to a sink are relative to the start of the chunk being
/// written; offsets returned by a source are absolute stream positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalTag {
    /// Sample offset where the tag applies.
    pub offset: u64,
    /// Tag key (e.g., "rx_freq", "core:label").
    pub key: String,
    /// Tag value.
    pub value: TagValue,
}

impl PositionalTag {
    /// Create a new positional tag.
    pub fn new(offset: u64, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Self {
            offset,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for PositionalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}: {} = {}", self.offset, self.key, self.value)
    }
}

/// Well-known tag and document key constants.
pub mod keys {
    /// Absolute reception time (TagValue::Time).
    pub const RX_TIME: &str = "rx_time";
    /// Center frequency in Hz (TagValue::Float).
    pub const RX_FREQ: &str = "rx_freq";
    /// Sample rate in Hz (TagValue::Float).
    pub const RX_RATE: &str = "rx_rate";

    /// Structural offset key of captures and annotations.
    pub const SAMPLE_START: &str = "core:sample_start";
    /// Prefix given to keys outside the recognized table.
    pub const UNKNOWN_PREFIX: &str = "unknown:";
}

/// Capture record field a capture-class tag writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureField {
    /// `core:datetime`, from `rx_time`
    Datetime,
    /// `core:frequency`, from `rx_freq`
    Frequency,
}

/// Where a tag key is routed in the metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// Per-capture field.
    Capture(CaptureField),
    /// Recording-wide sample rate in the global section.
    SampleRate,
    /// Recognized key stored in an annotation unchanged.
    Core,
    /// Unrecognized key stored in an annotation as `unknown:<key>`.
    Unrecognized,
}

/// Explicit, versioned lookup table of recognized keys.
#[derive(Debug, Clone, Copy)]
pub struct KeyTable {
    /// Table version, tracks the SigMF core namespace revision
    pub version: &'static str,
    entries: &'static [(&'static str, KeyClass)],
}

impl KeyTable {
    /// SigMF core 1.0 keys plus the GNU Radio stream tags.
    pub const V1: KeyTable = KeyTable {
        version: "1.0.0",
        entries: &[
            (keys::RX_TIME, KeyClass::Capture(CaptureField::Datetime)),
            (keys::RX_FREQ, KeyClass::Capture(CaptureField::Frequency)),
            (keys::RX_RATE, KeyClass::SampleRate),
            ("core:sample_count", KeyClass::Core),
            ("core:generator", KeyClass::Core),
            ("core:label", KeyClass::Core),
            ("core:comment", KeyClass::Core),
            ("core:freq_lower_edge", KeyClass::Core),
            ("core:freq_upper_edge", KeyClass::Core),
            ("core:uuid", KeyClass::Core),
        ],
    };

    /// Classify a tag key.
    ///
    /// Keys missing from the table are still kept unchanged when they are
    /// already namespaced (`ns:name`); bare keys are unrecognized.
    pub fn classify(&self, key: &str) -> KeyClass {
        if let Some((_, class)) = self.entries.iter().find(|(k, _)| *k == key) {
            return *class;
        }
        if is_namespaced(key) {
            KeyClass::Core
        } else {
            KeyClass::Unrecognized
        }
    }

    /// Document key an annotation-class tag is stored under.
    pub fn document_key(&self, key: &str) -> String {
        match self.classify(key) {
            KeyClass::Unrecognized => format!("{}{}", keys::UNKNOWN_PREFIX, key),
            _ => key.to_string(),
        }
    }

    /// Tag key reconstructed from an annotation field key.
    pub fn tag_key<'a>(&self, document_key: &'a str) -> &'a str {
        document_key
            .strip_prefix(keys::UNKNOWN_PREFIX)
            .unwrap_or(document_key)
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        KeyTable::V1
    }
}

fn is_namespaced(key: &str) -> bool {
    match key.split_once(':') {
        Some((ns, name)) => !ns.is_empty() && !name.is_empty(),
        None => false,
    }
}
