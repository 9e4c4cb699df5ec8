//! SigMF metadata document.
//!
//! A recording's sidecar is a JSON document with three sections, always
//! written in this order:
//!
//! ```json
//! {
//!   "global": { "core:datatype": "cf32_le", "core:version": "1.0.0", "core:sample_rate": 1e8 },
//!   "captures": [ { "core:sample_start": 0, "core:frequency": 2.4e9,
//!                   "core:datetime": "2008-09-24T17:29:44.062500Z" } ],
//!   "annotations": [ { "core:sample_start": 1000, "test:a": 22.3125, "unknown:test_d": 18.125 } ]
//! }
//! ```
//!
//! Parsing is strict about structure: a missing section or a record without
//! `core:sample_start` is a [`SigMfError::Format`], never an empty document.
//! Unknown fields are kept verbatim.

use crate::error::{SigMfError, SigMfResult};
use crate::format::SampleFormat;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// SigMF specification version written into new documents.
pub const SIGMF_VERSION: &str = "1.0.0";

/// Extension of the raw sample file.
pub const DATA_EXTENSION: &str = "sigmf-data";

/// Extension of the metadata document.
pub const META_EXTENSION: &str = "sigmf-meta";

/// SigMF global metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigMfGlobal {
    /// Sample format of the data file
    #[serde(rename = "core:datatype")]
    pub datatype: SampleFormat,

    /// Version of SigMF spec
    #[serde(rename = "core:version", default = "default_version")]
    pub version: String,

    /// Sample rate in Hz
    #[serde(rename = "core:sample_rate", skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,

    /// Description (optional)
    #[serde(rename = "core:description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Author (optional)
    #[serde(rename = "core:author", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// License (optional)
    #[serde(rename = "core:license", skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Recording application (optional)
    #[serde(rename = "core:recorder", skip_serializing_if = "Option::is_none")]
    pub recorder: Option<String>,

    /// Hardware used (optional)
    #[serde(rename = "core:hw", skip_serializing_if = "Option::is_none")]
    pub hw: Option<String>,

    /// Additional extensions
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

fn default_version() -> String {
    SIGMF_VERSION.to_string()
}

impl SigMfGlobal {
    /// Global section for a new recording of the given format.
    pub fn new(datatype: SampleFormat) -> Self {
        Self {
            datatype,
            version: default_version(),
            sample_rate: None,
            description: None,
            author: None,
            license: None,
            recorder: None,
            hw: None,
            extensions: BTreeMap::new(),
        }
    }
}

/// Capture start time: whole epoch seconds plus fractional seconds.
///
/// Stored on disk as an ISO-8601 UTC string with nanosecond resolution, so
/// the fraction read back is the written one rounded to the nearest
/// nanosecond (`1/3` returns as `0.333333333`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureTime {
    /// Whole seconds since the Unix epoch
    pub secs: i64,
    /// Fractional second in [0, 1)
    pub frac: f64,
}

impl CaptureTime {
    pub fn new(secs: i64, frac: f64) -> Self {
        Self { secs, frac }
    }

    /// Convert to a UTC timestamp, rounding the fraction to nanoseconds.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.frac.is_finite() {
            return None;
        }
        let nanos = (self.frac * 1e9).round() as i64;
        let secs = self.secs.checked_add(nanos.div_euclid(1_000_000_000))?;
        let nanos = nanos.rem_euclid(1_000_000_000) as u32;
        DateTime::<Utc>::from_timestamp(secs, nanos)
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            secs: dt.timestamp(),
            frac: dt.timestamp_subsec_nanos() as f64 / 1e9,
        }
    }

    /// ISO-8601 form, e.g. `2008-09-24T17:29:44.062500Z`.
    pub fn to_iso8601(&self) -> Option<String> {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn parse_iso8601(s: &str) -> SigMfResult<Self> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| SigMfError::Format(format!("Invalid core:datetime '{}': {}", s, e)))?;
        Ok(Self::from_datetime(&dt.with_timezone(&Utc)))
    }
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_iso8601() {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "({}, {})", self.secs, self.frac),
        }
    }
}

impl Serialize for CaptureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.to_iso8601().ok_or_else(|| {
            serde::ser::Error::custom(format!(
                "capture time ({}, {}) is out of range",
                self.secs, self.frac
            ))
        })?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for CaptureTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CaptureTime::parse_iso8601(&s).map_err(serde::de::Error::custom)
    }
}

/// SigMF capture segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigMfCapture {
    /// Sample index where this capture starts
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,

    /// Center frequency in Hz
    #[serde(rename = "core:frequency", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,

    /// Date/time of capture start
    #[serde(rename = "core:datetime", skip_serializing_if = "Option::is_none")]
    pub datetime: Option<CaptureTime>,

    /// Additional fields
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl SigMfCapture {
    pub fn new(sample_start: u64) -> Self {
        Self {
            sample_start,
            frequency: None,
            datetime: None,
            extensions: BTreeMap::new(),
        }
    }
}

/// SigMF annotation: scalar fields attached to one sample offset.
///
/// Fields are kept in sorted-key order so repeated reads emit identical tag
/// sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigMfAnnotation {
    /// Sample index where annotation starts
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,

    /// All other fields, keyed by their document key
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl SigMfAnnotation {
    pub fn new(sample_start: u64) -> Self {
        Self {
            sample_start,
            fields: BTreeMap::new(),
        }
    }
}

/// Complete SigMF metadata structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigMfMeta {
    /// Global metadata
    pub global: SigMfGlobal,

    /// Capture segments, ascending `sample_start`
    pub captures: Vec<SigMfCapture>,

    /// Annotations, ascending `sample_start`
    pub annotations: Vec<SigMfAnnotation>,
}

impl SigMfMeta {
    /// Create an empty document for a recording of the given format.
    pub fn new(datatype: SampleFormat) -> Self {
        Self {
            global: SigMfGlobal::new(datatype),
            captures: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> SigMfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document, failing on malformed text or missing structure.
    pub fn from_json(text: &str) -> SigMfResult<Self> {
        let meta: SigMfMeta = serde_json::from_str(text)?;
        Ok(meta)
    }

    /// Read and parse a `.sigmf-meta` file.
    pub fn read_from(path: &Path) -> SigMfResult<Self> {
        let file = File::open(path).map_err(|e| {
            SigMfError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", path.display(), e),
            ))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            SigMfError::Format(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write the document to a `.sigmf-meta` file.
    ///
    /// The file is only touched once the whole document has serialized.
    pub fn write_to(&self, path: &Path) -> SigMfResult<()> {
        let mut text = self.to_json()?;
        text.push('\n');

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Stable-sort captures and annotations by `sample_start`.
    ///
    /// Documents from other writers are not guaranteed to be ordered.
    pub fn sort_by_offset(&mut self) {
        self.captures.sort_by_key(|c| c.sample_start);
        self.annotations.sort_by_key(|a| a.sample_start);
    }

    /// Capture starting exactly at `offset`.
    pub fn capture_at(&self, offset: u64) -> Option<&SigMfCapture> {
        let idx = self.captures.partition_point(|c| c.sample_start < offset);
        self.captures.get(idx).filter(|c| c.sample_start == offset)
    }

    /// Annotation starting exactly at `offset`.
    pub fn annotation_at(&self, offset: u64) -> Option<&SigMfAnnotation> {
        let idx = self.annotations.partition_point(|a| a.sample_start < offset);
        self.annotations.get(idx).filter(|a| a.sample_start == offset)
    }

    /// Capture at `offset`, inserted in order if absent.
    pub fn capture_entry(&mut self, offset: u64) -> &mut SigMfCapture {
        let idx = self.captures.partition_point(|c| c.sample_start < offset);
        if self.captures.get(idx).map_or(true, |c| c.sample_start != offset) {
            self.captures.insert(idx, SigMfCapture::new(offset));
        }
        &mut self.captures[idx]
    }

    /// Annotation at `offset`, inserted in order if absent.
    ///
    /// Several annotations may share an offset in foreign documents; the
    /// first one is returned.
    pub fn annotation_entry(&mut self, offset: u64) -> &mut SigMfAnnotation {
        let idx = self.annotations.partition_point(|a| a.sample_start < offset);
        if self.annotations.get(idx).map_or(true, |a| a.sample_start != offset) {
            self.annotations.insert(idx, SigMfAnnotation::new(offset));
        }
        &mut self.annotations[idx]
    }
}

/// The `.sigmf-data` / `.sigmf-meta` pair sharing one base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPaths {
    /// Base path (without extension)
    pub base: PathBuf,
    /// Raw sample file
    pub data: PathBuf,
    /// Metadata document
    pub meta: PathBuf,
}

impl RecordingPaths {
    /// Resolve the pair from a base name or either member of the pair.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let base = if path
            .extension()
            .map_or(false, |e| e == DATA_EXTENSION || e == META_EXTENSION)
        {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };

        Self {
            data: append_extension(&base, DATA_EXTENSION),
            meta: append_extension(&base, META_EXTENSION),
            base,
        }
    }
}

// `with_extension` would clobber dots already present in the base name.
fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_doc() -> SigMfMeta {
        let mut meta = SigMfMeta::new(SampleFormat::Cf32);
        meta.global.sample_rate = Some(100e6);
        meta.global.author = Some("R4W Tests".to_string());
        let cap = meta.capture_entry(0);
        cap.frequency = Some(2.4e9);
        cap.datetime = Some(CaptureTime::new(1222277384, 0.0625));
        meta.annotation_entry(1000)
            .fields
            .insert("test:a".to_string(), json!(22.3125));
        meta.annotation_entry(2000)
            .fields
            .insert("unknown:test_f".to_string(), json!(false));
        meta
    }

    #[test]
    fn test_section_order() {
        let text = sample_doc().to_json().unwrap();
        let g = text.find("\"global\"").unwrap();
        let c = text.find("\"captures\"").unwrap();
        let a = text.find("\"annotations\"").unwrap();
        assert!(g < c && c < a);
    }

    #[test]
    fn test_json_round_trip() {
        let meta = sample_doc();
        let parsed = SigMfMeta::from_json(&meta.to_json().unwrap()).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_field_names() {
        let parsed: Value = serde_json::from_str(&sample_doc().to_json().unwrap()).unwrap();
        assert_eq!(parsed["global"]["core:datatype"], "cf32_le");
        assert_eq!(parsed["global"]["core:version"], "1.0.0");
        assert_eq!(parsed["global"]["core:sample_rate"], 100e6);
        assert_eq!(parsed["captures"][0]["core:sample_start"], 0);
        assert_eq!(parsed["captures"][0]["core:frequency"], 2.4e9);
        assert_eq!(
            parsed["captures"][0]["core:datetime"],
            "2008-09-24T17:29:44.062500Z"
        );
        assert_eq!(parsed["annotations"][0]["core:sample_start"], 1000);
        assert_eq!(parsed["annotations"][0]["test:a"], 22.3125);
        assert_eq!(parsed["annotations"][1]["unknown:test_f"], false);
    }

    #[test]
    fn test_malformed_text_rejected() {
        assert!(matches!(
            SigMfMeta::from_json("{\"global\": "),
            Err(SigMfError::Format(_))
        ));
        assert!(matches!(SigMfMeta::from_json(""), Err(SigMfError::Format(_))));
    }

    #[test]
    fn test_missing_section_rejected() {
        let no_annotations = r#"{"global": {"core:datatype": "ri16_le"}, "captures": []}"#;
        assert!(matches!(
            SigMfMeta::from_json(no_annotations),
            Err(SigMfError::Format(_))
        ));

        let no_global = r#"{"captures": [], "annotations": []}"#;
        assert!(SigMfMeta::from_json(no_global).is_err());
    }

    #[test]
    fn test_missing_sample_start_rejected() {
        let capture = r#"{"global": {"core:datatype": "ri8"},
            "captures": [{"core:frequency": 1.0}], "annotations": []}"#;
        assert!(SigMfMeta::from_json(capture).is_err());

        let annotation = r#"{"global": {"core:datatype": "ri8"},
            "captures": [], "annotations": [{"core:label": "x"}]}"#;
        assert!(SigMfMeta::from_json(annotation).is_err());
    }

    #[test]
    fn test_unknown_datatype_rejected() {
        let text = r#"{"global": {"core:datatype": "cu8"}, "captures": [], "annotations": []}"#;
        assert!(matches!(SigMfMeta::from_json(text), Err(SigMfError::Format(_))));
    }

    #[test]
    fn test_opaque_fields_preserved() {
        let text = r#"{
            "global": {"core:datatype": "ri16_le", "core:version": "1.0.0", "vendor:gain": [1, 2]},
            "captures": [{"core:sample_start": 0, "vendor:antenna": {"port": "RX2"}}],
            "annotations": [{"core:sample_start": 5, "vendor:blob": {"a": [1, null]}, "core:label": "x"}]
        }"#;
        let meta = SigMfMeta::from_json(text).unwrap();
        assert_eq!(meta.global.extensions["vendor:gain"], json!([1, 2]));
        assert_eq!(meta.captures[0].extensions["vendor:antenna"], json!({"port": "RX2"}));
        assert_eq!(meta.annotations[0].fields["vendor:blob"], json!({"a": [1, null]}));

        let reparsed = SigMfMeta::from_json(&meta.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, meta);
    }

    #[test]
    fn test_entries_stay_sorted() {
        let mut meta = SigMfMeta::new(SampleFormat::Ri8);
        meta.annotation_entry(300);
        meta.annotation_entry(100);
        meta.annotation_entry(200);
        meta.annotation_entry(100);
        let starts: Vec<u64> = meta.annotations.iter().map(|a| a.sample_start).collect();
        assert_eq!(starts, vec![100, 200, 300]);

        meta.capture_entry(50);
        meta.capture_entry(0);
        assert_eq!(meta.captures[0].sample_start, 0);
        assert!(meta.capture_at(50).is_some());
        assert!(meta.capture_at(25).is_none());
        assert!(meta.annotation_at(200).is_some());
    }

    #[test]
    fn test_capture_time_iso8601() {
        let t = CaptureTime::new(1222277384, 0.0625);
        let s = t.to_iso8601().unwrap();
        assert_eq!(s, "2008-09-24T17:29:44.062500Z");
        assert_eq!(CaptureTime::parse_iso8601(&s).unwrap(), t);

        // Whole seconds
        let whole = CaptureTime::new(0, 0.0);
        assert_eq!(whole.to_iso8601().unwrap(), "1970-01-01T00:00:00Z");

        // Fraction rounding up carries into the seconds
        let carry = CaptureTime::new(10, 0.9999999999);
        assert_eq!(CaptureTime::parse_iso8601(&carry.to_iso8601().unwrap()).unwrap(), CaptureTime::new(11, 0.0));

        assert!(CaptureTime::parse_iso8601("yesterday").is_err());
    }

    #[test]
    fn test_capture_time_nanosecond_resolution() {
        let third = CaptureTime::new(1222277384, 1.0 / 3.0);
        let back = CaptureTime::parse_iso8601(&third.to_iso8601().unwrap()).unwrap();
        assert_eq!(back.secs, 1222277384);
        assert_eq!(back.frac, 0.333333333);
        assert!((back.frac - third.frac).abs() <= 0.5e-9);

        assert!(CaptureTime::new(5, f64::NAN).to_datetime().is_none());
        assert!(CaptureTime::new(i64::MAX / 2, 0.0).to_datetime().is_none());
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keep.sigmf-meta");
        let good = sample_doc();
        good.write_to(&path).unwrap();

        let mut bad = sample_doc();
        bad.capture_entry(0).datetime = Some(CaptureTime::new(5, f64::NAN));
        assert!(matches!(bad.write_to(&path), Err(SigMfError::Format(_))));
        assert_eq!(SigMfMeta::read_from(&path).unwrap(), good);
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.sigmf-meta");
        let meta = sample_doc();
        meta.write_to(&path).unwrap();
        assert_eq!(SigMfMeta::read_from(&path).unwrap(), meta);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(SigMfMeta::read_from(&path), Err(SigMfError::Format(_))));

        let missing = temp_dir.path().join("missing.sigmf-meta");
        assert!(matches!(SigMfMeta::read_from(&missing), Err(SigMfError::Io(_))));
    }

    #[test]
    fn test_recording_paths() {
        let p = RecordingPaths::new("/tmp/abc");
        assert_eq!(p.data, PathBuf::from("/tmp/abc.sigmf-data"));
        assert_eq!(p.meta, PathBuf::from("/tmp/abc.sigmf-meta"));

        let p = RecordingPaths::new("/tmp/abc.sigmf-data");
        assert_eq!(p.base, PathBuf::from("/tmp/abc"));
        assert_eq!(p.meta, PathBuf::from("/tmp/abc.sigmf-meta"));

        let p = RecordingPaths::new("/tmp/run.01.sigmf-meta");
        assert_eq!(p.data, PathBuf::from("/tmp/run.01.sigmf-data"));
    }
}
