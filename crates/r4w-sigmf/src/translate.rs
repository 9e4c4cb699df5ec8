//! Translation between positional tags and metadata document entries.
//!
//! Writing, [`TagTranslator::absorb`] routes each tag by its [`KeyClass`]:
//! capture tags merge into the capture record at their offset, `rx_rate`
//! lands in the global section, and everything else merges into the
//! annotation record at that offset.
//!
//! Reading, [`TagTranslator::emit_range`] rebuilds tags for the records whose
//! `sample_start` falls in a window. Within one offset the order is fixed:
//! `rx_rate`, then `rx_time`/`rx_freq`, then annotation fields in key order.
//! Any split of a stream into consecutive windows therefore yields the same
//! tag sequence.

use crate::error::{SigMfError, SigMfResult};
use crate::meta::{CaptureTime, SigMfMeta};
use crate::tags::{keys, CaptureField, KeyClass, KeyTable, PositionalTag, TagValue};
use std::ops::Range;

/// Bidirectional tag <-> document mapper.
#[derive(Debug, Clone, Default)]
pub struct TagTranslator {
    table: KeyTable,
    /// Highest offset absorbed so far
    last_offset: Option<u64>,
}

impl TagTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translator using a specific key table.
    pub fn with_table(table: KeyTable) -> Self {
        Self {
            table,
            last_offset: None,
        }
    }

    pub fn table(&self) -> &KeyTable {
        &self.table
    }

    /// Fold one tag, at an absolute offset, into the document.
    ///
    /// Offsets must be non-decreasing across calls.
    pub fn absorb(&mut self, tag: &PositionalTag, doc: &mut SigMfMeta) -> SigMfResult<()> {
        if let Some(last) = self.last_offset {
            if tag.offset < last {
                return Err(SigMfError::Range(format!(
                    "tag '{}' at offset {} arrived after offset {}",
                    tag.key, tag.offset, last
                )));
            }
        }

        match self.table.classify(&tag.key) {
            KeyClass::Capture(CaptureField::Datetime) => {
                let (secs, frac) = time(tag)?;
                doc.capture_entry(tag.offset).datetime = Some(CaptureTime::new(secs, frac));
            }
            KeyClass::Capture(CaptureField::Frequency) => {
                let freq = numeric(tag)?;
                doc.capture_entry(tag.offset).frequency = Some(freq);
            }
            KeyClass::SampleRate => {
                doc.global.sample_rate = Some(numeric(tag)?);
            }
            KeyClass::Core | KeyClass::Unrecognized => {
                reserved(tag)?;
                finite(tag)?;
                let key = self.table.document_key(&tag.key);
                doc.annotation_entry(tag.offset)
                    .fields
                    .insert(key, tag.value.to_json());
            }
        }

        self.last_offset = Some(tag.offset);
        tracing::trace!(offset = tag.offset, key = %tag.key, "absorbed tag");
        Ok(())
    }

    /// Validate a tag's key and value without touching any document.
    pub fn check(&self, tag: &PositionalTag) -> SigMfResult<()> {
        match self.table.classify(&tag.key) {
            KeyClass::Capture(CaptureField::Datetime) => time(tag).map(|_| ()),
            KeyClass::Capture(CaptureField::Frequency) | KeyClass::SampleRate => {
                numeric(tag).map(|_| ())
            }
            KeyClass::Core | KeyClass::Unrecognized => {
                reserved(tag)?;
                finite(tag)
            }
        }
    }

    /// Every tag the document describes, in offset order.
    pub fn emit(&self, doc: &SigMfMeta) -> Vec<PositionalTag> {
        self.emit_range(doc, 0..u64::MAX)
    }

    /// Tags for records with `sample_start` in `range`.
    ///
    /// The document's captures and annotations must be sorted by offset, as
    /// produced by a sink or by [`SigMfMeta::sort_by_offset`].
    pub fn emit_range(&self, doc: &SigMfMeta, range: Range<u64>) -> Vec<PositionalTag> {
        let mut tags = Vec::new();
        if range.is_empty() {
            return tags;
        }

        if range.contains(&0) {
            if let Some(rate) = doc.global.sample_rate {
                tags.push(PositionalTag::new(0, keys::RX_RATE, rate));
            }
        }

        let first = doc.captures.partition_point(|c| c.sample_start < range.start);
        for capture in doc.captures[first..]
            .iter()
            .take_while(|c| c.sample_start < range.end)
        {
            if let Some(time) = capture.datetime {
                tags.push(PositionalTag::new(
                    capture.sample_start,
                    keys::RX_TIME,
                    TagValue::Time(time.secs, time.frac),
                ));
            }
            if let Some(freq) = capture.frequency {
                tags.push(PositionalTag::new(capture.sample_start, keys::RX_FREQ, freq));
            }
        }

        let first = doc.annotations.partition_point(|a| a.sample_start < range.start);
        for annotation in doc.annotations[first..]
            .iter()
            .take_while(|a| a.sample_start < range.end)
        {
            for (key, value) in &annotation.fields {
                match TagValue::from_json(value) {
                    Some(value) => tags.push(PositionalTag {
                        offset: annotation.sample_start,
                        key: self.table.tag_key(key).to_string(),
                        value,
                    }),
                    None => tracing::trace!(
                        offset = annotation.sample_start,
                        key = %key,
                        "annotation field has no tag representation"
                    ),
                }
            }
        }

        // Stable: keeps rate < capture < annotation order within an offset
        tags.sort_by_key(|t| t.offset);
        tags
    }
}

// Capture times must survive the ISO-8601 round trip through the document.
fn time(tag: &PositionalTag) -> SigMfResult<(i64, f64)> {
    let (secs, frac) = tag.value.as_time().ok_or_else(|| {
        SigMfError::Format(format!("{} expects a time value, got {}", tag.key, tag.value))
    })?;
    if CaptureTime::new(secs, frac).to_datetime().is_none() {
        return Err(SigMfError::Format(format!(
            "{} value {} is not a representable timestamp",
            tag.key, tag.value
        )));
    }
    Ok((secs, frac))
}

// JSON has no NaN or infinity; such values would come back as null.
fn finite(tag: &PositionalTag) -> SigMfResult<()> {
    let ok = match tag.value {
        TagValue::Float(v) => v.is_finite(),
        TagValue::Time(_, frac) => frac.is_finite(),
        _ => true,
    };
    if !ok {
        return Err(SigMfError::Format(format!(
            "{} value {} is not finite",
            tag.key, tag.value
        )));
    }
    Ok(())
}

fn reserved(tag: &PositionalTag) -> SigMfResult<()> {
    if tag.key == keys::SAMPLE_START {
        return Err(SigMfError::Format(format!(
            "{} is reserved and cannot be used as a tag key",
            keys::SAMPLE_START
        )));
    }
    Ok(())
}

fn numeric(tag: &PositionalTag) -> SigMfResult<f64> {
    tag.value
        .as_float()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            SigMfError::Format(format!(
                "{} expects a finite numeric value, got {}",
                tag.key, tag.value
            ))
        })
}
