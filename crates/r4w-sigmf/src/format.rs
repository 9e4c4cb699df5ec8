//! SigMF sample formats and the sample codec.
//!
//! Every recording stores headerless little-endian samples in one of eight
//! SigMF datatypes. This module maps between those wire bytes and normalized
//! values in [-1.0, 1.0].
//!
//! # Supported Formats
//!
//! | Format | Bytes/Sample | SigMF Type | Full Scale  |
//! |--------|--------------|------------|-------------|
//! | Rf32   | 4            | rf32_le    | 1.0         |
//! | Ri32   | 4            | ri32_le    | 2147483647  |
//! | Ri16   | 2            | ri16_le    | 32767       |
//! | Ri8    | 1            | ri8        | 127         |
//! | Cf32   | 8            | cf32_le    | 1.0         |
//! | Ci32   | 8            | ci32_le    | 2147483647  |
//! | Ci16   | 4            | ci16_le    | 32767       |
//! | Ci8    | 2            | ci8        | 127         |
//!
//! # Scaling Conventions
//!
//! - Decode: integer components are divided by the format's full scale.
//! - Encode: normalized values are multiplied by the full scale, rounded half
//!   away from zero, and saturated to the integer range.
//! - Complex formats apply the same rule to interleaved I and Q components.
//!
//! # Example
//!
//! ```rust
//! use r4w_sigmf::format::{convert, SampleFormat};
//!
//! let bytes = SampleFormat::Rf32.encode(&[0.5, -0.25]);
//! let ints = convert(&bytes, SampleFormat::Rf32, SampleFormat::Ri16);
//! assert_eq!(SampleFormat::Ri16.decode(&ints), vec![16384.0 / 32767.0, -8192.0 / 32767.0]);
//! ```

use crate::error::SigMfError;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// SigMF sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SampleFormat {
    /// Real float32 (SigMF "rf32_le")
    Rf32,
    /// Real signed int32 (SigMF "ri32_le")
    Ri32,
    /// Real signed int16 (SigMF "ri16_le")
    Ri16,
    /// Real signed int8 (SigMF "ri8")
    Ri8,
    /// Complex float32 (SigMF "cf32_le"), GNU Radio gr_complex layout
    #[default]
    Cf32,
    /// Complex signed int32 (SigMF "ci32_le")
    Ci32,
    /// Complex signed int16 (SigMF "ci16_le")
    Ci16,
    /// Complex signed int8 (SigMF "ci8")
    Ci8,
}

impl SampleFormat {
    /// Returns all supported format variants.
    pub const fn all() -> &'static [SampleFormat] {
        &[
            SampleFormat::Rf32,
            SampleFormat::Ri32,
            SampleFormat::Ri16,
            SampleFormat::Ri8,
            SampleFormat::Cf32,
            SampleFormat::Ci32,
            SampleFormat::Ci16,
            SampleFormat::Ci8,
        ]
    }

    /// True for the interleaved I/Q formats.
    #[inline]
    pub const fn is_complex(&self) -> bool {
        matches!(
            self,
            SampleFormat::Cf32 | SampleFormat::Ci32 | SampleFormat::Ci16 | SampleFormat::Ci8
        )
    }

    /// True for the float formats (already normalized).
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, SampleFormat::Rf32 | SampleFormat::Cf32)
    }

    /// Number of scalar components per sample (1 real, 2 complex).
    #[inline]
    pub const fn components(&self) -> usize {
        if self.is_complex() {
            2
        } else {
            1
        }
    }

    /// Size of one scalar component in bytes.
    #[inline]
    pub const fn component_bytes(&self) -> usize {
        match self {
            SampleFormat::Rf32 | SampleFormat::Cf32 => 4,
            SampleFormat::Ri32 | SampleFormat::Ci32 => 4,
            SampleFormat::Ri16 | SampleFormat::Ci16 => 2,
            SampleFormat::Ri8 | SampleFormat::Ci8 => 1,
        }
    }

    /// Returns the size of one sample in bytes (both components for complex).
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        self.component_bytes() * self.components()
    }

    /// Integer magnitude corresponding to a normalized 1.0.
    #[inline]
    pub const fn full_scale(&self) -> f64 {
        match self {
            SampleFormat::Rf32 | SampleFormat::Cf32 => 1.0,
            SampleFormat::Ri32 | SampleFormat::Ci32 => 2_147_483_647.0,
            SampleFormat::Ri16 | SampleFormat::Ci16 => 32_767.0,
            SampleFormat::Ri8 | SampleFormat::Ci8 => 127.0,
        }
    }

    /// Returns the SigMF datatype string for this format.
    pub const fn sigmf_datatype(&self) -> &'static str {
        match self {
            SampleFormat::Rf32 => "rf32_le",
            SampleFormat::Ri32 => "ri32_le",
            SampleFormat::Ri16 => "ri16_le",
            SampleFormat::Ri8 => "ri8",
            SampleFormat::Cf32 => "cf32_le",
            SampleFormat::Ci32 => "ci32_le",
            SampleFormat::Ci16 => "ci16_le",
            SampleFormat::Ci8 => "ci8",
        }
    }

    /// Parse a SigMF datatype string. The `_le` suffix is optional.
    pub fn from_sigmf_datatype(s: &str) -> Option<Self> {
        match s.trim() {
            "rf32_le" | "rf32" => Some(SampleFormat::Rf32),
            "ri32_le" | "ri32" => Some(SampleFormat::Ri32),
            "ri16_le" | "ri16" => Some(SampleFormat::Ri16),
            "ri8" | "ri8_le" => Some(SampleFormat::Ri8),
            "cf32_le" | "cf32" => Some(SampleFormat::Cf32),
            "ci32_le" | "ci32" => Some(SampleFormat::Ci32),
            "ci16_le" | "ci16" => Some(SampleFormat::Ci16),
            "ci8" | "ci8_le" => Some(SampleFormat::Ci8),
            _ => None,
        }
    }

    /// Whether samples of this format can be re-encoded as `other`.
    ///
    /// Real and complex layouts differ in component count, so only
    /// conversions within the same family are accepted by a source.
    pub const fn can_convert_to(&self, other: SampleFormat) -> bool {
        self.is_complex() == other.is_complex()
    }

    /// Decode one little-endian component to a normalized value.
    ///
    /// Only reached through `chunks_exact(self.component_bytes())`, so
    /// `bytes` always holds a whole component.
    #[inline]
    pub(crate) fn decode_component(&self, bytes: &[u8]) -> f64 {
        match self {
            SampleFormat::Rf32 | SampleFormat::Cf32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            SampleFormat::Ri32 | SampleFormat::Ci32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
                    / self.full_scale()
            }
            SampleFormat::Ri16 | SampleFormat::Ci16 => {
                i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / self.full_scale()
            }
            SampleFormat::Ri8 | SampleFormat::Ci8 => bytes[0] as i8 as f64 / self.full_scale(),
        }
    }

    /// Encode one normalized value, appending its little-endian bytes.
    ///
    /// Integer formats round half away from zero and saturate; NaN maps to 0.
    #[inline]
    pub fn encode_component(&self, value: f64, out: &mut Vec<u8>) {
        match self {
            SampleFormat::Rf32 | SampleFormat::Cf32 => {
                out.extend_from_slice(&(value as f32).to_le_bytes());
            }
            SampleFormat::Ri32 | SampleFormat::Ci32 => {
                let v = (value * self.full_scale())
                    .round()
                    .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                out.extend_from_slice(&v.to_le_bytes());
            }
            SampleFormat::Ri16 | SampleFormat::Ci16 => {
                let v = (value * self.full_scale())
                    .round()
                    .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                out.extend_from_slice(&v.to_le_bytes());
            }
            SampleFormat::Ri8 | SampleFormat::Ci8 => {
                let v = (value * self.full_scale())
                    .round()
                    .clamp(i8::MIN as f64, i8::MAX as f64) as i8;
                out.push(v as u8);
            }
        }
    }

    /// Decode raw bytes into normalized components.
    ///
    /// Complex formats yield interleaved I, Q values. Trailing bytes that do
    /// not form a whole component are ignored.
    pub fn decode(&self, data: &[u8]) -> Vec<f64> {
        data.chunks_exact(self.component_bytes())
            .map(|c| self.decode_component(c))
            .collect()
    }

    /// Encode normalized components into raw bytes.
    pub fn encode(&self, values: &[f64]) -> Vec<u8> {
        let mut data = Vec::with_capacity(values.len() * self.component_bytes());
        for &v in values {
            self.encode_component(v, &mut data);
        }
        data
    }

    /// Decode raw bytes of a complex format into I/Q samples.
    ///
    /// Real formats produce samples with a zero imaginary part.
    pub fn decode_complex(&self, data: &[u8]) -> Vec<Complex64> {
        let values = self.decode(data);
        if self.is_complex() {
            values
                .chunks_exact(2)
                .map(|iq| Complex64::new(iq[0], iq[1]))
                .collect()
        } else {
            values.into_iter().map(|re| Complex64::new(re, 0.0)).collect()
        }
    }

    /// Encode I/Q samples. Real formats keep only the real part.
    pub fn encode_complex(&self, samples: &[Complex64]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * self.bytes_per_sample());
        for s in samples {
            self.encode_component(s.re, &mut data);
            if self.is_complex() {
                self.encode_component(s.im, &mut data);
            }
        }
        data
    }
}

/// Re-encode raw samples from one format to another.
///
/// Same-format conversion returns the input bytes unchanged; otherwise every
/// component is decoded and re-encoded independently.
pub fn convert(data: &[u8], from: SampleFormat, to: SampleFormat) -> Vec<u8> {
    if from == to {
        return data.to_vec();
    }

    let count = data.len() / from.component_bytes();
    let mut out = Vec::with_capacity(count * to.component_bytes());
    for component in data.chunks_exact(from.component_bytes()) {
        to.encode_component(from.decode_component(component), &mut out);
    }
    out
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sigmf_datatype())
    }
}

impl std::str::FromStr for SampleFormat {
    type Err = SigMfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleFormat::from_sigmf_datatype(s).ok_or_else(|| {
            SigMfError::Format(format!(
                "Unknown SigMF datatype '{}'. Valid datatypes: rf32_le, ri32_le, ri16_le, ri8, cf32_le, ci32_le, ci16_le, ci8",
                s
            ))
        })
    }
}

impl TryFrom<String> for SampleFormat {
    type Error = SigMfError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SampleFormat> for String {
    fn from(f: SampleFormat) -> Self {
        f.sigmf_datatype().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolution of one component near full scale.
    fn lsb(format: SampleFormat) -> f64 {
        if format.is_float() {
            // 24-bit mantissa
            1.0 / (1u64 << 23) as f64
        } else {
            1.0 / format.full_scale()
        }
    }

    fn cosine(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 32.0).cos())
            .collect()
    }

    #[test]
    fn test_bytes_per_sample() {
        assert_eq!(SampleFormat::Rf32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::Ri32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::Ri16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::Ri8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::Cf32.bytes_per_sample(), 8);
        assert_eq!(SampleFormat::Ci32.bytes_per_sample(), 8);
        assert_eq!(SampleFormat::Ci16.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::Ci8.bytes_per_sample(), 2);
    }

    #[test]
    fn test_datatype_strings() {
        for format in SampleFormat::all() {
            let parsed = SampleFormat::from_sigmf_datatype(format.sigmf_datatype());
            assert_eq!(parsed, Some(*format));
        }
        assert_eq!(SampleFormat::from_sigmf_datatype("rf32"), Some(SampleFormat::Rf32));
        assert_eq!(SampleFormat::from_sigmf_datatype("ci16"), Some(SampleFormat::Ci16));
        assert_eq!(SampleFormat::from_sigmf_datatype("cu8"), None);
        assert_eq!(SampleFormat::from_sigmf_datatype(""), None);
    }

    #[test]
    fn test_from_str_trait() {
        let fmt: SampleFormat = "ri16".parse().unwrap();
        assert_eq!(fmt, SampleFormat::Ri16);

        let result: Result<SampleFormat, _> = "cf64_le".parse();
        assert!(matches!(result, Err(SigMfError::Format(_))));
    }

    #[test]
    fn test_serde_as_datatype_string() {
        let json = serde_json::to_string(&SampleFormat::Ci8).unwrap();
        assert_eq!(json, "\"ci8\"");
        let back: SampleFormat = serde_json::from_str("\"ri32_le\"").unwrap();
        assert_eq!(back, SampleFormat::Ri32);
        assert!(serde_json::from_str::<SampleFormat>("\"bogus\"").is_err());
    }

    #[test]
    fn test_full_scale_decode() {
        assert_eq!(SampleFormat::Ri32.decode(&i32::MAX.to_le_bytes()), vec![1.0]);
        assert_eq!(SampleFormat::Ri16.decode(&32767i16.to_le_bytes()), vec![1.0]);
        assert_eq!(SampleFormat::Ri8.decode(&[127u8]), vec![1.0]);
        assert_eq!(SampleFormat::Ri8.decode(&[0x81u8]), vec![-1.0]);
    }

    #[test]
    fn test_encode_rounds_and_saturates() {
        // 0.5 * 127 = 63.5 rounds away from zero
        assert_eq!(SampleFormat::Ri8.encode(&[0.5]), vec![64u8]);
        assert_eq!(SampleFormat::Ri8.encode(&[-0.5]), vec![(-64i8) as u8]);

        // Out-of-range values saturate instead of wrapping
        assert_eq!(SampleFormat::Ri16.encode(&[2.0]), 32767i16.to_le_bytes().to_vec());
        assert_eq!(SampleFormat::Ri16.encode(&[-3.0]), i16::MIN.to_le_bytes().to_vec());
        assert_eq!(SampleFormat::Ri32.encode(&[5.0]), i32::MAX.to_le_bytes().to_vec());
        assert_eq!(SampleFormat::Ri8.encode(&[f64::NAN]), vec![0u8]);
    }

    #[test]
    fn test_same_format_is_identity() {
        // Bit patterns that would not survive a decode/encode pass
        let odd_floats: Vec<u8> = [f32::NAN, -0.0f32, 3.5f32, f32::MIN_POSITIVE]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        for format in SampleFormat::all() {
            let data: Vec<u8> = if format.is_float() {
                odd_floats.clone()
            } else {
                (0u8..=255).collect()
            };
            assert_eq!(convert(&data, *format, *format), data, "format {}", format);
        }
    }

    #[test]
    fn test_pairwise_conversion_tolerance() {
        let original = cosine(256);

        for from in SampleFormat::all() {
            for to in SampleFormat::all() {
                if !from.can_convert_to(*to) {
                    continue;
                }
                let stored = from.encode(&original);
                let converted = convert(&stored, *from, *to);
                assert_eq!(
                    converted.len() / to.component_bytes(),
                    original.len(),
                    "{} -> {}",
                    from,
                    to
                );

                let lsb = lsb(*from).max(lsb(*to));
                let decoded = to.decode(&converted);
                for (i, (a, b)) in original.iter().zip(decoded.iter()).enumerate() {
                    assert!(
                        (a - b).abs() <= lsb,
                        "{} -> {} at {}: {} vs {}",
                        from,
                        to,
                        i,
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_int32_round_trip_precision() {
        let original = cosine(64);
        let decoded = SampleFormat::Ri32.decode(&SampleFormat::Ri32.encode(&original));
        for (a, b) in original.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 1.0 / 2_147_483_648.0);
        }
    }

    #[test]
    fn test_complex_helpers() {
        let samples = vec![Complex64::new(0.5, -0.5), Complex64::new(1.0, 0.0)];
        for format in [SampleFormat::Cf32, SampleFormat::Ci16, SampleFormat::Ci8] {
            let bytes = format.encode_complex(&samples);
            assert_eq!(bytes.len(), samples.len() * format.bytes_per_sample());
            let decoded = format.decode_complex(&bytes);
            for (a, b) in samples.iter().zip(decoded.iter()) {
                assert!((a.re - b.re).abs() < 0.01, "{}: {} vs {}", format, a.re, b.re);
                assert!((a.im - b.im).abs() < 0.01, "{}: {} vs {}", format, a.im, b.im);
            }
        }

        let real = SampleFormat::Ri16.encode_complex(&samples);
        assert_eq!(real.len(), 4);
    }

    #[test]
    fn test_partial_component_ignored() {
        let mut bytes = SampleFormat::Ri16.encode(&[0.25]);
        bytes.push(0x7f);
        assert_eq!(SampleFormat::Ri16.decode(&bytes).len(), 1);
        assert_eq!(convert(&bytes, SampleFormat::Ri16, SampleFormat::Rf32).len(), 4);
    }

    #[test]
    fn test_short_input_is_total() {
        for &format in SampleFormat::all() {
            let short = vec![0x11u8; format.component_bytes() - 1];
            assert!(format.decode(&short).is_empty(), "{format}");
            assert!(format.decode_complex(&short).is_empty(), "{format}");
            for &to in SampleFormat::all() {
                assert!(convert(&short, format, to).is_empty() || format == to);
            }
        }
    }

    #[test]
    fn test_default_and_display() {
        assert_eq!(SampleFormat::default(), SampleFormat::Cf32);
        assert_eq!(format!("{}", SampleFormat::Ri8), "ri8");
        assert_eq!(format!("{}", SampleFormat::Ci32), "ci32_le");
    }
}
