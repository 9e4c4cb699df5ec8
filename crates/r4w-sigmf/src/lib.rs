//! # SigMF Recording Codec
//!
//! Records a tagged sample stream as a SigMF pair and plays it back.
//!
//! ## Overview
//!
//! A recording is two files sharing a base name:
//!
//! - `<base>.sigmf-data`: raw, headerless little-endian samples
//! - `<base>.sigmf-meta`: JSON metadata with `global`, `captures` and
//!   `annotations` sections
//!
//! Positional tags travel with the samples. On the way in they are folded
//! into the metadata document; on the way out they are rebuilt at the same
//! sample offsets, however the stream is chunked.
//!
//! ```text
//! samples + tags → RecordingSink → (.sigmf-data, .sigmf-meta) → RecordingSource → samples + tags
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use r4w_sigmf::prelude::*;
//!
//! # fn main() -> SigMfResult<()> {
//! let mut sink = RecordingSink::create(
//!     "capture",
//!     SinkConfig::new(SampleFormat::Cf32).with_sample_rate(1e6),
//! )?;
//! let samples = vec![Complex64::new(0.5, -0.5); 1024];
//! sink.write_complex(&samples, &[PositionalTag::new(0, "rx_freq", 915e6)])?;
//! sink.close()?;
//!
//! // Replay as 16-bit integers
//! let mut source = RecordingSource::open("capture", SourceConfig::new(SampleFormat::Ci16))?;
//! loop {
//!     let chunk = source.read(4096)?;
//!     if chunk.end_of_stream {
//!         break;
//!     }
//!     for tag in &chunk.tags {
//!         println!("{tag}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod meta;
pub mod observe;
pub mod sink;
pub mod source;
pub mod tags;
pub mod translate;

pub use config::{GlobalOverrides, SigMfConfig, SinkConfig, SourceConfig};
pub use error::{SigMfError, SigMfResult};
pub use format::{convert, SampleFormat};
pub use meta::{CaptureTime, RecordingPaths, SigMfAnnotation, SigMfCapture, SigMfGlobal, SigMfMeta};
pub use sink::{RecordingSink, SinkState};
pub use source::{RecordingSource, SourceChunk, SourceState};
pub use tags::{KeyClass, KeyTable, PositionalTag, TagValue};
pub use translate::TagTranslator;

/// Common imports.
pub mod prelude {
    pub use crate::config::{SinkConfig, SourceConfig};
    pub use crate::error::{SigMfError, SigMfResult};
    pub use crate::format::SampleFormat;
    pub use crate::sink::RecordingSink;
    pub use crate::source::{RecordingSource, SourceChunk};
    pub use crate::tags::{PositionalTag, TagValue};
    pub use num_complex::Complex64;
}
