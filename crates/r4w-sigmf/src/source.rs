//! Streaming SigMF playback.
//!
//! A [`RecordingSource`] parses the metadata document once at open, then
//! replays the data file in caller-sized chunks. Samples are converted to the
//! requested output format on the fly and every chunk carries the tags whose
//! `sample_start` falls inside it, so the tag stream does not depend on how
//! the caller chunks its reads.

use crate::config::SourceConfig;
use crate::error::{SigMfError, SigMfResult};
use crate::format::{convert, SampleFormat};
use crate::meta::{RecordingPaths, SigMfMeta};
use crate::observe::diag;
use crate::tags::PositionalTag;
use crate::translate::TagTranslator;
use num_complex::Complex64;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Source lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Open,
    Streaming,
    /// A read returned no samples
    Eof,
    Closed,
}

/// One chunk of replayed samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChunk {
    /// Samples encoded in [`format`](Self::format)
    pub data: Vec<u8>,
    pub format: SampleFormat,
    /// Number of samples in `data`
    pub samples: usize,
    /// Tags at absolute stream offsets
    pub tags: Vec<PositionalTag>,
    /// No samples remain
    pub end_of_stream: bool,
}

impl SourceChunk {
    /// Normalized component values, I/Q interleaved for complex formats.
    pub fn values(&self) -> Vec<f64> {
        self.format.decode(&self.data)
    }

    pub fn complex(&self) -> Vec<Complex64> {
        self.format.decode_complex(&self.data)
    }
}

/// Reader for a `.sigmf-data` / `.sigmf-meta` pair.
#[derive(Debug)]
pub struct RecordingSource {
    paths: RecordingPaths,
    config: SourceConfig,
    meta: SigMfMeta,
    translator: TagTranslator,
    reader: Option<BufReader<File>>,
    stored: SampleFormat,
    output: SampleFormat,
    total_samples: u64,
    /// Next sample to read from the data file
    cursor: u64,
    /// Stream offset of the sample at `cursor`
    stream_offset: u64,
    state: SourceState,
}

impl RecordingSource {
    /// Open a recording for playback.
    ///
    /// Fails with [`SigMfError::Io`] if either file cannot be opened, and with
    /// [`SigMfError::Format`] if the metadata document is malformed, if its
    /// datatype disagrees with a configured stored datatype, or if it cannot
    /// be converted to the output datatype.
    pub fn open<P: AsRef<Path>>(path: P, config: SourceConfig) -> SigMfResult<Self> {
        config.validate()?;
        let paths = RecordingPaths::new(path);

        let mut meta = SigMfMeta::read_from(&paths.meta)?;
        let stored = meta.global.datatype;
        if let Some(expected) = config.stored_datatype {
            if expected != stored {
                return Err(SigMfError::Format(format!(
                    "{} declares {} samples, expected {}",
                    paths.meta.display(),
                    stored,
                    expected
                )));
            }
        }

        let output = config.output_datatype.unwrap_or(stored);
        if !stored.can_convert_to(output) {
            return Err(SigMfError::Format(format!(
                "cannot convert {} samples to {}",
                stored, output
            )));
        }

        config.overrides.apply(&mut meta.global);
        meta.sort_by_offset();

        let file = File::open(&paths.data)?;
        let len = file.metadata()?.len();
        let width = stored.bytes_per_sample() as u64;
        let total_samples = len / width;
        if len % width != 0 {
            tracing::warn!(
                path = %paths.data.display(),
                trailing_bytes = len % width,
                "data file ends with a partial sample"
            );
        }

        let beyond = meta
            .captures
            .iter()
            .map(|c| c.sample_start)
            .chain(meta.annotations.iter().map(|a| a.sample_start))
            .filter(|&start| start >= total_samples)
            .count();
        if beyond > 0 {
            tracing::warn!(
                path = %paths.meta.display(),
                records = beyond,
                total_samples,
                "metadata records start past the end of the data file"
            );
        }

        tracing::info!(
            path = %paths.data.display(),
            stored = %stored,
            output = %output,
            total_samples,
            repeat = config.repeat,
            "recording opened for playback"
        );

        Ok(Self {
            paths,
            config,
            meta,
            translator: TagTranslator::new(),
            reader: Some(BufReader::new(file)),
            stored,
            output,
            total_samples,
            cursor: 0,
            stream_offset: 0,
            state: SourceState::Open,
        })
    }

    /// Read up to `max_samples` samples.
    ///
    /// Fewer samples come back only at the end of the file. Once nothing is
    /// left the chunk is empty with `end_of_stream` set; this is not an error.
    /// With repeat enabled the file loops and stream offsets keep increasing.
    pub fn read(&mut self, max_samples: usize) -> SigMfResult<SourceChunk> {
        if self.state == SourceState::Closed {
            return Err(SigMfError::State("read after close".to_string()));
        }

        let width = self.stored.bytes_per_sample();
        let mut raw: Vec<u8> = Vec::new();
        let mut tags = Vec::new();
        let mut samples = 0usize;

        while samples < max_samples {
            if self.cursor >= self.total_samples {
                if self.config.repeat && self.total_samples > 0 {
                    self.reposition(0)?;
                    continue;
                }
                break;
            }

            let n = ((max_samples - samples) as u64).min(self.total_samples - self.cursor);
            let start = raw.len();
            raw.resize(start + n as usize * width, 0);
            let reader = self
                .reader
                .as_mut()
                .ok_or_else(|| SigMfError::State("data file is not open".to_string()))?;
            reader.read_exact(&mut raw[start..])?;

            let shift = self.stream_offset - self.cursor;
            for mut tag in self
                .translator
                .emit_range(&self.meta, self.cursor..self.cursor + n)
            {
                tag.offset += shift;
                diag!(
                    self.config.debug,
                    offset = tag.offset,
                    key = %tag.key,
                    value = %tag.value,
                    "tag"
                );
                tags.push(tag);
            }

            self.cursor += n;
            self.stream_offset += n;
            samples += n as usize;
        }

        let end_of_stream =
            samples == 0 && (max_samples > 0 || self.state == SourceState::Eof);
        if end_of_stream {
            if self.state != SourceState::Eof {
                tracing::debug!(path = %self.paths.data.display(), "end of recording");
            }
            self.state = SourceState::Eof;
        } else if samples > 0 {
            self.state = SourceState::Streaming;
        }

        diag!(
            self.config.debug,
            samples,
            tags = tags.len(),
            position = self.cursor,
            "chunk read"
        );

        Ok(SourceChunk {
            data: convert(&raw, self.stored, self.output),
            format: self.output,
            samples,
            tags,
            end_of_stream,
        })
    }

    /// Move the cursor to `sample`.
    ///
    /// Later reads emit tags for records at or after `sample`, with stream
    /// offsets equal to file offsets.
    pub fn seek(&mut self, sample: u64) -> SigMfResult<()> {
        if self.state == SourceState::Closed {
            return Err(SigMfError::State("seek after close".to_string()));
        }
        if sample > self.total_samples {
            return Err(SigMfError::Range(format!(
                "cannot seek to sample {} of {}",
                sample, self.total_samples
            )));
        }
        self.reposition(sample)?;
        self.stream_offset = sample;
        self.state = SourceState::Streaming;
        Ok(())
    }

    fn reposition(&mut self, sample: u64) -> SigMfResult<()> {
        let width = self.stored.bytes_per_sample() as u64;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SigMfError::State("data file is not open".to_string()))?;
        reader.seek(SeekFrom::Start(sample * width))?;
        self.cursor = sample;
        Ok(())
    }

    /// Release the data file. Closing twice is harmless.
    pub fn close(&mut self) -> SigMfResult<()> {
        if self.state != SourceState::Closed {
            self.reader = None;
            self.state = SourceState::Closed;
            tracing::info!(
                path = %self.paths.data.display(),
                samples = self.stream_offset,
                "playback closed"
            );
        }
        Ok(())
    }

    /// Parsed metadata, with overrides applied.
    pub fn metadata(&self) -> &SigMfMeta {
        &self.meta
    }

    /// Whole samples in the data file.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Next sample to be read from the data file.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.meta.global.sample_rate
    }

    pub fn stored_format(&self) -> SampleFormat {
        self.stored
    }

    pub fn output_format(&self) -> SampleFormat {
        self.output
    }

    pub fn paths(&self) -> &RecordingPaths {
        &self.paths
    }

    pub fn state(&self) -> SourceState {
        self.state
    }
}
