//! Streaming SigMF recorder.
//!
//! A [`RecordingSink`] appends raw sample chunks to `<base>.sigmf-data` as
//! they arrive and folds their tags into an in-memory [`SigMfMeta`]. The
//! metadata document is written once, on [`RecordingSink::close`].
//!
//! ```rust,ignore
//! let mut sink = RecordingSink::create("capture", SinkConfig::new(SampleFormat::Ci16))?;
//! sink.write(&chunk, &[PositionalTag::new(0, "rx_freq", 915e6)])?;
//! sink.close()?;
//! ```

use crate::config::SinkConfig;
use crate::error::{SigMfError, SigMfResult};
use crate::format::SampleFormat;
use crate::meta::{RecordingPaths, SigMfMeta};
use crate::observe::diag;
use crate::tags::PositionalTag;
use crate::translate::TagTranslator;
use num_complex::Complex64;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sink lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Created, nothing written yet
    Open,
    /// At least one chunk accepted
    Writing,
    /// Metadata written; no further writes
    Closed,
    /// A data append failed; only `close` is accepted
    Failed,
}

/// Writer for a `.sigmf-data` / `.sigmf-meta` pair.
#[derive(Debug)]
pub struct RecordingSink {
    paths: RecordingPaths,
    config: SinkConfig,
    meta: SigMfMeta,
    translator: TagTranslator,
    data_file: Option<BufWriter<File>>,
    samples_written: u64,
    state: SinkState,
}

impl RecordingSink {
    /// Create a recording at `path`.
    ///
    /// `path` may be a base name or either file of the pair. The data file is
    /// created (or truncated) immediately.
    pub fn create<P: AsRef<Path>>(path: P, config: SinkConfig) -> SigMfResult<Self> {
        config.validate()?;
        let paths = RecordingPaths::new(path);

        let data_file = File::create(&paths.data).map_err(|e| {
            SigMfError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", paths.data.display(), e),
            ))
        })?;

        tracing::info!(
            path = %paths.data.display(),
            datatype = %config.datatype,
            "recording opened"
        );

        Ok(Self {
            meta: SigMfMeta::new(config.datatype),
            paths,
            config,
            translator: TagTranslator::new(),
            data_file: Some(BufWriter::new(data_file)),
            samples_written: 0,
            state: SinkState::Open,
        })
    }

    /// Append one chunk of encoded samples with its tags.
    ///
    /// `chunk` holds whole samples in the sink's datatype. Tag offsets are
    /// relative to the first sample of the chunk and must fall inside it.
    /// The chunk is rejected as a whole if its length or any tag is invalid.
    pub fn write(&mut self, chunk: &[u8], tags: &[PositionalTag]) -> SigMfResult<()> {
        match self.state {
            SinkState::Closed => {
                return Err(SigMfError::State("write after close".to_string()));
            }
            SinkState::Failed => {
                return Err(SigMfError::State(
                    "write after a failed append".to_string(),
                ));
            }
            SinkState::Open | SinkState::Writing => {}
        }

        let width = self.config.datatype.bytes_per_sample();
        if chunk.len() % width != 0 {
            return Err(SigMfError::Range(format!(
                "chunk of {} bytes is not a whole number of {} samples",
                chunk.len(),
                self.config.datatype
            )));
        }
        let count = (chunk.len() / width) as u64;

        let mut ordered: Vec<&PositionalTag> = tags.iter().collect();
        ordered.sort_by_key(|t| t.offset);
        for tag in &ordered {
            if tag.offset >= count {
                return Err(SigMfError::Range(format!(
                    "tag '{}' at offset {} lies outside a chunk of {} samples",
                    tag.key, tag.offset, count
                )));
            }
            self.translator.check(tag)?;
        }

        let Some(data_file) = self.data_file.as_mut() else {
            return Err(SigMfError::State("data file is not open".to_string()));
        };
        if let Err(e) = data_file.write_all(chunk) {
            self.state = SinkState::Failed;
            tracing::error!(
                path = %self.paths.data.display(),
                offset = self.samples_written,
                error = %e,
                "append failed, recording aborted"
            );
            return Err(e.into());
        }

        let start = self.samples_written;
        for tag in ordered {
            let absolute = PositionalTag {
                offset: start + tag.offset,
                key: tag.key.clone(),
                value: tag.value.clone(),
            };
            self.translator.absorb(&absolute, &mut self.meta)?;
            diag!(
                self.config.debug,
                offset = absolute.offset,
                key = %absolute.key,
                value = %absolute.value,
                "tag"
            );
        }

        self.samples_written += count;
        self.state = SinkState::Writing;
        diag!(
            self.config.debug,
            start,
            samples = count,
            tags = tags.len(),
            "chunk appended"
        );
        Ok(())
    }

    /// Encode normalized I/Q samples in the sink's datatype, then [`write`](Self::write) them.
    pub fn write_complex(
        &mut self,
        samples: &[Complex64],
        tags: &[PositionalTag],
    ) -> SigMfResult<()> {
        let chunk = self.config.datatype.encode_complex(samples);
        self.write(&chunk, tags)
    }

    /// Flush the data file and write the metadata document.
    ///
    /// Closing an already closed sink does nothing. If the metadata cannot be
    /// written the sink is left `Failed`, and a later `close` tries again.
    pub fn close(&mut self) -> SigMfResult<()> {
        if self.state == SinkState::Closed {
            tracing::debug!(path = %self.paths.meta.display(), "sink already closed");
            return Ok(());
        }

        let flushed = match self.data_file.take() {
            Some(mut data_file) => data_file.flush(),
            None => Ok(()),
        };

        self.config.fill_global(&mut self.meta.global);
        if let Err(e) = self.meta.write_to(&self.paths.meta) {
            self.state = SinkState::Failed;
            tracing::error!(
                path = %self.paths.meta.display(),
                error = %e,
                "failed to write metadata"
            );
            return Err(e);
        }
        self.state = SinkState::Closed;
        flushed?;

        tracing::info!(
            path = %self.paths.meta.display(),
            samples = self.samples_written,
            captures = self.meta.captures.len(),
            annotations = self.meta.annotations.len(),
            "recording closed"
        );
        Ok(())
    }

    /// Number of samples appended so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Metadata accumulated so far.
    pub fn metadata(&self) -> &SigMfMeta {
        &self.meta
    }

    pub fn paths(&self) -> &RecordingPaths {
        &self.paths
    }

    pub fn datatype(&self) -> SampleFormat {
        self.config.datatype
    }

    pub fn state(&self) -> SinkState {
        self.state
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if self.state != SinkState::Closed {
            if let Err(e) = self.close() {
                tracing::warn!(
                    path = %self.paths.meta.display(),
                    error = %e,
                    "failed to close recording on drop"
                );
            }
        }
    }
}
