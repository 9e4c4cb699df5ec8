//! # Configuration
//!
//! YAML configuration for SigMF sinks and sources.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `R4W_SIGMF_CONFIG` environment variable
//! 2. `./r4w-sigmf.yaml` (current directory)
//! 3. `~/.config/r4w/sigmf.yaml` (user config)
//! 4. `/etc/r4w/sigmf.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! sink:
//!   datatype: ci16_le
//!   sample_rate: 2.4e6
//!   author: "Cate Miller"
//!   license: CC-BY-SA
//!
//! source:
//!   output_datatype: cf32_le
//!   repeat: false
//!
//! logging:
//!   level: debug
//! ```

use crate::error::{SigMfError, SigMfResult};
use crate::format::SampleFormat;
use crate::meta::SigMfGlobal;
use crate::observe::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "R4W_SIGMF_CONFIG";

/// Recording sink settings, written into the global section on close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Sample format of the incoming stream
    pub datatype: SampleFormat,
    /// Sample rate in Hz, unless an `rx_rate` tag supplies one
    pub sample_rate: Option<f64>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    /// Recording application label
    pub recorder: Option<String>,
    /// Hardware label
    pub hw: Option<String>,
    /// Per-chunk and per-tag diagnostics
    pub debug: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            datatype: SampleFormat::Cf32,
            sample_rate: None,
            description: None,
            author: None,
            license: None,
            recorder: Some("r4w-sigmf".to_string()),
            hw: None,
            debug: false,
        }
    }
}

impl SinkConfig {
    pub fn new(datatype: SampleFormat) -> Self {
        Self {
            datatype,
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn with_license(mut self, license: &str) -> Self {
        self.license = Some(license.to_string());
        self
    }

    pub fn with_recorder(mut self, recorder: &str) -> Self {
        self.recorder = Some(recorder.to_string());
        self
    }

    pub fn with_hardware(mut self, hw: &str) -> Self {
        self.hw = Some(hw.to_string());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Fill global fields the recording did not already set.
    pub fn fill_global(&self, global: &mut SigMfGlobal) {
        global.datatype = self.datatype;
        if global.sample_rate.is_none() {
            global.sample_rate = self.sample_rate;
        }
        fill(&mut global.description, &self.description);
        fill(&mut global.author, &self.author);
        fill(&mut global.license, &self.license);
        fill(&mut global.recorder, &self.recorder);
        fill(&mut global.hw, &self.hw);
    }

    pub fn validate(&self) -> SigMfResult<()> {
        if let Some(rate) = self.sample_rate {
            if !(rate > 0.0) || !rate.is_finite() {
                return Err(SigMfError::Config(format!(
                    "sink sample_rate must be positive, got {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// Global fields a source reports in place of the document's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOverrides {
    pub sample_rate: Option<f64>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub hw: Option<String>,
}

impl GlobalOverrides {
    pub fn apply(&self, global: &mut SigMfGlobal) {
        if let Some(rate) = self.sample_rate {
            global.sample_rate = Some(rate);
        }
        if self.description.is_some() {
            global.description.clone_from(&self.description);
        }
        if self.author.is_some() {
            global.author.clone_from(&self.author);
        }
        if self.license.is_some() {
            global.license.clone_from(&self.license);
        }
        if self.hw.is_some() {
            global.hw.clone_from(&self.hw);
        }
    }
}

/// Recording source settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Expected stored format; `None` trusts the document
    pub stored_datatype: Option<SampleFormat>,
    /// Format handed to the caller; `None` means the stored format
    pub output_datatype: Option<SampleFormat>,
    /// Loop back to the start at end of file
    pub repeat: bool,
    /// Per-chunk and per-tag diagnostics
    pub debug: bool,
    pub overrides: GlobalOverrides,
}

impl SourceConfig {
    /// Replay converting to `output`.
    pub fn new(output: SampleFormat) -> Self {
        Self {
            output_datatype: Some(output),
            ..Default::default()
        }
    }

    pub fn with_stored(mut self, stored: SampleFormat) -> Self {
        self.stored_datatype = Some(stored);
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_overrides(mut self, overrides: GlobalOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn validate(&self) -> SigMfResult<()> {
        if let (Some(stored), Some(output)) = (self.stored_datatype, self.output_datatype) {
            if !stored.can_convert_to(output) {
                return Err(SigMfError::Format(format!(
                    "cannot convert {} samples to {}",
                    stored, output
                )));
            }
        }
        if let Some(rate) = self.overrides.sample_rate {
            if !(rate > 0.0) || !rate.is_finite() {
                return Err(SigMfError::Config(format!(
                    "sample_rate override must be positive, got {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigMfConfig {
    pub sink: SinkConfig,
    pub source: SourceConfig,
    pub logging: LogConfig,
}

impl SigMfConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> SigMfResult<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> SigMfResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SigMfError::Config(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> SigMfResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| SigMfError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> SigMfResult<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| SigMfError::Config(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| SigMfError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./r4w-sigmf.yaml")];

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "r4w") {
            paths.push(config_dir.config_dir().join("sigmf.yaml"));
        }

        paths.push(PathBuf::from("/etc/r4w/sigmf.yaml"));

        paths
    }

    pub fn validate(&self) -> SigMfResult<()> {
        self.sink.validate()?;
        self.source.validate()
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            sink: SinkConfig::new(SampleFormat::Ci16)
                .with_sample_rate(2_400_000.0)
                .with_description("Example capture")
                .with_license("CC-BY-SA")
                .with_hardware("rtlsdr"),
            source: SourceConfig::new(SampleFormat::Cf32),
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
