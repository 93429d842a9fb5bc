//! Request and engine configuration.
//!
//! A [`CompressionConfig`] describes one request: the mode, the quality and the
//! class of content being compressed. [`EngineConfig`] carries the codec tuning
//! knobs (LZ window, dictionary caps, retry policy) and is validated once when
//! built so that codecs never see out-of-range parameters.
//!
//! ```
//! use codec_engine::config::{CompressionConfig, ContentClass, EngineConfig, Mode};
//!
//! let request = CompressionConfig::new(Mode::Lossless, 50, ContentClass::Text).unwrap();
//! assert_eq!(request.quality.get(), 50);
//!
//! let engine = EngineConfig::builder()
//!     .lz77_window_size(1024)
//!     .lossy_retry(true)
//!     .build()
//!     .unwrap();
//! assert_eq!(engine.lz77_window_size, 1024);
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Whether the engine may discard information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Lossy,
    Lossless,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Lossy => "lossy",
            Mode::Lossless => "lossless",
        }
    }
}

impl From<bool> for Mode {
    /// Maps an `is_lossy` flag to a mode.
    fn from(is_lossy: bool) -> Self {
        if is_lossy {
            Mode::Lossy
        } else {
            Mode::Lossless
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lossy" => Ok(Mode::Lossy),
            "lossless" => Ok(Mode::Lossless),
            other => Err(Error::InvalidConfig(format!("unknown mode '{}'", other))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression quality in 1..=100. Higher keeps more detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    pub fn new(value: u32) -> Result<Self> {
        if (Self::MIN as u32..=Self::MAX as u32).contains(&value) {
            Ok(Quality(value as u8))
        } else {
            Err(Error::InvalidQuality(value))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for Quality {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Quality::new(value)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality(50)
    }
}

/// Broad class of the bytes handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentClass {
    /// Human-readable text
    Text,
    /// Raw image or video samples laid out in blocks
    ImageBlock,
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "log"];
const BLOCK_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "mp4", "avi", "mov", "wmv",
];

impl ContentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::Text => "text",
            ContentClass::ImageBlock => "image-block-data",
        }
    }

    /// Wire tag stored in the compressed header.
    pub fn tag(&self) -> u8 {
        match self {
            ContentClass::Text => 1,
            ContentClass::ImageBlock => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(ContentClass::Text),
            2 => Ok(ContentClass::ImageBlock),
            other => Err(Error::UnsupportedContentType(format!("tag {}", other))),
        }
    }

    /// Classifies a file by extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ContentClass::Text)
        } else if BLOCK_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ContentClass::ImageBlock)
        } else {
            Err(Error::UnsupportedContentType(format!("extension '.{}'", ext)))
        }
    }
}

impl FromStr for ContentClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentClass::Text),
            "image" | "video" | "image-block-data" | "block" => Ok(ContentClass::ImageBlock),
            other => Err(Error::UnsupportedContentType(other.to_string())),
        }
    }
}

impl fmt::Display for ContentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a single compression request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    pub mode: Mode,
    pub quality: Quality,
    pub content_class: ContentClass,
}

impl CompressionConfig {
    /// Validates `quality` and builds the request settings.
    pub fn new(mode: Mode, quality: u32, content_class: ContentClass) -> Result<Self> {
        Ok(Self {
            mode,
            quality: Quality::new(quality)?,
            content_class,
        })
    }

    /// Builds a request from the loosely typed values an upload form carries.
    pub fn parse(is_lossy: bool, quality: i64, content_class: &str) -> Result<Self> {
        let quality = u32::try_from(quality).map_err(|_| {
            Error::InvalidQuality(if quality < 0 { 0 } else { u32::MAX })
        })?;
        let quality = Quality::new(quality)?;
        Ok(Self {
            mode: Mode::from(is_lossy),
            quality,
            content_class: content_class.parse()?,
        })
    }
}

pub const DEFAULT_LZ77_WINDOW: usize = 4096;
pub const DEFAULT_LZ77_MIN_MATCH: usize = 3;
pub const DEFAULT_LZ77_MAX_MATCH: usize = 258;
pub const DEFAULT_LZ78_DICT_CAP: usize = 1 << 16;
pub const DEFAULT_RLE_MAX_RUN: u8 = 255;
pub const DEFAULT_RETRY_STEP: u8 = 20;
pub const DEFAULT_RETRY_FLOOR: u8 = 20;

/// Codec tuning shared by every request an engine serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// LZ77 sliding window in bytes (power of two, 2..=32768)
    pub lz77_window_size: usize,
    /// Shortest LZ77 match worth a back reference
    pub lz77_min_match: usize,
    /// Longest LZ77 match (lookahead size)
    pub lz77_max_match: usize,
    /// Number of LZ78 dictionary entries before the dictionary freezes
    pub lz78_dict_cap: usize,
    /// Longest run a single RLE token may carry
    pub rle_max_run: u8,
    /// Retry lossy block compression at lower quality when it does not shrink the input.
    ///
    /// Off by default. A retried request is encoded below the quality it asked
    /// for, so with retries on a higher requested quality can come back with
    /// more error than a lower one.
    pub lossy_retry: bool,
    /// Quality decrement per retry
    pub retry_step: u8,
    /// Retries stop once quality is at or below this value
    pub retry_floor: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lz77_window_size: DEFAULT_LZ77_WINDOW,
            lz77_min_match: DEFAULT_LZ77_MIN_MATCH,
            lz77_max_match: DEFAULT_LZ77_MAX_MATCH,
            lz78_dict_cap: DEFAULT_LZ78_DICT_CAP,
            rle_max_run: DEFAULT_RLE_MAX_RUN,
            lossy_retry: false,
            retry_step: DEFAULT_RETRY_STEP,
            retry_floor: DEFAULT_RETRY_FLOOR,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: EngineConfig::default(),
        }
    }

    /// Checks every parameter against the limits of the wire formats.
    pub fn validate(&self) -> Result<()> {
        let window = self.lz77_window_size;
        if !(2..=32768).contains(&window) || !window.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "lz77 window must be a power of two in 2..=32768, got {}",
                window
            )));
        }
        if !(1..=255).contains(&self.lz77_min_match) {
            return Err(Error::InvalidConfig(format!(
                "lz77 min match must be in 1..=255, got {}",
                self.lz77_min_match
            )));
        }
        if self.lz77_max_match < self.lz77_min_match || self.lz77_max_match > u16::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "lz77 max match {} must be in {}..=65535",
                self.lz77_max_match, self.lz77_min_match
            )));
        }
        if !(2..=(1 << 24)).contains(&self.lz78_dict_cap) {
            return Err(Error::InvalidConfig(format!(
                "lz78 dictionary cap must be in 2..=16777216, got {}",
                self.lz78_dict_cap
            )));
        }
        if self.rle_max_run == 0 {
            return Err(Error::InvalidConfig("rle max run must be positive".into()));
        }
        if self.lossy_retry && self.retry_step == 0 {
            return Err(Error::InvalidConfig("retry step must be positive".into()));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn lz77_window_size(mut self, size: usize) -> Self {
        self.config.lz77_window_size = size;
        self
    }

    pub fn lz77_min_match(mut self, len: usize) -> Self {
        self.config.lz77_min_match = len;
        self
    }

    pub fn lz77_max_match(mut self, len: usize) -> Self {
        self.config.lz77_max_match = len;
        self
    }

    pub fn lz78_dict_cap(mut self, cap: usize) -> Self {
        self.config.lz78_dict_cap = cap;
        self
    }

    pub fn rle_max_run(mut self, run: u8) -> Self {
        self.config.rle_max_run = run;
        self
    }

    pub fn lossy_retry(mut self, enabled: bool) -> Self {
        self.config.lossy_retry = enabled;
        self
    }

    pub fn retry_step(mut self, step: u8) -> Self {
        self.config.retry_step = step;
        self
    }

    pub fn retry_floor(mut self, floor: u8) -> Self {
        self.config.retry_floor = floor;
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
