//! Request-level compression: codec selection, framing and statistics.
//!
//! A [`Compressor`] owns the engine tuning and nothing else, so it can be
//! shared freely between threads. Each call builds a [`CompressionJob`] that
//! walks `Idle -> Selecting -> Encoding -> Done` (or `Failed`) and produces
//! the framed output together with a [`CompressionResult`].
//!
//! Selection policy:
//!
//! | content class | mode     | codec                                     |
//! |---------------|----------|-------------------------------------------|
//! | text          | lossless | Huffman                                   |
//! | text          | lossy    | normalization, then Huffman or RLE        |
//! | block data    | lossless | smallest of Huffman, RLE, LZ77 and LZ78   |
//! | block data    | lossy    | DCT block transform                       |
//!
//! # Example
//!
//! ```
//! use codec_engine::compression::orchestrator::Compressor;
//! use codec_engine::config::{CompressionConfig, ContentClass, Mode};
//!
//! let engine = Compressor::default();
//! let config = CompressionConfig::new(Mode::Lossless, 80, ContentClass::Text).unwrap();
//! let (packed, result) = engine.compress(b"to be or not to be", &config).unwrap();
//! assert_eq!(result.algorithm, "Huffman");
//! assert_eq!(engine.decompress(&packed).unwrap(), b"to be or not to be");
//! ```

use crate::compression::dct::BlockTransformCodec;
use crate::compression::header::{CodecKind, Header, FORMAT_VERSION, HEADER_LEN};
use crate::compression::huffman::HuffmanCodec;
use crate::compression::lz77::{Lz77Codec, Lz77Params};
use crate::compression::lz78::Lz78Codec;
use crate::compression::rle::RleCodec;
use crate::compression::{text, Compression, Result};
use crate::config::{CompressionConfig, ContentClass, EngineConfig, Mode, Quality};
use crate::error::Error;
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::borrow::Cow;
use std::time::{Duration, Instant};

const BLOCK_LOSSLESS_CANDIDATES: [CodecKind; 4] = [
    CodecKind::Huffman,
    CodecKind::Rle,
    CodecKind::Lz77,
    CodecKind::Lz78,
];

/// Lifecycle of a single compression request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Selecting,
    Encoding,
    Done,
    Failed,
}

/// Statistics reported for one compression request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub success: bool,
    pub codec: CodecKind,
    pub algorithm: &'static str,
    pub description: String,
    pub original_size: usize,
    /// Size of the framed output, header included
    pub compressed_size: usize,
    /// `original_size / compressed_size`, `None` when nothing was written
    pub ratio: Option<f64>,
    pub mode: Mode,
    /// Quality actually used; lower than requested after a lossy retry.
    /// `None` for lossless output.
    pub quality: Option<Quality>,
    pub content_class: ContentClass,
    pub elapsed: Duration,
}

impl CompressionResult {
    /// Bytes saved, negative when the output grew.
    pub fn savings(&self) -> i64 {
        self.original_size as i64 - self.compressed_size as i64
    }
}

/// Input and candidate codecs chosen for a request.
struct Selection<'d> {
    input: Cow<'d, [u8]>,
    candidates: Vec<CodecKind>,
    normalized: bool,
}

/// Stateless compression engine.
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    config: EngineConfig,
}

impl Compressor {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts a job whose stage can be inspected after it runs.
    pub fn job(&self) -> CompressionJob<'_> {
        CompressionJob {
            engine: self,
            forced: None,
            stage: Stage::Idle,
        }
    }

    /// Compresses `data`, choosing the codec by content class and mode.
    pub fn compress(
        &self,
        data: &[u8],
        config: &CompressionConfig,
    ) -> Result<(Vec<u8>, CompressionResult)> {
        self.job().run(data, config)
    }

    /// Compresses `data` with `codec`, bypassing the selection policy.
    ///
    /// Fails with `UnsupportedModeForCodec` before encoding if `codec` cannot
    /// serve the requested mode.
    pub fn compress_with(
        &self,
        codec: CodecKind,
        data: &[u8],
        config: &CompressionConfig,
    ) -> Result<(Vec<u8>, CompressionResult)> {
        self.job().force(codec).run(data, config)
    }

    /// Compresses independent requests in parallel.
    ///
    /// Results are returned in request order; one failure does not affect
    /// the others.
    pub fn compress_batch(
        &self,
        requests: &[(&[u8], CompressionConfig)],
    ) -> Vec<Result<(Vec<u8>, CompressionResult)>> {
        requests
            .par_iter()
            .map(|(data, config)| self.compress(data, config))
            .collect()
    }

    /// Parses the header of `data` and decodes the body that follows it.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (header, body) = Header::parse(data)?;
        self.decompress_with_header(&header, body)
    }

    /// Decodes a codec body whose header was parsed by the caller.
    pub fn decompress_with_header(&self, header: &Header, body: &[u8]) -> Result<Vec<u8>> {
        if header.version != FORMAT_VERSION {
            return Err(Error::CorruptHeader(format!(
                "unsupported format version {}",
                header.version
            )));
        }
        if !header.codec.supports(header.mode()) {
            return Err(Error::CorruptHeader(format!(
                "{} stream marked {}",
                header.codec,
                header.mode()
            )));
        }
        debug!(
            "Decoding {} body of {} bytes ({}, {})",
            header.codec,
            body.len(),
            header.mode(),
            header.content_class
        );
        let quality = header.quality.unwrap_or_default();
        // Normalization never lengthens text, so the recorded length bounds every stream
        let limit = usize::try_from(header.original_length).unwrap_or(usize::MAX);
        let output = self
            .codec(header.codec, quality)
            .decompress_bounded(body, limit)?;

        // Normalized text does not keep its input length
        let normalized = header.content_class == ContentClass::Text && header.mode() == Mode::Lossy;
        if !normalized && output.len() as u64 != header.original_length {
            return Err(Error::CorruptStream(format!(
                "decoded {} bytes but header records {}",
                output.len(),
                header.original_length
            )));
        }
        Ok(output)
    }

    fn codec(&self, kind: CodecKind, quality: Quality) -> Box<dyn Compression> {
        match kind {
            CodecKind::Huffman => Box::new(HuffmanCodec),
            CodecKind::Rle => Box::new(RleCodec::new(self.config.rle_max_run)),
            CodecKind::Lz77 => Box::new(Lz77Codec::new(Lz77Params::from(&self.config))),
            CodecKind::Lz78 => Box::new(Lz78Codec::new(self.config.lz78_dict_cap)),
            CodecKind::BlockTransform => Box::new(BlockTransformCodec::new(quality)),
        }
    }
}

/// One compression request moving through its stages.
#[derive(Debug)]
pub struct CompressionJob<'e> {
    engine: &'e Compressor,
    forced: Option<CodecKind>,
    stage: Stage,
}

impl<'e> CompressionJob<'e> {
    /// Uses `codec` instead of the selection policy.
    pub fn force(mut self, codec: CodecKind) -> Self {
        self.forced = Some(codec);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn transition(&mut self, next: Stage) {
        debug!("Compression job {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Selects a codec, encodes `data` and frames the output.
    pub fn run(
        &mut self,
        data: &[u8],
        config: &CompressionConfig,
    ) -> Result<(Vec<u8>, CompressionResult)> {
        let started = Instant::now();
        self.transition(Stage::Selecting);
        let outcome = match self.select(data, config) {
            Ok(selection) => {
                self.transition(Stage::Encoding);
                self.encode(data, selection, config, started)
            }
            Err(e) => Err(e),
        };
        match &outcome {
            Ok(_) => self.transition(Stage::Done),
            Err(e) => {
                debug!("Compression failed: {}", e);
                self.transition(Stage::Failed);
            }
        }
        outcome
    }

    fn select<'d>(&self, data: &'d [u8], config: &CompressionConfig) -> Result<Selection<'d>> {
        let normalized = config.content_class == ContentClass::Text && config.mode == Mode::Lossy;
        let input = if normalized {
            Cow::Owned(text::normalize(data, config.quality))
        } else {
            Cow::Borrowed(data)
        };

        let candidates = match self.forced {
            Some(codec) if !codec.supports(config.mode) => {
                return Err(Error::UnsupportedModeForCodec {
                    codec: codec.name(),
                    mode: config.mode.as_str(),
                });
            }
            Some(codec) => vec![codec],
            None => match (config.content_class, config.mode) {
                (ContentClass::Text, Mode::Lossless) => vec![CodecKind::Huffman],
                (ContentClass::Text, Mode::Lossy) => {
                    vec![text::choose_codec(&input, self.engine.config.rle_max_run)]
                }
                (ContentClass::ImageBlock, Mode::Lossless) => BLOCK_LOSSLESS_CANDIDATES.to_vec(),
                (ContentClass::ImageBlock, Mode::Lossy) => vec![CodecKind::BlockTransform],
            },
        };
        debug!(
            "Selected {:?} for {} bytes of {} ({}, quality {})",
            candidates,
            data.len(),
            config.content_class,
            config.mode,
            config.quality.get()
        );
        Ok(Selection {
            input,
            candidates,
            normalized,
        })
    }

    fn encode(
        &self,
        data: &[u8],
        selection: Selection<'_>,
        config: &CompressionConfig,
        started: Instant,
    ) -> Result<(Vec<u8>, CompressionResult)> {
        let mut best: Option<(CodecKind, Quality, Vec<u8>)> = None;
        for &codec in &selection.candidates {
            let (quality, body) = self.encode_one(codec, &selection.input, config)?;
            trace!("{} produced {} body bytes", codec, body.len());
            if best.as_ref().map_or(true, |(_, _, b)| body.len() < b.len()) {
                best = Some((codec, quality, body));
            }
        }
        let Some((codec, quality, body)) = best else {
            return Err(Error::InvalidConfig("no codec candidates".to_string()));
        };

        let quality = match config.mode {
            Mode::Lossy => Some(quality),
            Mode::Lossless => None,
        };
        let header = Header::new(codec, quality, config.content_class, data.len() as u64);
        let mut output = Vec::with_capacity(HEADER_LEN + body.len());
        header.write_to(&mut output);
        output.extend_from_slice(&body);

        let result = CompressionResult {
            success: true,
            codec,
            algorithm: codec.name(),
            description: describe(codec, quality, selection.normalized),
            original_size: data.len(),
            compressed_size: output.len(),
            ratio: ratio(data.len(), output.len()),
            mode: config.mode,
            quality,
            content_class: config.content_class,
            elapsed: started.elapsed(),
        };
        if result.compressed_size > result.original_size {
            warn!(
                "{} output of {} bytes is larger than the {} byte input",
                codec, result.compressed_size, result.original_size
            );
        }
        info!(
            "Compressed {} bytes to {} with {} (ratio {:.3})",
            result.original_size,
            result.compressed_size,
            codec,
            result.ratio.unwrap_or(0.0)
        );
        Ok((output, result))
    }

    /// Encodes with one codec, retrying the block transform at lower quality
    /// when the engine allows it and the output did not shrink.
    fn encode_one(
        &self,
        codec: CodecKind,
        input: &[u8],
        config: &CompressionConfig,
    ) -> Result<(Quality, Vec<u8>)> {
        let engine = &self.engine.config;
        let mut quality = config.quality;
        loop {
            let body = self.engine.codec(codec, quality).compress(input)?;
            let retry = codec == CodecKind::BlockTransform
                && engine.lossy_retry
                && HEADER_LEN + body.len() >= input.len()
                && quality.get() > engine.retry_floor;
            if !retry {
                return Ok((quality, body));
            }
            let next = quality.get().saturating_sub(engine.retry_step).max(Quality::MIN);
            debug!(
                "{} bytes did not shrink at quality {}, retrying at {}",
                input.len(),
                quality.get(),
                next
            );
            quality = Quality::new(next as u32)?;
        }
    }
}

fn ratio(original: usize, compressed: usize) -> Option<f64> {
    (compressed > 0).then(|| original as f64 / compressed as f64)
}

fn describe(codec: CodecKind, quality: Option<Quality>, normalized: bool) -> String {
    match (codec, quality) {
        (CodecKind::BlockTransform, Some(q)) => {
            format!("{} at quality {}", codec.description(), q.get())
        }
        (_, Some(q)) if normalized => format!(
            "Text normalization at quality {} followed by {}",
            q.get(),
            codec.description().to_lowercase()
        ),
        _ => codec.description().to_string(),
    }
}
