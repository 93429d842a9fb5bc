//! DCT block transform with quality-scaled quantization.
//!
//! Samples are cut into 8×8 tiles (64 consecutive bytes, row-major), level
//! shifted to be centred on zero, transformed with an orthonormal 2-D DCT-II
//! and divided by a quantization table derived from the quality setting. The
//! rounding after that division is the only lossy step. Each block is rounded
//! onto the grid of whichever table at or below the requested quality
//! reconstructs it most closely.
//!
//! Quantized coefficients are read in zig-zag order, trailing zeros are
//! dropped, and the resulting coefficient stream is Huffman coded.
//!
//! Packed layout:
//!
//! ```text
//! u8      block size (8)
//! u8      quality
//! varint  sample count
//! ...     huffman stream of: per block, u8 kept count + zig-zag varints
//! ```

use crate::compression::huffman;
use crate::compression::wire::{put_varint, ByteReader};
use crate::compression::{output_limit_exceeded, Compression, Result};
use crate::config::{Mode, Quality};
use crate::error::Error;
use ndarray::Array2;
use std::f64::consts::PI;

/// Edge length of a transform block.
pub const BLOCK_SIZE: usize = 8;
/// Samples per block.
pub const BLOCK_SAMPLES: usize = BLOCK_SIZE * BLOCK_SIZE;

const LEVEL_SHIFT: f64 = 128.0;

/// Baseline luminance table (ITU T.81, Annex K), row-major.
const BASE_TABLE: [u16; BLOCK_SAMPLES] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Row-major index of the n-th coefficient in zig-zag order.
const ZIGZAG: [usize; BLOCK_SAMPLES] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Quantization step sizes for one quality setting.
///
/// The IJG scaling of the base table is rounded down to a power of two, so
/// steps shrink as quality grows and every step divides the step at any lower
/// quality. At quality 100 every step is 1. The DC step is also capped at 8.
/// The DC coefficient of a block is eight times its mean, so a uniform block
/// always survives quantization exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationTable {
    quality: Quality,
    steps: Array2<u16>,
}

fn floor_power_of_two(value: u32) -> u16 {
    1 << (31 - value.max(1).leading_zeros())
}

impl QuantizationTable {
    pub fn new(quality: Quality) -> Self {
        let q = quality.get() as u32;
        let scale = if q < 50 { 5000 / q } else { 200 - 2 * q };
        let steps = Array2::from_shape_fn((BLOCK_SIZE, BLOCK_SIZE), |(u, v)| {
            let base = BASE_TABLE[u * BLOCK_SIZE + v] as u32;
            let step = ((base * scale + 50) / 100).clamp(1, 255);
            if (u, v) == (0, 0) {
                floor_power_of_two(step.min(8))
            } else {
                floor_power_of_two(step)
            }
        });
        Self { quality, steps }
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn step(&self, u: usize, v: usize) -> u16 {
        self.steps[[u, v]]
    }

    pub fn steps(&self) -> &Array2<u16> {
        &self.steps
    }
}

/// Orthonormal DCT-II basis: `basis[[u, x]] = a(u) * cos((2x + 1) u π / 2N)`.
fn dct_basis() -> Array2<f64> {
    let n = BLOCK_SIZE as f64;
    Array2::from_shape_fn((BLOCK_SIZE, BLOCK_SIZE), |(u, x)| {
        let scale = if u == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * ((2.0 * x as f64 + 1.0) * u as f64 * PI / (2.0 * n)).cos()
    })
}

/// Dequantized coefficients of one block, in zig-zag order.
type Levels = [i32; BLOCK_SAMPLES];

/// DCT + quantization codec. Immutable after construction, so one instance
/// can serve concurrent requests.
///
/// Besides the table for its own quality the codec keeps every distinct
/// coarser table. Since steps are nested, any coefficients one of them can
/// express are also expressible at the target quality, and the encoder keeps
/// whichever candidate reconstructs the block with the smallest error. A block
/// encoded at a higher quality is therefore never reconstructed worse than at
/// a lower one.
#[derive(Debug, Clone)]
pub struct BlockTransformCodec {
    basis: Array2<f64>,
    table: QuantizationTable,
    coarser: Vec<QuantizationTable>,
}

impl BlockTransformCodec {
    pub fn new(quality: Quality) -> Self {
        let table = QuantizationTable::new(quality);
        let mut coarser: Vec<QuantizationTable> = Vec::new();
        for q in Quality::MIN..quality.get() {
            let Ok(q) = Quality::new(q as u32) else {
                continue;
            };
            let candidate = QuantizationTable::new(q);
            let repeated = coarser.last().is_some_and(|t| t.steps == candidate.steps);
            if !repeated && candidate.steps != table.steps {
                coarser.push(candidate);
            }
        }
        Self {
            basis: dct_basis(),
            table,
            coarser,
        }
    }

    /// Builds the codec for a request, rejecting lossless mode.
    pub fn for_mode(mode: Mode, quality: Quality) -> Result<Self> {
        match mode {
            Mode::Lossy => Ok(Self::new(quality)),
            Mode::Lossless => Err(Error::UnsupportedModeForCodec {
                codec: "block-transform",
                mode: mode.as_str(),
            }),
        }
    }

    pub fn table(&self) -> &QuantizationTable {
        &self.table
    }

    /// 2-D DCT-II of a block of level-shifted samples.
    pub fn forward(&self, block: &Array2<f64>) -> Array2<f64> {
        self.basis.dot(block).dot(&self.basis.t())
    }

    /// Inverse of [`forward`](Self::forward).
    pub fn inverse(&self, coefficients: &Array2<f64>) -> Array2<f64> {
        self.basis.t().dot(coefficients).dot(&self.basis)
    }

    /// Rounds every coefficient to the nearest multiple of its step.
    fn nearest_levels(table: &QuantizationTable, coefficients: &Array2<f64>) -> Levels {
        let mut levels = [0i32; BLOCK_SAMPLES];
        for (slot, &idx) in levels.iter_mut().zip(ZIGZAG.iter()) {
            let (u, v) = (idx / BLOCK_SIZE, idx % BLOCK_SIZE);
            let step = table.step(u, v) as f64;
            *slot = ((coefficients[[u, v]] / step).round() * step) as i32;
        }
        levels
    }

    /// Samples decoded from dequantized coefficients.
    fn reconstruct(&self, levels: &Levels) -> [u8; BLOCK_SAMPLES] {
        let mut coefficients = Array2::zeros((BLOCK_SIZE, BLOCK_SIZE));
        for (&value, &idx) in levels.iter().zip(ZIGZAG.iter()) {
            coefficients[[idx / BLOCK_SIZE, idx % BLOCK_SIZE]] = value as f64;
        }
        let mut samples = [0u8; BLOCK_SAMPLES];
        for (slot, &p) in samples.iter_mut().zip(self.inverse(&coefficients).iter()) {
            *slot = (p + LEVEL_SHIFT).round().clamp(0.0, 255.0) as u8;
        }
        samples
    }

    fn block_error(&self, levels: &Levels, original: &[u8]) -> u64 {
        self.reconstruct(levels)
            .iter()
            .zip(original)
            .map(|(&a, &b)| {
                let d = a as i64 - b as i64;
                (d * d) as u64
            })
            .sum()
    }

    fn encode_block(&self, chunk: &[u8], coefficients: &Array2<f64>) -> [i32; BLOCK_SAMPLES] {
        let mut best: Option<(Levels, u64)> = None;
        for table in self.coarser.iter().chain(std::iter::once(&self.table)) {
            let levels = Self::nearest_levels(table, coefficients);
            let error = self.block_error(&levels, chunk);
            if best.map_or(true, |(_, e)| error <= e) {
                best = Some((levels, error));
            }
        }
        let levels = best.map_or([0; BLOCK_SAMPLES], |(levels, _)| levels);

        let mut quantized = [0i32; BLOCK_SAMPLES];
        for ((slot, &value), &idx) in quantized.iter_mut().zip(levels.iter()).zip(ZIGZAG.iter()) {
            *slot = value / self.table.step(idx / BLOCK_SIZE, idx % BLOCK_SIZE) as i32;
        }
        quantized
    }

    /// Quantized zig-zag coefficients for every block of `samples`.
    ///
    /// The last block is padded by repeating the final sample.
    pub fn encode_blocks(&self, samples: &[u8]) -> Vec<[i32; BLOCK_SAMPLES]> {
        samples
            .chunks(BLOCK_SAMPLES)
            .map(|chunk| {
                let edge = chunk[chunk.len() - 1];
                let block = Array2::from_shape_fn((BLOCK_SIZE, BLOCK_SIZE), |(r, c)| {
                    let sample = chunk.get(r * BLOCK_SIZE + c).copied().unwrap_or(edge);
                    sample as f64 - LEVEL_SHIFT
                });
                self.encode_block(chunk, &self.forward(&block))
            })
            .collect()
    }

    /// Reconstructs `sample_count` samples from quantized blocks.
    pub fn decode_blocks(
        &self,
        table: &QuantizationTable,
        blocks: &[[i32; BLOCK_SAMPLES]],
        sample_count: usize,
    ) -> Vec<u8> {
        let mut output = Vec::with_capacity(blocks.len() * BLOCK_SAMPLES);
        for block in blocks {
            let mut levels = [0i32; BLOCK_SAMPLES];
            for ((slot, &value), &idx) in levels.iter_mut().zip(block.iter()).zip(ZIGZAG.iter()) {
                let step = table.step(idx / BLOCK_SIZE, idx % BLOCK_SIZE) as i32;
                *slot = value.saturating_mul(step);
            }
            output.extend_from_slice(&self.reconstruct(&levels));
        }
        output.truncate(sample_count);
        output
    }
}

fn zigzag_sign(value: i32) -> u64 {
    ((value << 1) ^ (value >> 31)) as u32 as u64
}

fn unzigzag_sign(value: u64) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

fn write_coefficients(blocks: &[[i32; BLOCK_SAMPLES]]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        let kept = block.iter().rposition(|&c| c != 0).map_or(0, |last| last + 1);
        out.push(kept as u8);
        for &c in &block[..kept] {
            put_varint(&mut out, zigzag_sign(c));
        }
    }
    out
}

fn read_coefficients(data: &[u8], block_count: usize) -> Result<Vec<[i32; BLOCK_SAMPLES]>> {
    // Every block needs at least its count byte.
    if block_count > data.len() {
        return Err(Error::TruncatedStream(format!(
            "{} blocks declared but coefficient stream has {} bytes",
            block_count,
            data.len()
        )));
    }
    let mut reader = ByteReader::payload(data, "dct coefficients");
    let mut blocks = Vec::with_capacity(block_count);
    for _ in 0..block_count {
        let kept = reader.u8("coefficient count")? as usize;
        if kept > BLOCK_SAMPLES {
            return Err(Error::CorruptStream(format!(
                "block keeps {} coefficients, at most {} exist",
                kept, BLOCK_SAMPLES
            )));
        }
        let mut block = [0i32; BLOCK_SAMPLES];
        for slot in block.iter_mut().take(kept) {
            let raw = reader.varint_usize("coefficient", u32::MAX as usize)?;
            *slot = unzigzag_sign(raw as u64);
        }
        blocks.push(block);
    }
    if !reader.is_empty() {
        return Err(Error::CorruptStream(format!(
            "{} bytes after the last dct block",
            reader.rest().len()
        )));
    }
    Ok(blocks)
}

impl Compression for BlockTransformCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let blocks = self.encode_blocks(data);
        let coefficients = write_coefficients(&blocks);

        let mut out = vec![BLOCK_SIZE as u8, self.table.quality().get()];
        put_varint(&mut out, data.len() as u64);
        out.extend_from_slice(&huffman::compress(&coefficients));
        Ok(out)
    }

    /// Block size, quality and length are read from the stream.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompress_bounded(data, usize::MAX)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let mut header = ByteReader::new(data, "dct params");
        let block_size = header.u8("block size")? as usize;
        if block_size != BLOCK_SIZE {
            return Err(Error::CorruptHeader(format!(
                "unsupported dct block size {}",
                block_size
            )));
        }
        let quality = Quality::new(header.u8("quality")? as u32)
            .map_err(|e| Error::CorruptHeader(e.to_string()))?;
        let sample_count = header.varint_usize("sample count", usize::MAX)?;
        if sample_count > limit {
            return Err(output_limit_exceeded(sample_count, limit));
        }
        let block_count = sample_count.div_ceil(BLOCK_SAMPLES);
        // A block is a count byte plus at most 64 varints of 5 bytes.
        let coefficient_limit = block_count.saturating_mul(1 + BLOCK_SAMPLES * 5);
        let coefficients = huffman::decompress_bounded(header.rest(), coefficient_limit)?;

        let blocks = read_coefficients(&coefficients, block_count)?;
        let table = if quality == self.table.quality() {
            self.table.clone()
        } else {
            QuantizationTable::new(quality)
        };
        Ok(self.decode_blocks(&table, &blocks, sample_count))
    }
}
