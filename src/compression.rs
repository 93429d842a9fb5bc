//! Byte-stream codecs and the orchestrator that drives them.
//!
//! This module provides:
//! - Lossless coders: Huffman, run-length encoding, LZ77 and LZ78
//! - A lossy DCT block transform with quality-scaled quantization
//! - Lossy text normalization
//! - A self-describing header and the [`Compressor`] entry point
//!
//! # Examples
//!
//! ```rust
//! use codec_engine::compression::{Compression, RleCodec};
//!
//! let codec = RleCodec::default();
//! let packed = codec.compress(b"AAAAAAAAAA").unwrap();
//! assert_eq!(codec.decompress(&packed).unwrap(), b"AAAAAAAAAA");
//! ```

pub use crate::error::Result;
use crate::error::Error;

/// Trait for compression algorithms
pub trait Compression {
    /// Compress the input data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the compressed data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress, failing with `CorruptStream` once the output would pass
    /// `limit` bytes.
    ///
    /// Codecs override this to stop before allocating; the default only
    /// checks the finished output.
    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let output = self.decompress(data)?;
        if output.len() > limit {
            return Err(output_limit_exceeded(output.len(), limit));
        }
        Ok(output)
    }
}

pub(crate) fn output_limit_exceeded(len: usize, limit: usize) -> Error {
    Error::CorruptStream(format!(
        "decoded output of {} bytes exceeds declared length {}",
        len, limit
    ))
}

pub mod bitstream;
pub mod dct;
pub mod header;
pub mod huffman;
pub mod lz77;
pub mod lz78;
pub mod orchestrator;
pub mod rle;
pub mod text;
pub(crate) mod wire;

pub use bitstream::{BitReader, BitWriter, PackedBits};
pub use dct::{BlockTransformCodec, QuantizationTable};
pub use header::{CodecKind, Header, FORMAT_VERSION, HEADER_LEN};
pub use huffman::{build_code_table, build_frequency_table, build_huffman_tree, HuffmanCodec};
pub use lz77::{Lz77Codec, Lz77Params};
pub use lz78::Lz78Codec;
pub use orchestrator::{CompressionJob, CompressionResult, Compressor, Stage};
pub use rle::RleCodec;
