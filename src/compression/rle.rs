//! Run-length encoding.
//!
//! Each token is a `(symbol, length)` byte pair. Runs longer than the cap are
//! split, so two adjacent tokens carry the same symbol only when the first one
//! is full; any other repetition is rejected as non-canonical on decode.

use crate::compression::{output_limit_exceeded, Compression, Result};
use crate::config::DEFAULT_RLE_MAX_RUN;
use crate::error::Error;

/// A run of `length` copies of `symbol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleRun {
    pub symbol: u8,
    pub length: u8,
}

/// Encode `input` as runs of at most `max_run` bytes.
///
/// # Example
///
/// ```
/// use codec_engine::compression::rle::{encode, RleRun};
///
/// let runs = encode(b"AAAAAAAAAA", 255);
/// assert_eq!(runs, vec![RleRun { symbol: b'A', length: 10 }]);
/// ```
pub fn encode(input: &[u8], max_run: u8) -> Vec<RleRun> {
    let max_run = max_run.max(1);
    let mut runs: Vec<RleRun> = Vec::new();
    for &byte in input {
        match runs.last_mut() {
            Some(run) if run.symbol == byte && run.length < max_run => run.length += 1,
            _ => runs.push(RleRun {
                symbol: byte,
                length: 1,
            }),
        }
    }
    runs
}

/// Expand runs back into bytes.
///
/// Fails with `CorruptStream` on a zero-length run or on a run that repeats
/// the symbol of a preceding run that was not full.
pub fn decode(runs: &[RleRun], max_run: u8) -> Result<Vec<u8>> {
    decode_bounded(runs, max_run, usize::MAX)
}

/// Like [`decode`], but fails with `CorruptStream` if the runs add up to more
/// than `limit` bytes.
pub fn decode_bounded(runs: &[RleRun], max_run: u8, limit: usize) -> Result<Vec<u8>> {
    let total: usize = runs.iter().map(|r| r.length as usize).sum();
    if total > limit {
        return Err(output_limit_exceeded(total, limit));
    }
    let mut output = Vec::with_capacity(total);
    let mut prev: Option<RleRun> = None;
    for (i, run) in runs.iter().enumerate() {
        if run.length == 0 {
            return Err(Error::CorruptStream(format!(
                "run {} has zero length",
                i
            )));
        }
        if run.length > max_run {
            return Err(Error::CorruptStream(format!(
                "run {} of {} exceeds the {} byte cap",
                i, run.length, max_run
            )));
        }
        if let Some(p) = prev {
            if p.symbol == run.symbol && p.length < max_run {
                return Err(Error::CorruptStream(format!(
                    "run {} continues an unfinished run of {}",
                    i, run.symbol
                )));
            }
        }
        output.extend(std::iter::repeat(run.symbol).take(run.length as usize));
        prev = Some(*run);
    }
    Ok(output)
}

/// Serialize runs as `(symbol, length)` byte pairs.
pub fn to_bytes(runs: &[RleRun]) -> Vec<u8> {
    runs.iter().flat_map(|r| [r.symbol, r.length]).collect()
}

/// Parse `(symbol, length)` byte pairs.
pub fn from_bytes(data: &[u8]) -> Result<Vec<RleRun>> {
    if data.len() % 2 != 0 {
        return Err(Error::TruncatedStream(format!(
            "rle payload of {} bytes ends mid-token",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .map(|pair| RleRun {
            symbol: pair[0],
            length: pair[1],
        })
        .collect())
}

/// Size of the pair encoding of `input`, without building it.
pub fn encoded_len(input: &[u8], max_run: u8) -> usize {
    let max_run = max_run.max(1) as usize;
    let mut tokens = 0;
    let mut i = 0;
    while i < input.len() {
        let run = input[i..].iter().take_while(|&&b| b == input[i]).count();
        tokens += run.div_ceil(max_run);
        i += run;
    }
    tokens * 2
}

/// Run-length encoding as a [`Compression`] implementation.
#[derive(Debug, Clone, Copy)]
pub struct RleCodec {
    max_run: u8,
}

impl RleCodec {
    pub fn new(max_run: u8) -> Self {
        Self {
            max_run: max_run.max(1),
        }
    }
}

impl Default for RleCodec {
    fn default() -> Self {
        Self::new(DEFAULT_RLE_MAX_RUN)
    }
}

impl Compression for RleCodec {
    /// Emits the run cap followed by the token pairs.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let runs = encode(data, self.max_run);
        let mut out = Vec::with_capacity(1 + 2 * runs.len());
        out.push(self.max_run);
        out.extend(runs.iter().flat_map(|r| [r.symbol, r.length]));
        Ok(out)
    }

    /// Reads the run cap from the stream, so any cap decodes.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompress_bounded(data, usize::MAX)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let Some((&max_run, body)) = data.split_first() else {
            return Err(Error::CorruptHeader("rle stream has no run cap".to_string()));
        };
        if max_run == 0 {
            return Err(Error::CorruptHeader("rle run cap is zero".to_string()));
        }
        decode_bounded(&from_bytes(body)?, max_run, limit)
    }
}
