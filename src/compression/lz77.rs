//! LZ77 sliding-window compression.
//!
//! The encoder keeps hash chains over the already-seen part of the input, so
//! every earlier position that shares a match's leading bytes is visited in
//! most-recent-first order. The longest match wins; among equally long matches
//! the closest one (smallest offset) is kept.
//!
//! Tokens are packed with the bit writer:
//!
//! ```text
//! 0 + 8 bits                                  literal byte
//! 1 + offset-1 (offset bits) + length-min     back reference
//! ```

use crate::compression::bitstream::{bits_for, BitReader, BitWriter};
use crate::compression::wire::{put_u16, ByteReader};
use crate::compression::{output_limit_exceeded, Compression, Result};
use crate::config::{
    EngineConfig, DEFAULT_LZ77_MAX_MATCH, DEFAULT_LZ77_MIN_MATCH, DEFAULT_LZ77_WINDOW,
};
use crate::error::Error;

/// An LZ77 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A byte copied verbatim
    Literal(u8),
    /// Copy `length` bytes starting `offset` bytes back from the write position
    Match { offset: usize, length: usize },
}

/// Window and match-length limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz77Params {
    pub window_size: usize,
    pub min_match: usize,
    pub max_match: usize,
}

impl Default for Lz77Params {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_LZ77_WINDOW,
            min_match: DEFAULT_LZ77_MIN_MATCH,
            max_match: DEFAULT_LZ77_MAX_MATCH,
        }
    }
}

impl From<&EngineConfig> for Lz77Params {
    fn from(config: &EngineConfig) -> Self {
        Self {
            window_size: config.lz77_window_size,
            min_match: config.lz77_min_match,
            max_match: config.lz77_max_match,
        }
    }
}

impl Lz77Params {
    fn offset_bits(&self) -> usize {
        bits_for(self.window_size.saturating_sub(1) as u64)
    }

    fn length_bits(&self) -> usize {
        bits_for((self.max_match - self.min_match) as u64)
    }

    fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size > u16::MAX as usize {
            return Err(Error::CorruptHeader(format!(
                "lz77 window of {} bytes",
                self.window_size
            )));
        }
        if self.min_match == 0 || self.max_match < self.min_match {
            return Err(Error::CorruptHeader(format!(
                "lz77 match bounds {}..={}",
                self.min_match, self.max_match
            )));
        }
        Ok(())
    }
}

const HASH_BITS: u32 = 15;
const NO_POS: usize = usize::MAX;

/// Hash chains over positions already passed by the encoder.
struct MatchFinder<'a> {
    input: &'a [u8],
    key_len: usize,
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl<'a> MatchFinder<'a> {
    fn new(input: &'a [u8], min_match: usize) -> Self {
        Self {
            input,
            key_len: min_match.clamp(1, 3),
            head: vec![NO_POS; 1 << HASH_BITS],
            prev: vec![NO_POS; input.len()],
        }
    }

    fn hash(&self, pos: usize) -> Option<usize> {
        let key = self.input.get(pos..pos + self.key_len)?;
        let h = key.iter().fold(0usize, |acc, &b| (acc << 5) ^ b as usize);
        Some(h & ((1 << HASH_BITS) - 1))
    }

    fn insert(&mut self, pos: usize) {
        if let Some(h) = self.hash(pos) {
            self.prev[pos] = self.head[h];
            self.head[h] = pos;
        }
    }

    /// Longest match for `pos` as `(length, offset)`; length 0 if none.
    fn longest(&self, pos: usize, window: usize, max_match: usize) -> (usize, usize) {
        let Some(h) = self.hash(pos) else {
            return (0, 0);
        };
        let max_len = max_match.min(self.input.len() - pos);
        let (mut best_len, mut best_offset) = (0, 0);
        let mut candidate = self.head[h];
        while candidate != NO_POS && pos - candidate <= window {
            // Source may run into the lookahead; the decoder copies byte by byte.
            let len = self.input[candidate..]
                .iter()
                .zip(&self.input[pos..pos + max_len])
                .take_while(|(a, b)| a == b)
                .count();
            if len > best_len {
                best_len = len;
                best_offset = pos - candidate;
                if len == max_len {
                    break;
                }
            }
            candidate = self.prev[candidate];
        }
        (best_len, best_offset)
    }
}

/// Compress `input` into LZ77 tokens with a greedy longest-match search.
///
/// # Example
///
/// ```
/// use codec_engine::compression::lz77::{compress, decompress, Lz77Params, Token};
///
/// let tokens = compress(b"ABABABAB", &Lz77Params::default());
/// assert!(tokens.iter().any(|t| matches!(t, Token::Match { .. })));
/// assert_eq!(decompress(&tokens).unwrap(), b"ABABABAB");
/// ```
pub fn compress(input: &[u8], params: &Lz77Params) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut finder = MatchFinder::new(input, params.min_match);
    let mut i = 0;
    while i < input.len() {
        let (length, offset) = finder.longest(i, params.window_size, params.max_match);
        if length >= params.min_match {
            tokens.push(Token::Match { offset, length });
            for pos in i..i + length {
                finder.insert(pos);
            }
            i += length;
        } else {
            tokens.push(Token::Literal(input[i]));
            finder.insert(i);
            i += 1;
        }
    }
    tokens
}

/// Expand tokens back into bytes.
///
/// Fails with `InvalidBackReference` when a match reaches before the start of
/// the output.
pub fn decompress(tokens: &[Token]) -> Result<Vec<u8>> {
    decompress_bounded(tokens, usize::MAX)
}

/// Like [`decompress`], but fails with `CorruptStream` before the output
/// grows past `limit` bytes.
pub fn decompress_bounded(tokens: &[Token], limit: usize) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    for token in tokens {
        let length = match *token {
            Token::Literal(_) => 1,
            Token::Match { length, .. } => length,
        };
        let wanted = output.len().saturating_add(length);
        if wanted > limit {
            return Err(output_limit_exceeded(wanted, limit));
        }
        match *token {
            Token::Literal(byte) => output.push(byte),
            Token::Match { offset, length } => copy_match(&mut output, offset, length)?,
        }
    }
    Ok(output)
}

fn copy_match(output: &mut Vec<u8>, offset: usize, length: usize) -> Result<()> {
    if offset == 0 || offset > output.len() {
        return Err(Error::InvalidBackReference {
            reference: offset,
            available: output.len(),
        });
    }
    let start = output.len() - offset;
    output.reserve(length);
    // Byte by byte: when length > offset the source overlaps what is being written.
    for k in 0..length {
        let byte = output[start + k];
        output.push(byte);
    }
    Ok(())
}

/// Pack tokens with their parameters into bytes.
pub fn to_bytes(tokens: &[Token], params: &Lz77Params) -> Vec<u8> {
    let offset_bits = params.offset_bits();
    let length_bits = params.length_bits();
    let mut writer = BitWriter::new();
    for token in tokens {
        match *token {
            Token::Literal(byte) => {
                writer.write_bit(false);
                writer.write_bits(byte as u64, 8);
            }
            Token::Match { offset, length } => {
                writer.write_bit(true);
                writer.write_bits((offset - 1) as u64, offset_bits);
                writer.write_bits((length - params.min_match) as u64, length_bits);
            }
        }
    }
    let packed = writer.flush();

    let mut out = Vec::with_capacity(6 + packed.bytes.len());
    put_u16(&mut out, params.window_size as u16);
    out.push(params.min_match as u8);
    put_u16(&mut out, params.max_match as u16);
    out.push(packed.pad_bits);
    out.extend_from_slice(&packed.bytes);
    out
}

/// Read back the parameters and tokens written by [`to_bytes`].
pub fn from_bytes(data: &[u8]) -> Result<(Lz77Params, Vec<Token>)> {
    let mut header = ByteReader::new(data, "lz77 params");
    let params = Lz77Params {
        window_size: header.u16("window size")? as usize,
        min_match: header.u8("min match")? as usize,
        max_match: header.u16("max match")? as usize,
    };
    params.validate()?;
    let pad_bits = header.u8("pad length")?;
    let mut reader = BitReader::new(header.rest(), pad_bits)?;

    let offset_bits = params.offset_bits();
    let length_bits = params.length_bits();
    let mut tokens = Vec::new();
    while !reader.is_exhausted() {
        let token = read_token(&mut reader, &params, offset_bits, length_bits)
            .map_err(|e| e.into_truncated("lz77 token"))?;
        tokens.push(token);
    }
    Ok((params, tokens))
}

fn read_token(
    reader: &mut BitReader<'_>,
    params: &Lz77Params,
    offset_bits: usize,
    length_bits: usize,
) -> Result<Token> {
    if !reader.read_bit()? {
        return Ok(Token::Literal(reader.read_bits(8)? as u8));
    }
    let offset = reader.read_bits(offset_bits)? as usize + 1;
    let length = reader.read_bits(length_bits)? as usize + params.min_match;
    if offset > params.window_size {
        return Err(Error::InvalidBackReference {
            reference: offset,
            available: params.window_size,
        });
    }
    if length > params.max_match {
        return Err(Error::CorruptStream(format!(
            "match length {} exceeds maximum {}",
            length, params.max_match
        )));
    }
    Ok(Token::Match { offset, length })
}

/// LZ77 as a [`Compression`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz77Codec {
    params: Lz77Params,
}

impl Lz77Codec {
    pub fn new(params: Lz77Params) -> Self {
        Self { params }
    }
}

impl Compression for Lz77Codec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.params.validate()?;
        Ok(to_bytes(&compress(data, &self.params), &self.params))
    }

    /// Parameters are read from the stream, not from `self`.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompress_bounded(data, usize::MAX)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let (_, tokens) = from_bytes(data)?;
        decompress_bounded(&tokens, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rand::{Rng, SeedableRng};

    fn params(window_size: usize, max_match: usize) -> Lz77Params {
        Lz77Params {
            window_size,
            min_match: 3,
            max_match,
        }
    }

    #[test]
    fn test_empty_input() {
        let tokens = compress(b"", &Lz77Params::default());
        assert!(tokens.is_empty());
        assert_eq!(decompress(&tokens).unwrap(), b"");
    }

    #[test]
    fn test_no_repetition() {
        // When there is no repetition, every token should be a literal.
        let input = b"abcdefg";
        let tokens = compress(input, &params(16, 8));
        assert!(tokens.iter().all(|t| matches!(t, Token::Literal(_))));
        assert_eq!(decompress(&tokens).unwrap(), input);
    }

    #[test]
    fn test_repeated_pair() {
        let input = b"ABABABAB";
        let tokens = compress(input, &Lz77Params::default());
        assert_eq!(
            tokens,
            vec![
                Token::Literal(b'A'),
                Token::Literal(b'B'),
                Token::Match {
                    offset: 2,
                    length: 6
                },
            ]
        );
        assert_eq!(decompress(&tokens).unwrap(), input);
    }

    #[test]
    fn test_single_character_repetition() {
        let input = b"aaaaaaa";
        let tokens = compress(input, &params(16, 8));
        assert_eq!(
            tokens,
            vec![
                Token::Literal(b'a'),
                Token::Match {
                    offset: 1,
                    length: 6
                }
            ]
        );
        assert_eq!(decompress(&tokens).unwrap(), input);
    }

    #[test]
    fn test_prefers_closest_match() {
        // "abc" occurs at 0 and at 4; the copy at offset 4 is closer than 8
        let input = b"abcXabcYabc";
        let tokens = compress(input, &Lz77Params::default());
        assert_eq!(
            tokens.last(),
            Some(&Token::Match {
                offset: 4,
                length: 3
            })
        );
    }

    #[test]
    fn test_window_limits_offset() {
        let mut input = b"0123456789".to_vec();
        input.extend_from_slice(&[b'.'; 20]);
        input.extend_from_slice(b"0123456789");
        let tokens = compress(&input, &params(16, 64));
        for token in &tokens {
            if let Token::Match { offset, .. } = token {
                assert!(*offset <= 16);
            }
        }
        assert_eq!(decompress(&tokens).unwrap(), input);
    }

    #[test]
    fn test_match_length_capped() {
        let input = vec![b'z'; 100];
        let tokens = compress(&input, &params(16, 10));
        for token in &tokens {
            if let Token::Match { length, .. } = token {
                assert!(*length <= 10);
            }
        }
        assert_eq!(decompress(&tokens).unwrap(), input);
    }

    #[test]
    fn test_compress_decompress() {
        let input = b"abracadabra abracadabra";
        let tokens = compress(input, &params(16, 8));
        assert_eq!(decompress(&tokens).unwrap(), input);
    }

    #[test]
    fn test_longer_input() {
        let input = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
                      Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";
        let codec = Lz77Codec::new(params(32, 16));
        let packed = codec.compress(input).unwrap();
        assert_eq!(codec.decompress(&packed).unwrap(), input);
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let codec = Lz77Codec::default();
        for len in [1usize, 5, 300, 5000] {
            // Small alphabet so that matches actually occur
            let data: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'd')).collect();
            let packed = codec.compress(&data).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), data);
        }
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let data = b"the quick brown fox ".repeat(50);
        let packed = Lz77Codec::default().compress(&data).unwrap();
        assert!(packed.len() < data.len() / 4);
    }

    #[test]
    fn test_invalid_back_reference() {
        let tokens = [
            Token::Literal(b'a'),
            Token::Match {
                offset: 2,
                length: 3,
            },
        ];
        assert_eq!(
            decompress(&tokens),
            Err(Error::InvalidBackReference {
                reference: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_invalid_back_reference_in_stream() {
        // Craft a stream whose first token is a match
        let p = Lz77Params::default();
        let packed = to_bytes(
            &[Token::Match {
                offset: 5,
                length: 4,
            }],
            &p,
        );
        let err = Lz77Codec::default().decompress(&packed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBackReference);
    }

    #[test]
    fn test_truncated_stream() {
        let packed = Lz77Codec::default()
            .compress(b"some text that is long enough")
            .unwrap();
        let mut cut = packed[..packed.len() - 2].to_vec();
        // Claim no padding so the reader runs out mid-token
        cut[5] = 0;
        let err = Lz77Codec::default().decompress(&cut).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedStream);
    }

    #[test]
    fn test_bad_params() {
        let err = Lz77Codec::default().decompress(&[0, 0, 3, 0, 10, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptHeader);
        let err = Lz77Codec::default().decompress(&[0, 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptHeader);
    }

    #[test]
    fn test_bounded_stops_before_long_copy() {
        let tokens = [
            Token::Literal(b'a'),
            Token::Match {
                offset: 1,
                length: 1000,
            },
        ];
        assert_eq!(decompress_bounded(&tokens, 1001).unwrap(), vec![b'a'; 1001]);
        let err = decompress_bounded(&tokens, 1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptStream);

        let packed = Lz77Codec::default().compress(b"ABABABAB").unwrap();
        let err = Lz77Codec::default().decompress_bounded(&packed, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptStream);
        assert_eq!(
            Lz77Codec::default().decompress_bounded(&packed, 8).unwrap(),
            b"ABABABAB"
        );
    }
}
