//! LZ78 incremental-dictionary compression.
//!
//! The dictionary is a trie: entry 0 is the empty phrase and every other entry
//! is `(parent entry, byte)`. Once it reaches its cap the dictionary freezes and
//! later tokens only refer to existing entries. Encoder and decoder apply the
//! same rule, so no reset marker is needed.
//!
//! Packed layout:
//!
//! ```text
//! varint  dictionary cap
//! varint  token count
//! u8      1 if the last token has no trailing byte
//! u8      pad bits
//! ...     per token: index (width grows with the dictionary), then 8-bit byte
//! ```

use crate::compression::bitstream::{bits_for, BitReader, BitWriter};
use crate::compression::wire::{put_varint, ByteReader};
use crate::compression::{output_limit_exceeded, Compression, Result};
use crate::config::DEFAULT_LZ78_DICT_CAP;
use crate::error::Error;
use std::collections::HashMap;

/// An LZ78 token.
///
/// Each token is a pair (index, next), where:
/// - `index` is the dictionary index of the longest previously seen phrase that is a prefix of the current input.
/// - `next` is the next byte that did not match (or `None` if the input ended exactly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub index: usize,
    pub next: Option<u8>,
}

/// Compress input data using the LZ78 algorithm.
///
/// # Algorithm
///
/// 1. Start with a dictionary containing only the empty phrase at index 0.
/// 2. Follow the longest phrase `w` already in the dictionary.
/// 3. Let `c` be the next byte (if any). Output the token `(index(w), c)`.
/// 4. Insert `w+c` at the next free index, unless the dictionary is full.
/// 5. If the input ends exactly on a phrase, output a token with `next = None`.
///
/// # Example
///
/// ```
/// use codec_engine::compression::lz78::{compress, decompress};
///
/// let data = b"TOBEORNOTTOBE";
/// let tokens = compress(data, 1 << 16);
/// assert_eq!(decompress(&tokens, 1 << 16).unwrap(), data);
/// ```
pub fn compress(input: &[u8], dict_cap: usize) -> Vec<Token> {
    let mut edges: HashMap<(usize, u8), usize> = HashMap::new();
    let mut dict_len = 1;
    let mut tokens = Vec::new();

    let mut current = 0;
    for &byte in input {
        if let Some(&child) = edges.get(&(current, byte)) {
            current = child;
            continue;
        }
        tokens.push(Token {
            index: current,
            next: Some(byte),
        });
        if dict_len < dict_cap {
            edges.insert((current, byte), dict_len);
            dict_len += 1;
        }
        current = 0;
    }
    if current != 0 {
        tokens.push(Token {
            index: current,
            next: None,
        });
    }
    tokens
}

/// Decompress a sequence of LZ78 tokens back into the original data.
///
/// Fails with `InvalidBackReference` if a token names an entry that does not
/// exist yet.
pub fn decompress(tokens: &[Token], dict_cap: usize) -> Result<Vec<u8>> {
    decompress_bounded(tokens, dict_cap, usize::MAX)
}

/// Like [`decompress`], but fails with `CorruptStream` before the output
/// grows past `limit` bytes.
pub fn decompress_bounded(tokens: &[Token], dict_cap: usize, limit: usize) -> Result<Vec<u8>> {
    // (parent, byte, phrase length); entry 0 is the empty phrase
    let mut dict: Vec<(usize, u8, usize)> = vec![(0, 0, 0)];
    let mut output = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let Some(&(_, _, phrase_len)) = dict.get(token.index) else {
            return Err(Error::InvalidBackReference {
                reference: token.index,
                available: dict.len(),
            });
        };
        let start = output.len();
        let wanted = start
            .saturating_add(phrase_len)
            .saturating_add(token.next.is_some() as usize);
        if wanted > limit {
            return Err(output_limit_exceeded(wanted, limit));
        }
        output.resize(start + phrase_len, 0);
        let mut entry = token.index;
        for slot in output[start..].iter_mut().rev() {
            let (parent, byte, _) = dict[entry];
            *slot = byte;
            entry = parent;
        }
        match token.next {
            Some(byte) => {
                output.push(byte);
                if dict.len() < dict_cap {
                    dict.push((token.index, byte, phrase_len + 1));
                }
            }
            None if i + 1 == tokens.len() => {}
            None => {
                return Err(Error::CorruptStream(format!(
                    "token {} has no trailing byte but is not the last",
                    i
                )));
            }
        }
    }
    Ok(output)
}

/// Pack tokens into bytes.
pub fn to_bytes(tokens: &[Token], dict_cap: usize) -> Vec<u8> {
    let mut writer = BitWriter::new();
    let mut dict_len = 1usize;
    for token in tokens {
        writer.write_bits(token.index as u64, bits_for(dict_len as u64 - 1));
        if let Some(byte) = token.next {
            writer.write_bits(byte as u64, 8);
        }
        if dict_len < dict_cap {
            dict_len += 1;
        }
    }
    let packed = writer.flush();
    let open_tail = tokens.last().is_some_and(|t| t.next.is_none());

    let mut out = Vec::with_capacity(8 + packed.bytes.len());
    put_varint(&mut out, dict_cap as u64);
    put_varint(&mut out, tokens.len() as u64);
    out.push(open_tail as u8);
    out.push(packed.pad_bits);
    out.extend_from_slice(&packed.bytes);
    out
}

/// Read back tokens and the dictionary cap written by [`to_bytes`].
pub fn from_bytes(data: &[u8]) -> Result<(usize, Vec<Token>)> {
    let mut header = ByteReader::new(data, "lz78 params");
    let dict_cap = header.varint_usize("dictionary cap", 1 << 24)?;
    if dict_cap < 2 {
        return Err(Error::CorruptHeader(format!(
            "lz78 dictionary cap {}",
            dict_cap
        )));
    }
    let count = header.varint_usize("token count", usize::MAX)?;
    let open_tail = match header.u8("tail flag")? {
        0 => false,
        1 => true,
        other => {
            return Err(Error::CorruptHeader(format!("lz78 tail flag {}", other)));
        }
    };
    let pad_bits = header.u8("pad length")?;
    let mut reader = BitReader::new(header.rest(), pad_bits)?;

    // Every token occupies at least one bit.
    if count > reader.remaining() {
        return Err(Error::TruncatedStream(format!(
            "{} lz78 tokens declared but only {} bits present",
            count,
            reader.remaining()
        )));
    }

    let mut tokens = Vec::with_capacity(count);
    let mut dict_len = 1usize;
    for i in 0..count {
        let token = read_token(&mut reader, dict_len, open_tail && i + 1 == count)
            .map_err(|e| e.into_truncated("lz78 token"))?;
        tokens.push(token);
        if dict_len < dict_cap {
            dict_len += 1;
        }
    }
    if !reader.is_exhausted() {
        return Err(Error::CorruptStream(format!(
            "{} unused bits after the last lz78 token",
            reader.remaining()
        )));
    }
    Ok((dict_cap, tokens))
}

fn read_token(reader: &mut BitReader<'_>, dict_len: usize, last_open: bool) -> Result<Token> {
    let index = reader.read_bits(bits_for(dict_len as u64 - 1))? as usize;
    let next = if last_open {
        None
    } else {
        Some(reader.read_bits(8)? as u8)
    };
    Ok(Token { index, next })
}

/// LZ78 as a [`Compression`] implementation.
#[derive(Debug, Clone, Copy)]
pub struct Lz78Codec {
    dict_cap: usize,
}

impl Lz78Codec {
    pub fn new(dict_cap: usize) -> Self {
        Self {
            dict_cap: dict_cap.max(2),
        }
    }
}

impl Default for Lz78Codec {
    fn default() -> Self {
        Self::new(DEFAULT_LZ78_DICT_CAP)
    }
}

impl Compression for Lz78Codec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(to_bytes(&compress(data, self.dict_cap), self.dict_cap))
    }

    /// The dictionary cap is read from the stream.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompress_bounded(data, usize::MAX)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let (dict_cap, tokens) = from_bytes(data)?;
        decompress_bounded(&tokens, dict_cap, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const CAP: usize = DEFAULT_LZ78_DICT_CAP;

    #[test]
    fn test_empty_input() {
        let tokens = compress(b"", CAP);
        // For empty input, expect no tokens.
        assert!(tokens.is_empty());
        assert_eq!(decompress(&tokens, CAP).unwrap(), b"");
        let codec = Lz78Codec::default();
        assert_eq!(codec.decompress(&codec.compress(b"").unwrap()).unwrap(), b"");
    }

    #[test]
    fn test_single_character() {
        let input = b"AAAAAA";
        let tokens = compress(input, CAP);
        // A, AA, AAA
        assert_eq!(
            tokens,
            vec![
                Token { index: 0, next: Some(b'A') },
                Token { index: 1, next: Some(b'A') },
                Token { index: 2, next: Some(b'A') },
            ]
        );
        assert_eq!(decompress(&tokens, CAP).unwrap(), input);
    }

    #[test]
    fn test_open_tail() {
        let input = b"ABA";
        let tokens = compress(input, CAP);
        assert_eq!(tokens.last(), Some(&Token { index: 1, next: None }));
        assert_eq!(decompress(&tokens, CAP).unwrap(), input);
        let codec = Lz78Codec::default();
        assert_eq!(codec.decompress(&codec.compress(input).unwrap()).unwrap(), input);
    }

    #[test]
    fn test_simple_string() {
        let input = b"TOBEORNOTTOBE";
        let codec = Lz78Codec::default();
        let packed = codec.compress(input).unwrap();
        assert_eq!(codec.decompress(&packed).unwrap(), input);
    }

    #[test]
    fn test_longer_input() {
        let input = b"abracadabra abracadabra abracadabra";
        let tokens = compress(input, CAP);
        assert!(tokens.len() < input.len());
        assert_eq!(decompress(&tokens, CAP).unwrap(), input);
    }

    #[test]
    fn test_non_ascii() {
        let input = "这是一段测试".as_bytes();
        let codec = Lz78Codec::default();
        assert_eq!(codec.decompress(&codec.compress(input).unwrap()).unwrap(), input);
    }

    #[test]
    fn test_frozen_dictionary() {
        let input = b"abcabcabcabcabcabcabcabcabcabc".repeat(4);
        let codec = Lz78Codec::new(4);
        let packed = codec.compress(&input).unwrap();
        let (cap, tokens) = from_bytes(&packed).unwrap();
        assert_eq!(cap, 4);
        assert!(tokens.iter().all(|t| t.index < 4));
        assert_eq!(codec.decompress(&packed).unwrap(), input);
    }

    #[test]
    fn test_invalid_back_reference() {
        let tokens = [
            Token { index: 0, next: Some(b'x') },
            Token { index: 5, next: Some(b'y') },
        ];
        assert_eq!(
            decompress(&tokens, CAP).unwrap_err().kind(),
            ErrorKind::InvalidBackReference
        );
    }

    #[test]
    fn test_open_token_must_be_last() {
        let tokens = [
            Token { index: 0, next: Some(b'x') },
            Token { index: 1, next: None },
            Token { index: 0, next: Some(b'y') },
        ];
        assert_eq!(
            decompress(&tokens, CAP).unwrap_err().kind(),
            ErrorKind::CorruptStream
        );
    }

    #[test]
    fn test_truncated_stream() {
        let packed = Lz78Codec::default()
            .compress(b"a moderately long sentence for lz78")
            .unwrap();
        let cut = &packed[..packed.len() - 3];
        let err = Lz78Codec::default().decompress(cut).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedStream);
    }

    #[test]
    fn test_bounded_output() {
        let input = b"abababababababab";
        let tokens = compress(input, CAP);
        assert_eq!(decompress_bounded(&tokens, CAP, input.len()).unwrap(), input);
        let err = decompress_bounded(&tokens, CAP, input.len() - 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptStream);
    }
}
