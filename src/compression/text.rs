//! Lossy text normalization.
//!
//! Text is simplified before entropy coding, more aggressively as quality
//! drops:
//!
//! | quality | whitespace runs | ASCII punctuation | case       |
//! |---------|-----------------|-------------------|------------|
//! | 70..    | one space       | kept              | kept       |
//! | 50..70  | one space       | removed           | kept       |
//! | ..50    | one space       | removed           | lowercased |
//!
//! Only ASCII bytes are rewritten, so valid UTF-8 stays valid UTF-8.

use crate::compression::header::CodecKind;
use crate::compression::huffman::{build_code_table, FrequencyTable};
use crate::compression::rle;
use crate::compression::wire::varint_len;
use crate::config::Quality;

/// Below this quality punctuation is dropped.
pub const PUNCTUATION_THRESHOLD: u8 = 70;
/// Below this quality text is lowercased.
pub const LOWERCASE_THRESHOLD: u8 = 50;

fn is_space(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0x0b
}

fn is_punctuation(byte: u8) -> bool {
    byte.is_ascii_punctuation() && byte != b'_'
}

/// Applies the normalization rules for `quality`.
///
/// # Example
///
/// ```
/// use codec_engine::compression::text::normalize;
/// use codec_engine::config::Quality;
///
/// let text = b"Hello,   World!\n\nBye.";
/// assert_eq!(normalize(text, Quality::new(90).unwrap()), b"Hello, World! Bye.");
/// assert_eq!(normalize(text, Quality::new(60).unwrap()), b"Hello World Bye");
/// assert_eq!(normalize(text, Quality::new(10).unwrap()), b"hello world bye");
/// ```
pub fn normalize(input: &[u8], quality: Quality) -> Vec<u8> {
    let strip_punctuation = quality.get() < PUNCTUATION_THRESHOLD;
    let lowercase = quality.get() < LOWERCASE_THRESHOLD;

    let mut out = Vec::with_capacity(input.len());
    let mut in_space = false;
    for &byte in input {
        if is_space(byte) {
            if !in_space {
                out.push(b' ');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if strip_punctuation && is_punctuation(byte) {
            continue;
        }
        out.push(if lowercase {
            byte.to_ascii_lowercase()
        } else {
            byte
        });
    }
    out
}

/// Exact Huffman output size computed from the code lengths, without packing
/// bits.
pub fn estimated_huffman_len(input: &[u8]) -> usize {
    let freq = FrequencyTable::from_bytes(input);
    let Some(code) = build_code_table(&freq) else {
        return 4;
    };
    let bits: u64 = code
        .lengths()
        .iter()
        .map(|&(symbol, len)| freq.count(symbol) * len as u64)
        .sum();
    // count varint + table length + pairs + pad byte
    varint_len(input.len() as u64) + 2 + 2 * code.lengths().len() + 1 + bits.div_ceil(8) as usize
}

/// Exact RLE output size, run cap byte included.
pub fn estimated_rle_len(input: &[u8], max_run: u8) -> usize {
    1 + rle::encoded_len(input, max_run)
}

/// Picks the cheaper entropy coder for normalized text. Ties go to Huffman.
pub fn choose_codec(normalized: &[u8], max_run: u8) -> CodecKind {
    if estimated_rle_len(normalized, max_run) < estimated_huffman_len(normalized) {
        CodecKind::Rle
    } else {
        CodecKind::Huffman
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::huffman;

    fn q(value: u32) -> Quality {
        Quality::new(value).unwrap()
    }

    #[test]
    fn test_whitespace_always_collapsed() {
        let text = b"a \t\r\n\x0b\x0cb   c";
        assert_eq!(normalize(text, q(100)), b"a b c");
        assert_eq!(normalize(text, q(1)), b"a b c");
    }

    #[test]
    fn test_thresholds() {
        let text = b"Don't PANIC, snake_case!";
        assert_eq!(normalize(text, q(70)), text.to_vec());
        assert_eq!(normalize(text, q(69)), b"Dont PANIC snake_case");
        assert_eq!(normalize(text, q(50)), b"Dont PANIC snake_case");
        assert_eq!(normalize(text, q(49)), b"dont panic snake_case");
    }

    #[test]
    fn test_utf8_preserved() {
        let text = "Ünïcödé,  TEXT ß ok!";
        let out = normalize(text.as_bytes(), q(10));
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "Ünïcödé text ß ok");
    }

    #[test]
    fn test_empty() {
        assert!(normalize(b"", q(10)).is_empty());
    }

    #[test]
    fn test_choice() {
        assert_eq!(choose_codec(&[b'z'; 4000], 255), CodecKind::Rle);
        let prose = b"the quick brown fox jumps over the lazy dog ".repeat(20);
        assert_eq!(choose_codec(&prose, 255), CodecKind::Huffman);
    }

    #[test]
    fn test_huffman_estimate_is_exact() {
        let inputs = [
            Vec::new(),
            b"x".to_vec(),
            b"aaaabbbcc".to_vec(),
            b"the quick brown fox jumps over the lazy dog ".repeat(20),
            (0..=255u8).cycle().take(20_000).collect(),
        ];
        for input in inputs {
            assert_eq!(
                estimated_huffman_len(&input),
                huffman::compress(&input).len(),
                "{} bytes",
                input.len()
            );
        }
        assert_eq!(estimated_huffman_len(b""), 4);
    }

    #[test]
    fn test_rle_estimate_is_exact() {
        use crate::compression::Compression;

        let data = b"aaaabbbccccccccd";
        let codec = rle::RleCodec::new(255);
        assert_eq!(estimated_rle_len(data, 255), codec.compress(data).unwrap().len());
    }
}
