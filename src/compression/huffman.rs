//! Huffman coding over bytes.
//!
//! The tree is built from byte frequencies by repeatedly merging the two
//! lightest nodes, with ties broken by insertion order so the same input
//! always yields the same code. Only the code lengths are kept: the encoder
//! assigns canonical codewords from them, and the decoder rebuilds an
//! identical code from the `(symbol, length)` pairs stored in the stream.
//!
//! Stream layout:
//!
//! ```text
//! varint  symbol count
//! u16     number of table entries (0..=256)
//! [u8;2]  (symbol, code length) per entry, ascending by symbol
//! u8      pad bits in the final byte
//! ...     packed codewords, MSB first
//! ```
//!
//! # Example
//!
//! ```
//! use codec_engine::compression::huffman::{compress, decompress};
//!
//! let data = b"this is an example for huffman encoding";
//! let packed = compress(data);
//! assert_eq!(decompress(&packed).unwrap(), data);
//! ```

use crate::compression::bitstream::{BitReader, BitWriter, PackedBits};
use crate::compression::wire::{put_u16, put_varint, ByteReader};
use crate::compression::{output_limit_exceeded, Compression, Result};
use crate::error::Error;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Longest codeword the bit writer can emit in one call.
pub const MAX_CODE_LENGTH: u8 = 64;

/// Occurrence count of every byte value in an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; 256],
}

impl FrequencyTable {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut counts = [0u64; 256];
        for &byte in data {
            counts[byte as usize] += 1;
        }
        Self { counts }
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of distinct byte values present.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Present symbols with their counts, in ascending symbol order.
    pub fn symbols(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(s, &c)| (s as u8, c))
    }

    /// Shannon entropy in bits per symbol.
    pub fn entropy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        self.symbols()
            .map(|(_, c)| {
                let p = c as f64 / total;
                -p * p.log2()
            })
            .sum()
    }

    /// Halves every count, keeping present symbols present.
    fn flattened(&self) -> Self {
        let mut counts = self.counts;
        for c in counts.iter_mut().filter(|c| **c > 0) {
            *c = (*c + 1) / 2;
        }
        Self { counts }
    }
}

/// Build a frequency table for `input`.
pub fn build_frequency_table(input: &[u8]) -> FrequencyTable {
    FrequencyTable::from_bytes(input)
}

/// A node in the Huffman tree arena. Children are arena indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanNode {
    Leaf { symbol: u8, freq: u64 },
    Internal { freq: u64, left: usize, right: usize },
}

impl HuffmanNode {
    /// Returns the frequency of the node.
    pub fn freq(&self) -> u64 {
        match self {
            HuffmanNode::Leaf { freq, .. } => *freq,
            HuffmanNode::Internal { freq, .. } => *freq,
        }
    }
}

/// Huffman tree stored as an arena of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<HuffmanNode>,
    root: usize,
}

impl HuffmanTree {
    pub fn root(&self) -> &HuffmanNode {
        &self.nodes[self.root]
    }

    pub fn node(&self, id: usize) -> Option<&HuffmanNode> {
        self.nodes.get(id)
    }

    /// Code length of every leaf, ascending by symbol.
    ///
    /// A tree made of a single leaf gets a 1-bit code.
    pub fn code_lengths(&self) -> Vec<(u8, u8)> {
        let mut lengths = Vec::new();
        let mut stack = vec![(self.root, 0u8)];
        while let Some((id, depth)) = stack.pop() {
            match self.nodes[id] {
                HuffmanNode::Leaf { symbol, .. } => lengths.push((symbol, depth.max(1))),
                HuffmanNode::Internal { left, right, .. } => {
                    stack.push((right, depth + 1));
                    stack.push((left, depth + 1));
                }
            }
        }
        lengths.sort_unstable_by_key(|&(symbol, _)| symbol);
        lengths
    }
}

/// Build the Huffman tree for a frequency table.
/// Returns `None` if the table is empty.
///
/// Nodes are keyed by `(frequency, insertion order)`; leaves are inserted in
/// symbol order and every merged node after all existing ones, so the arena
/// index doubles as the insertion order.
pub fn build_huffman_tree(freq_table: &FrequencyTable) -> Option<HuffmanTree> {
    let mut nodes = Vec::with_capacity(2 * freq_table.distinct());
    let mut heap = BinaryHeap::new();
    for (symbol, freq) in freq_table.symbols() {
        heap.push(Reverse((freq, nodes.len())));
        nodes.push(HuffmanNode::Leaf { symbol, freq });
    }
    loop {
        let Reverse((left_freq, left)) = heap.pop()?;
        let Some(Reverse((right_freq, right))) = heap.pop() else {
            return Some(HuffmanTree { nodes, root: left });
        };
        let freq = left_freq + right_freq;
        heap.push(Reverse((freq, nodes.len())));
        nodes.push(HuffmanNode::Internal { freq, left, right });
    }
}

/// A codeword: the low `len` bits of `bits`, sent high bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codeword {
    pub bits: u64,
    pub len: u8,
}

/// Canonical prefix code over bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanCode {
    lengths: Vec<(u8, u8)>,
    codes: [Option<Codeword>; 256],
}

impl HuffmanCode {
    /// Rebuilds a canonical code from `(symbol, length)` pairs.
    ///
    /// Fails with `CorruptHeader` on zero or oversized lengths, repeated
    /// symbols, or lengths that violate the Kraft inequality.
    pub fn from_lengths(lengths: &[(u8, u8)]) -> Result<Self> {
        let mut seen = [false; 256];
        let mut kraft: u128 = 0;
        for &(symbol, len) in lengths {
            if len == 0 || len > MAX_CODE_LENGTH {
                return Err(Error::CorruptHeader(format!(
                    "code length {} for symbol {} outside 1..={}",
                    len, symbol, MAX_CODE_LENGTH
                )));
            }
            if std::mem::replace(&mut seen[symbol as usize], true) {
                return Err(Error::CorruptHeader(format!(
                    "symbol {} listed twice in code table",
                    symbol
                )));
            }
            kraft += 1u128 << (MAX_CODE_LENGTH - len);
        }
        if kraft > 1u128 << MAX_CODE_LENGTH {
            return Err(Error::CorruptHeader(
                "code lengths violate the Kraft inequality".to_string(),
            ));
        }
        Ok(Self::canonical(lengths))
    }

    fn canonical(lengths: &[(u8, u8)]) -> Self {
        let mut order = lengths.to_vec();
        order.sort_unstable_by_key(|&(symbol, len)| (len, symbol));

        let mut codes = [None; 256];
        let mut code = 0u64;
        let mut prev_len = order.first().map_or(0, |&(_, len)| len);
        for &(symbol, len) in &order {
            code <<= len - prev_len;
            codes[symbol as usize] = Some(Codeword { bits: code, len });
            code = code.wrapping_add(1);
            prev_len = len;
        }

        let mut lengths = lengths.to_vec();
        lengths.sort_unstable_by_key(|&(symbol, _)| symbol);
        Self { lengths, codes }
    }

    pub fn get(&self, symbol: u8) -> Option<Codeword> {
        self.codes[symbol as usize]
    }

    /// `(symbol, length)` pairs, ascending by symbol.
    pub fn lengths(&self) -> &[(u8, u8)] {
        &self.lengths
    }
}

/// Build the canonical code for `freq_table`, flattening the counts until no
/// codeword exceeds [`MAX_CODE_LENGTH`]. Returns `None` for an empty table.
pub fn build_code_table(freq_table: &FrequencyTable) -> Option<HuffmanCode> {
    let mut freq = freq_table.clone();
    loop {
        let lengths = build_huffman_tree(&freq)?.code_lengths();
        if lengths.iter().all(|&(_, len)| len <= MAX_CODE_LENGTH) {
            return Some(HuffmanCode::canonical(&lengths));
        }
        freq = freq.flattened();
    }
}

/// Code table plus the packed codewords for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanEncoded {
    /// Number of symbols the bit stream decodes to
    pub symbol_count: u64,
    /// `(symbol, length)` pairs, ascending by symbol
    pub lengths: Vec<(u8, u8)>,
    pub bits: PackedBits,
}

impl HuffmanEncoded {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + 2 * self.lengths.len() + self.bits.bytes.len());
        put_varint(&mut out, self.symbol_count);
        put_u16(&mut out, self.lengths.len() as u16);
        for &(symbol, len) in &self.lengths {
            out.push(symbol);
            out.push(len);
        }
        out.push(self.bits.pad_bits);
        out.extend_from_slice(&self.bits.bytes);
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data, "huffman table");
        let symbol_count = reader.varint("symbol count")?;
        let entries = reader.u16("table length")? as usize;
        if entries > 256 {
            return Err(Error::CorruptHeader(format!(
                "huffman table lists {} symbols",
                entries
            )));
        }
        let mut lengths = Vec::with_capacity(entries);
        for _ in 0..entries {
            let symbol = reader.u8("table symbol")?;
            let len = reader.u8("code length")?;
            lengths.push((symbol, len));
        }
        let pad_bits = reader.u8("pad length")?;
        Ok(Self {
            symbol_count,
            lengths,
            bits: PackedBits {
                bytes: reader.rest().to_vec(),
                pad_bits,
            },
        })
    }
}

/// Encode `input` into a code table and a packed bit stream.
pub fn encode(input: &[u8]) -> HuffmanEncoded {
    let freq = build_frequency_table(input);
    let Some(code) = build_code_table(&freq) else {
        return HuffmanEncoded {
            symbol_count: 0,
            lengths: Vec::new(),
            bits: PackedBits::default(),
        };
    };

    let total_bits: u64 = code
        .lengths()
        .iter()
        .map(|&(symbol, len)| freq.count(symbol) * len as u64)
        .sum();
    let mut writer = BitWriter::with_capacity(total_bits as usize);
    for &byte in input {
        if let Some(word) = code.get(byte) {
            writer.write_bits(word.bits, word.len as usize);
        }
    }

    HuffmanEncoded {
        symbol_count: input.len() as u64,
        lengths: code.lengths().to_vec(),
        bits: writer.flush(),
    }
}

/// Prefix-code trie used for bit-by-bit decoding. Child index 0 means "no
/// child", which is safe because the root is never anyone's child.
struct DecodeTree {
    nodes: Vec<DecodeNode>,
}

#[derive(Clone, Copy, Default)]
struct DecodeNode {
    children: [usize; 2],
    symbol: Option<u8>,
}

impl DecodeTree {
    fn from_code(code: &HuffmanCode) -> Self {
        let mut nodes = vec![DecodeNode::default()];
        for &(symbol, _) in code.lengths() {
            let Some(word) = code.get(symbol) else {
                continue;
            };
            let mut node = 0;
            for shift in (0..word.len).rev() {
                let bit = ((word.bits >> shift) & 1) as usize;
                if nodes[node].children[bit] == 0 {
                    nodes[node].children[bit] = nodes.len();
                    nodes.push(DecodeNode::default());
                }
                node = nodes[node].children[bit];
            }
            nodes[node].symbol = Some(symbol);
        }
        Self { nodes }
    }

    fn read_symbol(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let mut node = 0;
        loop {
            if let Some(symbol) = self.nodes[node].symbol {
                return Ok(symbol);
            }
            let bit = reader.read_bit()? as usize;
            node = self.nodes[node].children[bit];
            if node == 0 {
                return Err(Error::CorruptStream(
                    "bit pattern does not match any huffman code".to_string(),
                ));
            }
        }
    }
}

/// Decode a table and bit stream produced by [`encode`].
pub fn decode(encoded: &HuffmanEncoded) -> Result<Vec<u8>> {
    decode_bounded(encoded, usize::MAX)
}

/// Like [`decode`], but fails with `CorruptStream` if more than `limit`
/// symbols are declared.
pub fn decode_bounded(encoded: &HuffmanEncoded, limit: usize) -> Result<Vec<u8>> {
    if encoded.symbol_count > limit as u64 {
        return Err(output_limit_exceeded(
            usize::try_from(encoded.symbol_count).unwrap_or(usize::MAX),
            limit,
        ));
    }
    if encoded.symbol_count == 0 {
        return Ok(Vec::new());
    }
    if encoded.lengths.is_empty() {
        return Err(Error::CorruptHeader(format!(
            "{} symbols declared with an empty code table",
            encoded.symbol_count
        )));
    }
    let code = HuffmanCode::from_lengths(&encoded.lengths)?;
    let tree = DecodeTree::from_code(&code);
    let mut reader = BitReader::new(&encoded.bits.bytes, encoded.bits.pad_bits)?;

    // Every codeword is at least one bit long.
    if encoded.symbol_count > reader.remaining() as u64 {
        return Err(Error::TruncatedStream(format!(
            "{} symbols declared but only {} bits present",
            encoded.symbol_count,
            reader.remaining()
        )));
    }

    let mut output = Vec::with_capacity(encoded.symbol_count as usize);
    for _ in 0..encoded.symbol_count {
        let symbol = tree
            .read_symbol(&mut reader)
            .map_err(|e| e.into_truncated("huffman body"))?;
        output.push(symbol);
    }
    if !reader.is_exhausted() {
        return Err(Error::CorruptStream(format!(
            "{} unused bits after the last huffman symbol",
            reader.remaining()
        )));
    }
    Ok(output)
}

/// Convenience function: encodes `input` and serializes table and body.
pub fn compress(input: &[u8]) -> Vec<u8> {
    encode(input).to_bytes()
}

/// Convenience function: parses and decodes the output of [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_bounded(data, usize::MAX)
}

/// Parses and decodes at most `limit` symbols.
pub fn decompress_bounded(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    decode_bounded(&HuffmanEncoded::parse(data)?, limit)
}

/// Huffman coding as a [`Compression`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HuffmanCodec;

impl Compression for HuffmanCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(compress(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        decompress(data)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        decompress_bounded(data, limit)
    }
}
