//! Self-describing header placed in front of every compressed buffer.
//!
//! ```text
//! u8   format version
//! u8   codec id
//! u8   quality (0 for lossless output)
//! u8   content class tag
//! u64  original length, big-endian
//! ```
//!
//! Codec parameters and payload follow, in the codec's own layout.

use crate::compression::wire::{put_u64, ByteReader};
use crate::compression::Result;
use crate::config::{ContentClass, Mode, Quality};
use crate::error::Error;
use std::fmt;

/// Current header version.
pub const FORMAT_VERSION: u8 = 1;
/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 12;

/// Every codec the engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    Huffman,
    Rle,
    Lz77,
    Lz78,
    BlockTransform,
}

impl CodecKind {
    pub const ALL: [CodecKind; 5] = [
        CodecKind::Huffman,
        CodecKind::Rle,
        CodecKind::Lz77,
        CodecKind::Lz78,
        CodecKind::BlockTransform,
    ];

    /// Identifier written to the header.
    pub fn id(&self) -> u8 {
        match self {
            CodecKind::Huffman => 1,
            CodecKind::Rle => 2,
            CodecKind::Lz77 => 3,
            CodecKind::Lz78 => 4,
            CodecKind::BlockTransform => 5,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| Error::CorruptHeader(format!("unknown codec id {}", id)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CodecKind::Huffman => "Huffman",
            CodecKind::Rle => "RLE",
            CodecKind::Lz77 => "LZ77",
            CodecKind::Lz78 => "LZ78",
            CodecKind::BlockTransform => "DCT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CodecKind::Huffman => "Huffman coding with a canonical code table",
            CodecKind::Rle => "Run-length encoding of repeated bytes",
            CodecKind::Lz77 => "LZ77 sliding-window back references",
            CodecKind::Lz78 => "LZ78 incremental dictionary phrases",
            CodecKind::BlockTransform => {
                "Discrete Cosine Transform (DCT) with quality-scaled quantization and Huffman coding"
            }
        }
    }

    /// Whether the codec can serve a request in `mode`.
    pub fn supports(&self, mode: Mode) -> bool {
        match self {
            CodecKind::BlockTransform => mode == Mode::Lossy,
            CodecKind::Huffman | CodecKind::Rle | CodecKind::Lz77 | CodecKind::Lz78 => true,
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded form of the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub codec: CodecKind,
    /// `None` for lossless output
    pub quality: Option<Quality>,
    pub content_class: ContentClass,
    /// Input length; for lossy output this is the length before normalization
    pub original_length: u64,
}

impl Header {
    pub fn new(
        codec: CodecKind,
        quality: Option<Quality>,
        content_class: ContentClass,
        original_length: u64,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            codec,
            quality,
            content_class,
            original_length,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.quality {
            Some(_) => Mode::Lossy,
            None => Mode::Lossless,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        out.push(self.codec.id());
        out.push(self.quality.map_or(0, |q| q.get()));
        out.push(self.content_class.tag());
        put_u64(out, self.original_length);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        self.write_to(&mut out);
        out
    }

    /// Splits `data` into its header and the codec body that follows it.
    pub fn parse(data: &[u8]) -> Result<(Header, &[u8])> {
        let mut reader = ByteReader::new(data, "header");
        let version = reader.u8("format version")?;
        if version != FORMAT_VERSION {
            return Err(Error::CorruptHeader(format!(
                "unsupported format version {}",
                version
            )));
        }
        let codec = CodecKind::from_id(reader.u8("codec id")?)?;
        let quality = match reader.u8("quality")? {
            0 => None,
            q => Some(
                Quality::new(q as u32).map_err(|e| Error::CorruptHeader(e.to_string()))?,
            ),
        };
        let content_class = ContentClass::from_tag(reader.u8("content class")?)
            .map_err(|e| Error::CorruptHeader(e.to_string()))?;
        let original_length = reader.u64("original length")?;

        let header = Header {
            version,
            codec,
            quality,
            content_class,
            original_length,
        };
        if !codec.supports(header.mode()) {
            return Err(Error::CorruptHeader(format!(
                "{} stream marked {}",
                codec,
                header.mode()
            )));
        }
        Ok((header, reader.rest()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_header_round_trip() {
        for codec in CodecKind::ALL {
            for class in [ContentClass::Text, ContentClass::ImageBlock] {
                let quality = if codec == CodecKind::BlockTransform {
                    Some(Quality::new(37).unwrap())
                } else {
                    None
                };
                let header = Header::new(codec, quality, class, 123_456_789);
                let mut bytes = header.to_bytes();
                assert_eq!(bytes.len(), HEADER_LEN);
                bytes.extend_from_slice(b"body");

                let (parsed, body) = Header::parse(&bytes).unwrap();
                assert_eq!(parsed, header);
                assert_eq!(body, b"body");
            }
        }
    }

    #[test]
    fn test_layout() {
        let header = Header::new(
            CodecKind::Lz77,
            None,
            ContentClass::ImageBlock,
            0x0102,
        );
        assert_eq!(header.to_bytes(), vec![1, 3, 0, 2, 0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_codec_ids_unique() {
        for (i, a) in CodecKind::ALL.iter().enumerate() {
            assert_eq!(CodecKind::from_id(a.id()).unwrap(), *a);
            for b in &CodecKind::ALL[i + 1..] {
                assert_ne!(a.id(), b.id());
            }
        }
    }

    #[test]
    fn test_rejects_bad_fields() {
        let good = Header::new(CodecKind::Huffman, None, ContentClass::Text, 5).to_bytes();

        let mut bad = good.clone();
        bad[0] = 2;
        assert_eq!(Header::parse(&bad).unwrap_err().kind(), ErrorKind::CorruptHeader);

        let mut bad = good.clone();
        bad[1] = 99;
        assert_eq!(Header::parse(&bad).unwrap_err().kind(), ErrorKind::CorruptHeader);

        let mut bad = good.clone();
        bad[2] = 101;
        assert_eq!(Header::parse(&bad).unwrap_err().kind(), ErrorKind::CorruptHeader);

        let mut bad = good.clone();
        bad[3] = 7;
        assert_eq!(Header::parse(&bad).unwrap_err().kind(), ErrorKind::CorruptHeader);

        assert_eq!(
            Header::parse(&good[..HEADER_LEN - 1]).unwrap_err().kind(),
            ErrorKind::CorruptHeader
        );
    }

    #[test]
    fn test_lossless_block_transform_rejected() {
        let mut bytes = Header::new(CodecKind::Huffman, None, ContentClass::ImageBlock, 0).to_bytes();
        bytes[1] = CodecKind::BlockTransform.id();
        assert_eq!(Header::parse(&bytes).unwrap_err().kind(), ErrorKind::CorruptHeader);
    }
}
