pub mod compression;
pub mod config;
pub mod error;

pub use compression::{CodecKind, CompressionResult, Compressor, Header};
pub use config::{CompressionConfig, ContentClass, EngineConfig, Mode, Quality};
pub use error::{Error, ErrorKind, Result};

/// Compresses `data` with the default engine settings.
///
/// `quality` is validated before any work is done.
///
/// # Example
///
/// ```
/// use codec_engine::{compress, decompress, ContentClass, Mode};
///
/// let (packed, result) = compress(b"", Mode::Lossless, 50, ContentClass::Text).unwrap();
/// assert!(result.compressed_size > 0);
/// assert_eq!(decompress(&packed).unwrap(), b"");
/// ```
pub fn compress(
    data: &[u8],
    mode: Mode,
    quality: u32,
    content_class: ContentClass,
) -> Result<(Vec<u8>, CompressionResult)> {
    let config = CompressionConfig::new(mode, quality, content_class)?;
    Compressor::default().compress(data, &config)
}

/// Decompresses the output of [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Compressor::default().decompress(data)
}
