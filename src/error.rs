//! Error types shared by every codec and the orchestrator.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating a request or decoding a compressed stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Quality outside 1..=100
    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u32),

    /// Content class name, extension or tag the engine does not handle
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// A codec was asked to run in a mode it cannot honour
    #[error("codec {codec} does not support {mode} mode")]
    UnsupportedModeForCodec {
        codec: &'static str,
        mode: &'static str,
    },

    /// Header or codec parameters are malformed
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// The payload ended before the expected amount of data was decoded
    #[error("truncated stream: {0}")]
    TruncatedStream(String),

    /// A match offset or dictionary index points outside the data produced so far
    #[error("invalid back reference: {reference} exceeds {available} available")]
    InvalidBackReference { reference: usize, available: usize },

    /// Payload is structurally invalid
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// A bit read would consume more bits than remain
    #[error("insufficient data: requested {requested} bits, {remaining} remaining")]
    InsufficientData { requested: usize, remaining: usize },

    /// Engine tuning parameters out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Fieldless discriminant of [`Error`], convenient for mapping to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidQuality,
    UnsupportedContentType,
    UnsupportedModeForCodec,
    CorruptHeader,
    TruncatedStream,
    InvalidBackReference,
    CorruptStream,
    InsufficientData,
    InvalidConfig,
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidQuality(_) => ErrorKind::InvalidQuality,
            Error::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            Error::UnsupportedModeForCodec { .. } => ErrorKind::UnsupportedModeForCodec,
            Error::CorruptHeader(_) => ErrorKind::CorruptHeader,
            Error::TruncatedStream(_) => ErrorKind::TruncatedStream,
            Error::InvalidBackReference { .. } => ErrorKind::InvalidBackReference,
            Error::CorruptStream(_) => ErrorKind::CorruptStream,
            Error::InsufficientData { .. } => ErrorKind::InsufficientData,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// True for errors raised while validating a request, before any encoding.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidQuality
                | ErrorKind::UnsupportedContentType
                | ErrorKind::UnsupportedModeForCodec
                | ErrorKind::InvalidConfig
        )
    }

    /// Re-labels a bit-level underflow as a truncated codec payload.
    pub(crate) fn into_truncated(self, context: &str) -> Error {
        match self {
            Error::InsufficientData {
                requested,
                remaining,
            } => Error::TruncatedStream(format!(
                "{}: needed {} more bits, {} left",
                context, requested, remaining
            )),
            other => other,
        }
    }
}
