//! Error type shared by every codec and transform.

use thiserror::Error;

/// Errors produced while decoding, encoding or transforming images.
///
/// Every operation either returns a complete value or one of these; no
/// partially populated buffer is ever handed back.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec matches the sniffed bytes or the target file extension.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The data is truncated or structurally invalid.
    #[error("Corrupt image data: {0}")]
    CorruptData(String),

    /// The format is recognized but uses a feature this crate does not handle.
    #[error("Unsupported format variant: {0}")]
    UnsupportedVariant(String),

    /// Reading or writing the underlying file failed.
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),

    /// The native codec library is not compiled in.
    #[error("Native codec unavailable: {0}")]
    NativeCodecUnavailable(&'static str),

    /// The native codec library rejected the data.
    #[error("Native codec error: {0}")]
    NativeCodecError(String),

    /// Width or height is zero (or overflows the addressable size).
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel data length doesn't match the dimensions and layout.
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },
}

impl CodecError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        CodecError::CorruptData(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        CodecError::UnsupportedVariant(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CodecError>;
