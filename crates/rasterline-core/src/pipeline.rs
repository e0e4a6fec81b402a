//! Whole-file entry points: bytes or paths in, [`PixelBuffer`] out, and back.
//!
//! Format detection is by content on the way in and by file extension on the
//! way out. Every call is synchronous and either succeeds completely or
//! returns an error; `save` never leaves a partially written file behind
//! because the image is encoded in memory first.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::format::ImageFormat;

/// Decode an image of any supported format.
///
/// # Arguments
///
/// * `bytes` - Complete file contents
/// * `config` - Decode options (JPEG auto-orientation)
///
/// # Errors
///
/// Returns `CodecError::UnsupportedFormat` if no codec recognizes the bytes,
/// otherwise whatever the matching codec reports.
pub fn decode(bytes: &[u8], config: &CodecConfig) -> Result<PixelBuffer> {
    let format = ImageFormat::sniff(bytes).ok_or_else(|| {
        CodecError::UnsupportedFormat("Unrecognized image signature".to_string())
    })?;
    let image = (format.codec().decode)(bytes, config)?;
    debug!(
        %format,
        width = image.width(),
        height = image.height(),
        layout = ?image.layout(),
        "Decoded image"
    );
    Ok(image)
}

/// Encode a buffer in the given format.
pub fn encode(image: &PixelBuffer, format: ImageFormat, config: &CodecConfig) -> Result<Vec<u8>> {
    let bytes = (format.codec().encode)(image, config)?;
    debug!(%format, bytes = bytes.len(), "Encoded image");
    Ok(bytes)
}

/// Read and decode an image file.
///
/// # Errors
///
/// Returns `CodecError::IoFailure` if the file cannot be read, plus any
/// [`decode`] error.
pub fn load(path: impl AsRef<Path>, config: &CodecConfig) -> Result<PixelBuffer> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Loaded file");
    decode(&bytes, config)
}

/// Encode an image in the format named by the path's extension and write it.
///
/// Extensions are matched case-insensitively: `bmp`, `png`, `jpg`, `jpeg`
/// and `webp`.
///
/// # Errors
///
/// Returns `CodecError::UnsupportedFormat` for an unknown extension and
/// `CodecError::IoFailure` if the write fails. Encoding errors leave the
/// destination untouched.
pub fn save(image: &PixelBuffer, path: impl AsRef<Path>, config: &CodecConfig) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path)?;
    let bytes = encode(image, format, config)?;
    fs::write(path, &bytes)?;
    debug!(path = %path.display(), %format, bytes = bytes.len(), "Saved file");
    Ok(())
}
