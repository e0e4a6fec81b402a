//! WebP through the native `libwebp` bindings.
//!
//! Only compiled in with the `webp` feature. Without it every call fails
//! with `CodecError::NativeCodecUnavailable` so callers can treat a missing
//! native library as an ordinary outcome.

#[cfg(feature = "webp")]
use tracing::debug;

use crate::buffer::{PixelBuffer, PixelLayout};
use crate::error::{CodecError, Result};

/// Check for a `RIFF....WEBP` container header.
pub fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

/// Encode RGBA pixels as lossy WebP.
///
/// # Arguments
///
/// * `rgba` - Tightly packed RGBA bytes
/// * `width`, `height` - Image dimensions
/// * `quality` - Lossy quality, 0.0 to 100.0
#[cfg(feature = "webp")]
pub fn encode_rgba(rgba: &[u8], width: u32, height: u32, quality: f32) -> Result<Vec<u8>> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(CodecError::InvalidPixelData {
            expected,
            actual: rgba.len(),
        });
    }
    let encoder = webp::Encoder::from_rgba(rgba, width, height);
    let memory = encoder
        .encode_simple(false, quality.clamp(0.0, 100.0))
        .map_err(|e| CodecError::NativeCodecError(format!("WebP encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

#[cfg(not(feature = "webp"))]
pub fn encode_rgba(_rgba: &[u8], _width: u32, _height: u32, _quality: f32) -> Result<Vec<u8>> {
    Err(CodecError::NativeCodecUnavailable("webp"))
}

/// Decode a WebP image to RGBA.
///
/// # Returns
///
/// The RGBA bytes with the image width and height. Images without alpha are
/// expanded with an opaque alpha channel.
#[cfg(feature = "webp")]
pub fn decode_rgba(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let features = webp::BitstreamFeatures::new(bytes)
        .ok_or_else(|| CodecError::NativeCodecError("Unreadable WebP bitstream".into()))?;
    if features.has_animation() {
        return Err(CodecError::unsupported("Animated WebP"));
    }

    let image = webp::Decoder::new(bytes)
        .decode()
        .ok_or_else(|| CodecError::NativeCodecError("WebP decode failed".into()))?;
    let (width, height) = (image.width(), image.height());
    debug!(width, height, alpha = image.is_alpha(), "Decoded WebP");

    let rgba = if image.is_alpha() {
        image.to_vec()
    } else {
        image
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect()
    };
    Ok((rgba, width, height))
}

#[cfg(not(feature = "webp"))]
pub fn decode_rgba(_bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    Err(CodecError::NativeCodecUnavailable("webp"))
}

/// Decode a WebP file into an Rgba32 buffer.
pub fn decode_webp(bytes: &[u8]) -> Result<PixelBuffer> {
    let (rgba, width, height) = decode_rgba(bytes)?;
    PixelBuffer::new(width, height, PixelLayout::Rgba32, rgba)
}

/// Encode a buffer as lossy WebP at `quality`.
pub fn encode_webp(image: &PixelBuffer, quality: f32) -> Result<Vec<u8>> {
    let rgba = image.to_rgba32();
    encode_rgba(rgba.data(), image.width(), image.height(), quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_webp() {
        assert!(is_webp(b"RIFF\x24\x00\x00\x00WEBPVP8 "));
        assert!(!is_webp(b"RIFF\x24\x00\x00\x00WAVEfmt "));
        assert!(!is_webp(b"RIFF"));
    }

    #[cfg(not(feature = "webp"))]
    #[test]
    fn test_unavailable_without_feature() {
        let image = PixelBuffer::filled(2, 2, PixelLayout::Rgb24, &[1, 2, 3]).unwrap();
        assert!(matches!(
            encode_webp(&image, 75.0),
            Err(CodecError::NativeCodecUnavailable("webp"))
        ));
        assert!(matches!(
            decode_webp(b"RIFF\x00\x00\x00\x00WEBP"),
            Err(CodecError::NativeCodecUnavailable(_))
        ));
    }

    #[cfg(feature = "webp")]
    #[test]
    fn test_round_trip_dimensions() {
        let image = PixelBuffer::filled(12, 7, PixelLayout::Rgba32, &[200, 100, 50, 255]).unwrap();
        let bytes = encode_webp(&image, 90.0).unwrap();
        assert!(is_webp(&bytes));

        let decoded = decode_webp(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (12, 7));
        assert_eq!(decoded.layout(), PixelLayout::Rgba32);
        let px = decoded.pixel(6, 3);
        assert!((px[0] as i32 - 200).abs() <= 8);
    }

    #[cfg(feature = "webp")]
    #[test]
    fn test_garbage_is_native_error() {
        assert!(matches!(
            decode_webp(b"RIFF\x04\x00\x00\x00WEBPjunk"),
            Err(CodecError::NativeCodecError(_))
        ));
    }
}
