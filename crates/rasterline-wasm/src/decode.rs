//! Image decoding WASM bindings.
//!
//! # Functions
//!
//! - [`decode_image`] - Decode a BMP, PNG, JPEG or WebP file from bytes
//! - [`detect_format`] - Identify the container format without decoding
//!
//! # Example
//!
//! ```typescript
//! import { decode_image, detect_format } from '@rasterline/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! if (detect_format(bytes) !== undefined) {
//!   const image = decode_image(bytes);
//!   console.log(`Decoded ${image.width}x${image.height}, ${image.channels} channels`);
//! }
//! ```

use crate::types::{to_js_error, JsPixelBuffer};
use rasterline_core::{CodecConfig, ImageFormat};
use wasm_bindgen::prelude::*;

/// Decode an image from bytes, detecting the format from its signature.
///
/// JPEG images have their EXIF orientation applied so they display upright.
///
/// # Errors
///
/// Returns an error if the format is not recognized or the data is corrupt.
#[wasm_bindgen]
pub fn decode_image(bytes: &[u8]) -> Result<JsPixelBuffer, JsValue> {
    rasterline_core::decode(bytes, &CodecConfig::default())
        .map(JsPixelBuffer::from_buffer)
        .map_err(to_js_error)
}

/// Identify the container format of `bytes`.
///
/// # Returns
///
/// `"bmp"`, `"png"`, `"jpg"` or `"webp"`, or `undefined` if no codec
/// recognizes the signature.
#[wasm_bindgen]
pub fn detect_format(bytes: &[u8]) -> Option<String> {
    ImageFormat::sniff(bytes).map(|format| format.extension().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterline_core::{PixelBuffer, PixelLayout};

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg".into()));
        assert_eq!(detect_format(b"\x89PNG\r\n\x1a\n"), Some("png".into()));
        assert_eq!(detect_format(b"BM\0\0"), Some("bmp".into()));
        assert_eq!(detect_format(b"not an image"), None);
        assert_eq!(detect_format(&[]), None);
    }

    #[test]
    fn test_js_pixel_buffer_from_decoded() {
        let image = PixelBuffer::filled(3, 2, PixelLayout::Rgb24, &[10, 20, 30]).unwrap();
        let config = CodecConfig::default();
        let png = rasterline_core::encode(&image, ImageFormat::Png, &config).unwrap();

        let decoded = rasterline_core::decode(&png, &config).unwrap();
        let js = JsPixelBuffer::from_buffer(decoded);
        assert_eq!((js.width(), js.height(), js.channels()), (3, 2, 3));
        assert_eq!(js.byte_length(), 18);
    }
}
