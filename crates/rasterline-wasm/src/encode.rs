//! Image encoding WASM bindings.
//!
//! # Functions
//!
//! - [`encode_image`] - Encode in any format with a JS options object
//! - [`encode_jpeg`] - Baseline JPEG at a given quality
//! - [`encode_png`] - Lossless PNG with default options
//!
//! # Example
//!
//! ```typescript
//! import { encode_image, encode_jpeg } from '@rasterline/wasm';
//!
//! const jpeg = encode_jpeg(image, 90);
//! const png = encode_image(image, 'png', { png: { filter: 'Adaptive', compression: 9 } });
//! ```

use crate::types::{to_js_error, JsPixelBuffer};
use rasterline_core::{CodecConfig, CodecError, ImageFormat, JpegOptions};
use wasm_bindgen::prelude::*;

/// Parse a format name (`"jpg"`, `"jpeg"`, `"png"`, `"bmp"`, `"webp"`).
fn parse_format(name: &str) -> Result<ImageFormat, CodecError> {
    ImageFormat::from_extension(name)
        .ok_or_else(|| CodecError::UnsupportedFormat(format!("Unknown format name: {name}")))
}

fn encode_with(
    image: &JsPixelBuffer,
    format: ImageFormat,
    config: &CodecConfig,
) -> Result<Vec<u8>, CodecError> {
    rasterline_core::encode(&image.to_buffer()?, format, config)
}

/// Encode an image in the named format.
///
/// # Arguments
///
/// * `image` - The image to encode
/// * `format` - `"jpg"`, `"jpeg"`, `"png"`, `"bmp"` or `"webp"`
/// * `options` - A `CodecConfig`-shaped object; missing fields take their
///   defaults and `undefined` means all defaults
///
/// # Errors
///
/// Returns an error if the format name or options are invalid, the pixel
/// data doesn't match the image dimensions, or the encoder fails.
#[wasm_bindgen]
pub fn encode_image(
    image: &JsPixelBuffer,
    format: &str,
    options: JsValue,
) -> Result<Vec<u8>, JsValue> {
    let config: CodecConfig = if options.is_undefined() || options.is_null() {
        CodecConfig::default()
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| JsValue::from_str(&format!("Invalid codec options: {}", e)))?
    };
    let format = parse_format(format).map_err(to_js_error)?;
    encode_with(image, format, &config).map_err(to_js_error)
}

/// Encode an image as baseline JPEG.
///
/// # Arguments
///
/// * `image` - The image to encode (alpha is dropped)
/// * `quality` - JPEG quality (1-100, recommended: 90)
#[wasm_bindgen]
pub fn encode_jpeg(image: &JsPixelBuffer, quality: u8) -> Result<Vec<u8>, JsValue> {
    let config = CodecConfig {
        jpeg: JpegOptions::with_quality(quality),
        ..CodecConfig::default()
    };
    encode_with(image, ImageFormat::Jpeg, &config).map_err(to_js_error)
}

/// Encode an image as PNG with default options.
#[wasm_bindgen]
pub fn encode_png(image: &JsPixelBuffer) -> Result<Vec<u8>, JsValue> {
    encode_with(image, ImageFormat::Png, &CodecConfig::default()).map_err(to_js_error)
}
