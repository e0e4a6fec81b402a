//! Pixel transform WASM bindings: orientation, resizing and grayscale.
//!
//! All functions return a new image and leave the input unchanged.

use crate::types::{to_js_error, JsPixelBuffer};
use rasterline_core::{transform, CodecError, FilterType, Orientation};
use wasm_bindgen::prelude::*;

/// Convert a u8 filter value to the core FilterType enum.
///
/// Values:
/// - 0 = Generic (nearest when growing, area average when shrinking)
/// - 1 = Bilinear
/// - 2 = Bicubic
///
/// Any other value falls back to Generic.
pub(crate) fn filter_from_u8(value: u8) -> FilterType {
    match value {
        1 => FilterType::Bilinear,
        2 => FilterType::Bicubic,
        _ => FilterType::Generic,
    }
}

fn oriented(image: &JsPixelBuffer, code: u32) -> Result<JsPixelBuffer, CodecError> {
    let buffer = image.to_buffer()?;
    Ok(JsPixelBuffer::from_buffer(transform::apply_orientation(
        &buffer,
        Orientation::from(code),
    )))
}

fn resized(
    image: &JsPixelBuffer,
    width: u32,
    height: u32,
    filter: u8,
) -> Result<JsPixelBuffer, CodecError> {
    let buffer = image.to_buffer()?;
    transform::resize_with_filter(&buffer, width, height, filter_from_u8(filter))
        .map(JsPixelBuffer::from_buffer)
}

fn fitted(
    image: &JsPixelBuffer,
    max_width: u32,
    max_height: u32,
) -> Result<JsPixelBuffer, CodecError> {
    let buffer = image.to_buffer()?;
    transform::resize_to_fit(&buffer, max_width, max_height).map(JsPixelBuffer::from_buffer)
}

fn grayed(image: &JsPixelBuffer) -> Result<JsPixelBuffer, CodecError> {
    let mut buffer = image.to_buffer()?;
    transform::grayscale(&mut buffer);
    Ok(JsPixelBuffer::from_buffer(buffer))
}

/// Apply an EXIF orientation code (1-8) to an image.
///
/// Codes 5-8 swap width and height. Unknown codes return an unchanged copy.
#[wasm_bindgen]
pub fn apply_orientation(image: &JsPixelBuffer, code: u32) -> Result<JsPixelBuffer, JsValue> {
    oriented(image, code).map_err(to_js_error)
}

/// Resize an image to exact dimensions.
///
/// # Arguments
///
/// * `image` - The source image
/// * `width`, `height` - Target size in pixels
/// * `filter` - 0 = generic, 1 = bilinear, 2 = bicubic
///
/// # Errors
///
/// Returns an error if a target dimension is zero.
#[wasm_bindgen]
pub fn resize(
    image: &JsPixelBuffer,
    width: u32,
    height: u32,
    filter: u8,
) -> Result<JsPixelBuffer, JsValue> {
    resized(image, width, height, filter).map_err(to_js_error)
}

/// Resize an image to fit within `max_width x max_height`, preserving its
/// aspect ratio. Smaller images are scaled up.
#[wasm_bindgen]
pub fn resize_to_fit(
    image: &JsPixelBuffer,
    max_width: u32,
    max_height: u32,
) -> Result<JsPixelBuffer, JsValue> {
    fitted(image, max_width, max_height).map_err(to_js_error)
}

/// Convert an image to grayscale, keeping its channel count and alpha.
#[wasm_bindgen]
pub fn grayscale(image: &JsPixelBuffer) -> Result<JsPixelBuffer, JsValue> {
    grayed(image).map_err(to_js_error)
}
