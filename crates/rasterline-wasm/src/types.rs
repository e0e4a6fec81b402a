//! WASM-compatible wrapper types for image data.
//!
//! This module provides JavaScript-friendly types that wrap the core Rasterline
//! types, handling the conversion between Rust and JavaScript data representations.

use rasterline_core::{CodecError, PixelBuffer, PixelLayout};
use wasm_bindgen::prelude::*;

/// A pixel buffer wrapper for JavaScript.
///
/// Pixels are interleaved 8-bit channels: 1 (gray), 3 (RGB) or 4 (RGBA)
/// per pixel, row-major, top-down.
///
/// # Memory Management
///
/// The pixel data is stored in WASM memory. When you call `pixels()`, a copy is made
/// to JavaScript memory as a `Uint8Array`. Keep images in WASM memory across
/// transform calls and only extract pixels when needed.
#[wasm_bindgen]
pub struct JsPixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsPixelBuffer {
    /// Create a new JsPixelBuffer from dimensions and pixel data.
    ///
    /// # Arguments
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `channels` - 1, 3 or 4 bytes per pixel
    /// * `pixels` - Interleaved pixel data, row-major order
    ///
    /// The contents are validated when the image is first passed to a codec
    /// or transform.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> JsPixelBuffer {
        JsPixelBuffer {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Get the image width in pixels
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the image height in pixels
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel
    #[wasm_bindgen(getter)]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Get the number of bytes in the pixel buffer
    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.pixels.len()
    }

    /// Returns pixel data as Uint8Array.
    ///
    /// Note: This creates a copy of the pixel data.
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }
}

impl JsPixelBuffer {
    pub(crate) fn from_buffer(buffer: PixelBuffer) -> Self {
        let (width, height) = buffer.dimensions();
        let channels = buffer.layout().bytes_per_pixel() as u8;
        Self {
            width,
            height,
            channels,
            pixels: buffer.into_data(),
        }
    }

    /// Convert to a core PixelBuffer, validating the channel count and length.
    ///
    /// Note: This clones the pixel data.
    pub(crate) fn to_buffer(&self) -> Result<PixelBuffer, CodecError> {
        let layout = layout_from_channels(self.channels)?;
        PixelBuffer::new(self.width, self.height, layout, self.pixels.clone())
    }
}

fn layout_from_channels(channels: u8) -> Result<PixelLayout, CodecError> {
    match channels {
        1 => Ok(PixelLayout::Gray8),
        3 => Ok(PixelLayout::Rgb24),
        4 => Ok(PixelLayout::Rgba32),
        other => Err(CodecError::UnsupportedVariant(format!(
            "{other} channels per pixel"
        ))),
    }
}

/// Convert a core error into a JavaScript error string.
pub(crate) fn to_js_error(error: CodecError) -> JsValue {
    JsValue::from_str(&error.to_string())
}
