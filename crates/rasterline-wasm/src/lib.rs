//! Rasterline WASM - WebAssembly bindings for Rasterline
//!
//! This crate provides WASM bindings to expose the rasterline-core codecs and
//! transforms to JavaScript/TypeScript applications.
//!
//! # Module Structure
//!
//! - `types` - WASM-compatible wrapper type for pixel buffers
//! - `decode` - Format detection and decoding
//! - `encode` - Encoding to JPEG, PNG, BMP and WebP
//! - `transform` - Orientation, resize and grayscale
//!
//! # Usage
//!
//! ```typescript
//! import init, { decode_image, resize_to_fit, encode_jpeg } from '@rasterline/wasm';
//!
//! await init();
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const image = decode_image(bytes);
//! const thumb = resize_to_fit(image, 256, 256);
//! const jpeg = encode_jpeg(thumb, 85);
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod encode;
mod transform;
mod types;

// Re-export public types
pub use decode::{decode_image, detect_format};
pub use encode::{encode_image, encode_jpeg, encode_png};
pub use transform::{apply_orientation, grayscale, resize, resize_to_fit};
pub use types::JsPixelBuffer;

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
