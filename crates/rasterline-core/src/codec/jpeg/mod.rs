//! JPEG decoding (baseline and progressive) and baseline encoding.
//!
//! Decoding returns top-down Rgb24 pixels. The EXIF orientation found in an
//! `APP1` segment is applied by [`decode_jpeg`] and ignored by
//! [`decode_jpeg_no_orientation`]; [`get_orientation`] reads it without
//! decoding any pixels.

mod color;
mod dct;
mod decoder;
mod encoder;
mod huffman;
mod metadata;
mod tables;

#[cfg(test)]
mod test_support;

use crate::buffer::PixelBuffer;
use crate::config::JpegOptions;
use crate::error::Result;
use crate::transform::{apply_orientation, Orientation};

pub use decoder::DecodedJpeg;

/// Marker codes (the byte following `0xFF`).
pub(crate) mod marker {
    pub const SOF0: u8 = 0xC0;
    pub const SOF1: u8 = 0xC1;
    pub const SOF2: u8 = 0xC2;
    pub const DHT: u8 = 0xC4;
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const DQT: u8 = 0xDB;
    pub const DRI: u8 = 0xDD;
    pub const APP0: u8 = 0xE0;
    pub const APP1: u8 = 0xE1;
    pub const TEM: u8 = 0x01;
}

/// Check for the JPEG SOI marker followed by another marker.
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// Decode a JPEG image, applying its EXIF orientation.
///
/// # Arguments
///
/// * `bytes` - Raw JPEG file bytes
///
/// # Returns
///
/// An Rgb24 buffer in display orientation. Orientations 5-8 swap width
/// and height.
///
/// # Errors
///
/// Returns `CodecError::CorruptData` for truncated or malformed streams and
/// `CodecError::UnsupportedVariant` for valid JPEG features outside baseline
/// and progressive Huffman coding of 8-bit samples.
pub fn decode_jpeg(bytes: &[u8]) -> Result<PixelBuffer> {
    let decoded = decoder::decode(bytes)?;
    Ok(apply_orientation(&decoded.buffer, decoded.orientation))
}

/// Decode a JPEG image without applying EXIF orientation.
pub fn decode_jpeg_no_orientation(bytes: &[u8]) -> Result<PixelBuffer> {
    Ok(decoder::decode(bytes)?.buffer)
}

/// Decode a JPEG image and report its EXIF orientation separately.
pub fn decode_jpeg_with_orientation(bytes: &[u8]) -> Result<DecodedJpeg> {
    decoder::decode(bytes)
}

/// Extract the EXIF orientation from JPEG bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or the orientation
/// tag can't be read.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    decoder::read_orientation(bytes)
}

/// Encode pixels as a baseline JPEG.
///
/// # Arguments
///
/// * `image` - Pixels to encode (alpha is dropped, Gray8 stays one component)
/// * `options` - Quality, chroma subsampling and restart interval
///
/// # Errors
///
/// Returns `CodecError::UnsupportedVariant` if a dimension exceeds 65535.
pub fn encode_jpeg(image: &PixelBuffer, options: &JpegOptions) -> Result<Vec<u8>> {
    encoder::encode(image, options)
}

/// Insert an EXIF `APP1` segment carrying `orientation` right after SOI.
#[cfg(test)]
pub(crate) fn with_exif_orientation(jpeg: &[u8], orientation: Orientation) -> Vec<u8> {
    let payload = metadata::orientation_payload(orientation.code() as u16);
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, marker::APP1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
