//! Container codecs and the function-pointer table that dispatches to them.
//!
//! Each [`Codec`] bundles a sniffer, a decoder and an encoder for one
//! [`ImageFormat`]. The table is static; formats never register at runtime.

pub mod bmp;
pub mod jpeg;
pub mod png;
pub mod webp;

use crate::buffer::PixelBuffer;
use crate::config::CodecConfig;
use crate::error::Result;
use crate::format::ImageFormat;

/// Decoder, encoder and sniffer for one container format.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub format: ImageFormat,
    pub sniff: fn(&[u8]) -> bool,
    pub decode: fn(&[u8], &CodecConfig) -> Result<PixelBuffer>,
    pub encode: fn(&PixelBuffer, &CodecConfig) -> Result<Vec<u8>>,
}

fn decode_bmp(bytes: &[u8], _config: &CodecConfig) -> Result<PixelBuffer> {
    bmp::decode_bmp(bytes)
}

fn encode_bmp(image: &PixelBuffer, _config: &CodecConfig) -> Result<Vec<u8>> {
    bmp::encode_bmp(image)
}

fn decode_png(bytes: &[u8], _config: &CodecConfig) -> Result<PixelBuffer> {
    png::decode_png(bytes)
}

fn encode_png(image: &PixelBuffer, config: &CodecConfig) -> Result<Vec<u8>> {
    png::encode_png(image, &config.png)
}

fn decode_jpeg(bytes: &[u8], config: &CodecConfig) -> Result<PixelBuffer> {
    if config.auto_orient {
        jpeg::decode_jpeg(bytes)
    } else {
        jpeg::decode_jpeg_no_orientation(bytes)
    }
}

fn encode_jpeg(image: &PixelBuffer, config: &CodecConfig) -> Result<Vec<u8>> {
    jpeg::encode_jpeg(image, &config.jpeg)
}

fn decode_webp(bytes: &[u8], _config: &CodecConfig) -> Result<PixelBuffer> {
    webp::decode_webp(bytes)
}

fn encode_webp(image: &PixelBuffer, config: &CodecConfig) -> Result<Vec<u8>> {
    webp::encode_webp(image, config.webp_quality)
}

/// Every codec, in sniffing order.
pub static CODECS: [Codec; 4] = [
    Codec {
        format: ImageFormat::Png,
        sniff: png::is_png,
        decode: decode_png,
        encode: encode_png,
    },
    Codec {
        format: ImageFormat::Jpeg,
        sniff: jpeg::is_jpeg,
        decode: decode_jpeg,
        encode: encode_jpeg,
    },
    Codec {
        format: ImageFormat::Bmp,
        sniff: bmp::is_bmp,
        decode: decode_bmp,
        encode: encode_bmp,
    },
    Codec {
        format: ImageFormat::WebP,
        sniff: webp::is_webp,
        decode: decode_webp,
        encode: encode_webp,
    },
];

/// Find the codec whose sniffer accepts `bytes`.
pub fn sniff(bytes: &[u8]) -> Option<&'static Codec> {
    CODECS.iter().find(|codec| (codec.sniff)(bytes))
}
