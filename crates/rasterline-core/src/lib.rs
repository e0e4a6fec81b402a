//! Rasterline Core - image codecs and pixel transforms
//!
//! This crate decodes and encodes BMP, PNG and JPEG with in-crate codecs
//! (WebP through `libwebp` behind the `webp` feature) and provides the
//! transforms applied between the two: EXIF orientation, resizing and
//! grayscale conversion.
//!
//! Every decoder produces a [`PixelBuffer`]; every encoder consumes one.
//! Format dispatch goes through the static [`codec::CODECS`] table, either by
//! sniffing bytes ([`decode`]) or by file extension ([`save`]).

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod transform;

pub use buffer::{PixelBuffer, PixelLayout};
pub use codec::Codec;
pub use config::{CodecConfig, JpegOptions, PngFilterStrategy, PngOptions, Subsampling};
pub use error::{CodecError, Result};
pub use format::ImageFormat;
pub use pipeline::{decode, encode, load, save};
pub use transform::{
    apply_orientation, grayscale, resize, resize_area, resize_bicubic, resize_bicubic_reference,
    resize_bilinear, resize_nearest, resize_to_fit, FilterType, Orientation,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_transform_encode_chain() {
        let data = (0..40 * 20)
            .flat_map(|i: u32| [(i % 40 * 6) as u8, (i / 40 * 12) as u8, 128])
            .collect();
        let image = PixelBuffer::new(40, 20, PixelLayout::Rgb24, data).unwrap();
        let config = CodecConfig::default();

        let png = encode(&image, ImageFormat::Png, &config).unwrap();
        let decoded = decode(&png, &config).unwrap();
        let rotated = apply_orientation(&decoded, Orientation::Rotate270CW);
        assert_eq!(rotated.dimensions(), (20, 40));

        let mut thumb = resize_to_fit(&rotated, 10, 10).unwrap();
        assert_eq!(thumb.dimensions(), (5, 10));
        grayscale(&mut thumb);

        let jpeg = encode(&thumb, ImageFormat::Jpeg, &config).unwrap();
        let back = decode(&jpeg, &config).unwrap();
        assert_eq!(back.dimensions(), (5, 10));
        assert_eq!(back.layout(), PixelLayout::Rgb24);
    }
}
