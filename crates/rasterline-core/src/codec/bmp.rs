//! Windows bitmap (BMP) reading and writing.
//!
//! Supports uncompressed 24- and 32-bit images (`BI_RGB`), with `BI_BITFIELDS`
//! data passed through as plain BGRA. Rows on disk are padded to a 4-byte
//! boundary and stored bottom-up unless the height is negative.

use tracing::debug;

use crate::buffer::{PixelBuffer, PixelLayout};
use crate::error::{CodecError, Result};

/// File header (14 bytes) + BITMAPINFOHEADER (40 bytes).
const HEADER_SIZE: usize = 54;
const INFO_HEADER_SIZE: u32 = 40;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

/// 72 DPI expressed in pixels per metre.
const PIXELS_PER_METRE: i32 = 2835;

#[inline]
fn le_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

#[inline]
fn le_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

#[inline]
fn le_i32(data: &[u8], off: usize) -> i32 {
    le_u32(data, off) as i32
}

/// On-disk row length: rows are padded to a multiple of 4 bytes.
#[inline]
fn row_stride(width: u32, bits_per_pixel: u32) -> usize {
    ((width as usize * bits_per_pixel as usize + 31) / 32) * 4
}

/// Check for the `BM` magic bytes.
pub fn is_bmp(bytes: &[u8]) -> bool {
    bytes.starts_with(b"BM")
}

/// Decode a BMP file into an `Rgb24` (24-bit) or `Rgba32` (32-bit) buffer.
///
/// # Errors
///
/// Returns `CodecError::CorruptData` for a bad signature, truncated header or
/// truncated pixel rows, and `CodecError::UnsupportedVariant` for extended
/// headers smaller than 40 bytes, other bit depths, or compressed data.
pub fn decode_bmp(bytes: &[u8]) -> Result<PixelBuffer> {
    if !is_bmp(bytes) {
        return Err(CodecError::corrupt("missing BM signature"));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::corrupt("truncated BMP header"));
    }

    let data_offset = le_u32(bytes, 10) as usize;
    let dib_size = le_u32(bytes, 14);
    if dib_size < INFO_HEADER_SIZE {
        return Err(CodecError::unsupported(format!(
            "BMP DIB header of {} bytes",
            dib_size
        )));
    }

    let raw_width = le_i32(bytes, 18);
    let raw_height = le_i32(bytes, 22);
    let bits_per_pixel = le_u16(bytes, 28) as u32;
    let compression = le_u32(bytes, 30);

    if bits_per_pixel != 24 && bits_per_pixel != 32 {
        return Err(CodecError::unsupported(format!(
            "BMP bit depth {}",
            bits_per_pixel
        )));
    }
    if compression != BI_RGB && compression != BI_BITFIELDS {
        return Err(CodecError::unsupported(format!(
            "BMP compression {}",
            compression
        )));
    }
    if raw_width <= 0 || raw_height == 0 {
        return Err(CodecError::corrupt(format!(
            "BMP dimensions {}x{}",
            raw_width, raw_height
        )));
    }

    let width = raw_width as u32;
    let height = raw_height.unsigned_abs();
    let bottom_up = raw_height > 0;

    let (layout, pixel_size) = if bits_per_pixel == 32 {
        (PixelLayout::Rgba32, 4)
    } else {
        (PixelLayout::Rgb24, 3)
    };

    let stride = row_stride(width, bits_per_pixel);
    let pixel_bytes = stride
        .checked_mul(height as usize)
        .and_then(|n| n.checked_add(data_offset))
        .ok_or_else(|| CodecError::corrupt("BMP pixel data size overflows"))?;
    if pixel_bytes > bytes.len() {
        return Err(CodecError::corrupt(format!(
            "truncated BMP pixel data: need {} bytes, have {}",
            pixel_bytes,
            bytes.len()
        )));
    }

    let out_stride = width as usize * pixel_size;
    let mut out = vec![0u8; out_stride * height as usize];

    for (out_y, dst_row) in out.chunks_exact_mut(out_stride).enumerate() {
        let src_y = if bottom_up {
            height as usize - 1 - out_y
        } else {
            out_y
        };
        let start = data_offset + src_y * stride;
        let src_row = &bytes[start..start + stride];

        for (dst, src) in dst_row
            .chunks_exact_mut(pixel_size)
            .zip(src_row[..out_stride].chunks_exact(pixel_size))
        {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            if pixel_size == 4 {
                dst[3] = src[3];
            }
        }
    }

    debug!(width, height, bits_per_pixel, bottom_up, "decoded BMP");
    Ok(PixelBuffer::from_raw(width, height, layout, out))
}

/// Encode a buffer as an uncompressed 24-bit bottom-up BMP.
///
/// Alpha is dropped and gray is expanded to three channels.
pub fn encode_bmp(image: &PixelBuffer) -> Result<Vec<u8>> {
    let rgb;
    let image = if image.layout() == PixelLayout::Rgb24 {
        image
    } else {
        rgb = image.to_rgb24();
        &rgb
    };

    let (width, height) = image.dimensions();
    let stride = row_stride(width, 24);
    let image_size = stride * height as usize;
    let file_size = HEADER_SIZE + image_size;
    let file_size_u32 = u32::try_from(file_size)
        .map_err(|_| CodecError::InvalidDimensions { width, height })?;

    let mut out = Vec::with_capacity(file_size);

    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size_u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes());

    // BITMAPINFOHEADER
    out.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&BI_RGB.to_le_bytes());
    out.extend_from_slice(&(image_size as u32).to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let padding = stride - width as usize * 3;
    for y in (0..height).rev() {
        for px in image.row(y).chunks_exact(3) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        out.extend(std::iter::repeat(0u8).take(padding));
    }

    debug!(width, height, bytes = out.len(), "encoded BMP");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 40) as u8);
                pixels.push((y * 30) as u8);
                pixels.push(((x + y) * 7) as u8);
            }
        }
        PixelBuffer::new(width, height, PixelLayout::Rgb24, pixels).unwrap()
    }

    /// Build a raw 32-bit top-down BMP by hand.
    fn top_down_32bit(width: u32, height: u32, compression: u32, bgra: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&((HEADER_SIZE + bgra.len()) as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&54u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        out.extend_from_slice(&(-(height as i32)).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&32u16.to_le_bytes());
        out.extend_from_slice(&compression.to_le_bytes());
        out.extend_from_slice(&[0u8; 20]);
        out.extend_from_slice(bgra);
        out
    }

    #[test]
    fn test_row_stride_padding() {
        assert_eq!(row_stride(1, 24), 4);
        assert_eq!(row_stride(2, 24), 8);
        assert_eq!(row_stride(3, 24), 12);
        assert_eq!(row_stride(4, 24), 12);
        assert_eq!(row_stride(5, 24), 16);
        assert_eq!(row_stride(3, 32), 12);
    }

    #[test]
    fn test_encode_header_layout() {
        let img = gradient(3, 2);
        let bytes = encode_bmp(&img).unwrap();

        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(bytes.len(), 54 + 12 * 2);
        assert_eq!(le_u32(&bytes, 2) as usize, bytes.len());
        assert_eq!(le_u32(&bytes, 10), 54);
        assert_eq!(le_i32(&bytes, 18), 3);
        assert_eq!(le_i32(&bytes, 22), 2);
        assert_eq!(le_u16(&bytes, 28), 24);
    }

    #[test]
    fn test_encode_writes_bottom_up_bgr() {
        let img = PixelBuffer::new(1, 2, PixelLayout::Rgb24, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let bytes = encode_bmp(&img).unwrap();

        // Bottom row first, BGR, padded to 4 bytes.
        assert_eq!(&bytes[54..58], &[6, 5, 4, 0]);
        assert_eq!(&bytes[58..62], &[3, 2, 1, 0]);
    }

    #[test]
    fn test_round_trip() {
        let img = gradient(5, 3);
        let decoded = decode_bmp(&encode_bmp(&img).unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_encode_drops_alpha() {
        let img = PixelBuffer::new(1, 1, PixelLayout::Rgba32, vec![9, 8, 7, 0]).unwrap();
        let decoded = decode_bmp(&encode_bmp(&img).unwrap()).unwrap();
        assert_eq!(decoded.layout(), PixelLayout::Rgb24);
        assert_eq!(decoded.data(), &[9, 8, 7]);
    }

    #[test]
    fn test_decode_32bit_top_down() {
        let bgra = [
            3, 2, 1, 255, 30, 20, 10, 128, // row 0
            0, 0, 0, 0, 255, 255, 255, 255, // row 1
        ];
        let bytes = top_down_32bit(2, 2, BI_RGB, &bgra);
        let img = decode_bmp(&bytes).unwrap();

        assert_eq!(img.layout(), PixelLayout::Rgba32);
        assert_eq!(img.pixel(0, 0), &[1, 2, 3, 255]);
        assert_eq!(img.pixel(1, 0), &[10, 20, 30, 128]);
        assert_eq!(img.pixel(1, 1), &[255, 255, 255, 255]);
    }

    #[test]
    fn test_decode_bitfields_pass_through() {
        let bytes = top_down_32bit(1, 1, BI_BITFIELDS, &[3, 2, 1, 4]);
        let img = decode_bmp(&bytes).unwrap();
        assert_eq!(img.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_rejects_compression() {
        let bytes = top_down_32bit(1, 1, 1, &[0, 0, 0, 0]);
        assert!(matches!(
            decode_bmp(&bytes),
            Err(CodecError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn test_decode_rejects_small_dib_header() {
        let mut bytes = encode_bmp(&gradient(2, 2)).unwrap();
        bytes[14..18].copy_from_slice(&12u32.to_le_bytes());
        assert!(matches!(
            decode_bmp(&bytes),
            Err(CodecError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn test_decode_rejects_other_bit_depths() {
        let mut bytes = encode_bmp(&gradient(2, 2)).unwrap();
        bytes[28..30].copy_from_slice(&8u16.to_le_bytes());
        assert!(matches!(
            decode_bmp(&bytes),
            Err(CodecError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode_bmp(&gradient(4, 4)).unwrap();

        assert!(matches!(
            decode_bmp(&bytes[..40]),
            Err(CodecError::CorruptData(_))
        ));
        assert!(matches!(
            decode_bmp(&bytes[..bytes.len() - 1]),
            Err(CodecError::CorruptData(_))
        ));
    }

    #[test]
    fn test_decode_bad_signature() {
        assert!(matches!(
            decode_bmp(b"XX not a bitmap"),
            Err(CodecError::CorruptData(_))
        ));
        assert!(!is_bmp(&[0x89, b'P']));
    }
}
