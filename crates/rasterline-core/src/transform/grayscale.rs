//! In-place luma conversion.

use crate::buffer::{PixelBuffer, PixelLayout};

/// BT.601 luma from 8-bit RGB, weights scaled by 256.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Replace the color channels of every pixel with its luma.
///
/// The layout is unchanged: R, G and B all receive `Y`, alpha is left as is,
/// and `Gray8` buffers are already luma.
pub fn grayscale(image: &mut PixelBuffer) {
    let bpp = match image.layout() {
        PixelLayout::Gray8 => return,
        layout => layout.bytes_per_pixel(),
    };
    for px in image.data_mut().chunks_exact_mut(bpp) {
        let y = luma(px[0], px[1], px[2]);
        px[..3].fill(y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_weights() {
        let expected = ((77 * 10 + 150 * 200 + 29 * 50) >> 8) as u8;
        assert_eq!(luma(10, 200, 50), expected);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
    }

    #[test]
    fn test_rgb() {
        let mut image = PixelBuffer::filled(2, 1, PixelLayout::Rgb24, &[10, 200, 50]).unwrap();
        grayscale(&mut image);
        let y = luma(10, 200, 50);
        assert_eq!(image.data(), &[y, y, y, y, y, y]);
    }

    #[test]
    fn test_alpha_untouched() {
        let mut image = PixelBuffer::new(
            2,
            1,
            PixelLayout::Rgba32,
            vec![255, 0, 0, 17, 0, 0, 255, 200],
        )
        .unwrap();
        grayscale(&mut image);
        assert_eq!(image.pixel(0, 0), &[76, 76, 76, 17]);
        assert_eq!(image.pixel(1, 0), &[28, 28, 28, 200]);
    }

    #[test]
    fn test_gray_is_noop() {
        let mut image = PixelBuffer::new(3, 1, PixelLayout::Gray8, vec![1, 2, 3]).unwrap();
        grayscale(&mut image);
        assert_eq!(image.data(), &[1, 2, 3]);
    }
}
