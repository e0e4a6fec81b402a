//! The in-memory pixel buffer every codec produces and every transform consumes.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Interleaved pixel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 8-bit red, green, blue.
    Rgb24,
    /// 8-bit red, green, blue, alpha.
    Rgba32,
    /// 8-bit luma.
    Gray8,
}

impl PixelLayout {
    /// Number of bytes (and channels) per pixel.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb24 => 3,
            PixelLayout::Rgba32 => 4,
            PixelLayout::Gray8 => 1,
        }
    }

    /// Whether the layout carries an alpha channel.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::Rgba32)
    }
}

/// A decoded image: dimensions, layout and tightly packed row-major bytes.
///
/// The fields are private so that `data.len() == width * height * bpp`
/// holds for every value that exists. Transforms hand back new buffers
/// instead of resizing one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

/// Byte length of a `width x height` image in `layout`, or an error if it is
/// empty or would overflow.
pub(crate) fn checked_len(width: u32, height: u32, layout: PixelLayout) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(layout.bytes_per_pixel()))
        .ok_or(CodecError::InvalidDimensions { width, height })
}

impl PixelBuffer {
    /// Create a buffer, validating the dimensions against the data length.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidDimensions` if either dimension is zero and
    /// `CodecError::InvalidPixelData` if `data` has the wrong length.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self> {
        let expected = checked_len(width, height, layout)?;
        if data.len() != expected {
            return Err(CodecError::InvalidPixelData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Create a buffer filled with a single pixel value.
    ///
    /// `pixel` must hold exactly `layout.bytes_per_pixel()` bytes.
    pub fn filled(width: u32, height: u32, layout: PixelLayout, pixel: &[u8]) -> Result<Self> {
        let len = checked_len(width, height, layout)?;
        if pixel.len() != layout.bytes_per_pixel() {
            return Err(CodecError::InvalidPixelData {
                expected: layout.bytes_per_pixel(),
                actual: pixel.len(),
            });
        }
        let data = pixel.iter().copied().cycle().take(len).collect();
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Internal constructor for codecs and transforms that sized `data` themselves.
    pub(crate) fn from_raw(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        debug_assert!(width > 0 && height > 0, "Empty pixel buffer");
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * layout.bytes_per_pixel(),
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Raw interleaved bytes, row-major, no padding.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to channel values. The length cannot change through this.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer and return its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    /// One row of pixel bytes.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Channel bytes of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.layout.bytes_per_pixel();
        let idx = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[idx..idx + bpp]
    }

    /// Convert to `Rgb24`, dropping alpha or replicating luma as needed.
    pub fn to_rgb24(&self) -> PixelBuffer {
        let data = match self.layout {
            PixelLayout::Rgb24 => self.data.clone(),
            PixelLayout::Rgba32 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            PixelLayout::Gray8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        PixelBuffer::from_raw(self.width, self.height, PixelLayout::Rgb24, data)
    }

    /// Convert to `Rgba32`; pixels without alpha become fully opaque.
    pub fn to_rgba32(&self) -> PixelBuffer {
        let data = match self.layout {
            PixelLayout::Rgba32 => self.data.clone(),
            PixelLayout::Rgb24 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            PixelLayout::Gray8 => self.data.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        };
        PixelBuffer::from_raw(self.width, self.height, PixelLayout::Rgba32, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_stride() {
        assert_eq!(PixelLayout::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(PixelLayout::Rgba32.bytes_per_pixel(), 4);
        assert_eq!(PixelLayout::Gray8.bytes_per_pixel(), 1);
        assert!(PixelLayout::Rgba32.has_alpha());
        assert!(!PixelLayout::Rgb24.has_alpha());
    }

    #[test]
    fn test_buffer_creation() {
        let buf = PixelBuffer::new(100, 50, PixelLayout::Rgb24, vec![0u8; 100 * 50 * 3]).unwrap();

        assert_eq!(buf.dimensions(), (100, 50));
        assert_eq!(buf.pixel_count(), 5000);
        assert_eq!(buf.data().len(), 15000);
        assert_eq!(buf.stride(), 300);
    }

    #[test]
    fn test_buffer_rejects_zero_dimensions() {
        let result = PixelBuffer::new(0, 10, PixelLayout::Gray8, vec![]);
        assert!(matches!(
            result,
            Err(CodecError::InvalidDimensions {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn test_buffer_rejects_wrong_length() {
        let result = PixelBuffer::new(2, 2, PixelLayout::Rgba32, vec![0u8; 15]);
        assert!(matches!(
            result,
            Err(CodecError::InvalidPixelData {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn test_filled_and_pixel_access() {
        let buf = PixelBuffer::filled(3, 2, PixelLayout::Rgba32, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.pixel(2, 1), &[1, 2, 3, 4]);
        assert_eq!(buf.row(1).len(), 12);

        assert!(PixelBuffer::filled(3, 2, PixelLayout::Rgb24, &[1, 2]).is_err());
    }

    #[test]
    fn test_layout_conversions() {
        let gray = PixelBuffer::new(2, 1, PixelLayout::Gray8, vec![10, 200]).unwrap();
        assert_eq!(gray.to_rgb24().data(), &[10, 10, 10, 200, 200, 200]);
        assert_eq!(gray.to_rgba32().data(), &[10, 10, 10, 255, 200, 200, 200, 255]);

        let rgba = PixelBuffer::new(1, 1, PixelLayout::Rgba32, vec![1, 2, 3, 0]).unwrap();
        assert_eq!(rgba.to_rgb24().data(), &[1, 2, 3]);
        assert_eq!(rgba.to_rgb24().layout(), PixelLayout::Rgb24);
    }
}
