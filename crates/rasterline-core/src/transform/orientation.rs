//! EXIF orientation remapping.
//!
//! Each of the eight orientation codes is a lossless pixel permutation: a
//! combination of horizontal flip, vertical flip and transpose. Channel bytes
//! are moved verbatim, so the remap works on every [`PixelLayout`].
//!
//! [`PixelLayout`]: crate::buffer::PixelLayout

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Stored upright.
    #[default]
    Normal = 1,
    /// Mirrored left to right.
    FlipHorizontal = 2,
    /// Upside down.
    Rotate180 = 3,
    /// Mirrored top to bottom.
    FlipVertical = 4,
    /// Mirrored across the main diagonal.
    Transpose = 5,
    /// Needs a 90 degree clockwise turn to display upright.
    Rotate90CW = 6,
    /// Mirrored across the anti-diagonal.
    Transverse = 7,
    /// Needs a 270 degree clockwise turn to display upright.
    Rotate270CW = 8,
}

impl Orientation {
    /// Returns true if this orientation swaps width and height.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }

    /// The numeric EXIF code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Destination of source pixel `(x, y)` in a `width x height` image.
    #[inline]
    fn map(self, x: usize, y: usize, width: usize, height: usize) -> (usize, usize) {
        match self {
            Orientation::Normal => (x, y),
            Orientation::FlipHorizontal => (width - 1 - x, y),
            Orientation::Rotate180 => (width - 1 - x, height - 1 - y),
            Orientation::FlipVertical => (x, height - 1 - y),
            Orientation::Transpose => (y, x),
            Orientation::Rotate90CW => (height - 1 - y, x),
            Orientation::Transverse => (height - 1 - y, width - 1 - x),
            Orientation::Rotate270CW => (y, width - 1 - x),
        }
    }
}

/// Unknown codes map to `Normal`.
impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Remap an image so that it displays upright.
///
/// # Arguments
///
/// * `image` - Source image as stored in the file
/// * `orientation` - The orientation recorded alongside it
///
/// # Returns
///
/// A new buffer. Orientations that swap dimensions produce a `height x width`
/// result; `Normal` returns an identical copy.
pub fn apply_orientation(image: &PixelBuffer, orientation: Orientation) -> PixelBuffer {
    if orientation == Orientation::Normal {
        return image.clone();
    }

    let (width, height) = (image.width() as usize, image.height() as usize);
    let (out_w, out_h) = if orientation.swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    };
    let bpp = image.layout().bytes_per_pixel();
    let src = image.data();
    let mut out = vec![0u8; src.len()];

    for y in 0..height {
        let row = &src[y * width * bpp..(y + 1) * width * bpp];
        for (x, px) in row.chunks_exact(bpp).enumerate() {
            let (dx, dy) = orientation.map(x, y, width, height);
            let dst = (dy * out_w + dx) * bpp;
            out[dst..dst + bpp].copy_from_slice(px);
        }
    }

    PixelBuffer::from_raw(out_w as u32, out_h as u32, image.layout(), out)
}
