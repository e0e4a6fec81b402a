//! Pixel transforms applied after decoding and before encoding.
//!
//! - [`apply_orientation`] undoes the EXIF orientation recorded by the camera.
//! - The `resize*` family resamples to a new size.
//! - [`grayscale`] rewrites color pixels as luma in place.
//!
//! Everything except `grayscale` returns a fresh [`PixelBuffer`] and leaves
//! the input untouched.
//!
//! [`PixelBuffer`]: crate::buffer::PixelBuffer

mod grayscale;
mod orientation;
mod resize;

pub use grayscale::{grayscale, luma};
pub use orientation::{apply_orientation, Orientation};
pub use resize::{
    fit_dimensions, resize, resize_area, resize_bicubic, resize_bicubic_reference,
    resize_bilinear, resize_nearest, resize_to_fit, resize_with_filter, FilterType,
};
