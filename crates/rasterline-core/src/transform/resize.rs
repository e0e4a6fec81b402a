//! Image resampling.
//!
//! All functions take a source buffer and return a new one of the requested
//! size with the same [`PixelLayout`]. Zero target dimensions fail with
//! `CodecError::InvalidDimensions`.
//!
//! The cell-based filters (nearest, area, generic) work in exact integer
//! arithmetic. Bilinear interpolates in `f32`. Bicubic quantizes its kernel
//! weights to 12-bit fixed point so that the per-pixel reference and the
//! separable parallel implementation agree byte for byte.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::{checked_len, PixelBuffer, PixelLayout};
use crate::error::{CodecError, Result};

/// Resampling method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Area average on shrinking axes, nearest sample on growing ones.
    #[default]
    Generic,
    /// Nearest neighbor.
    Nearest,
    /// Box average over the covered source cell.
    Area,
    /// Bilinear interpolation.
    Bilinear,
    /// Cubic convolution, a = -0.5.
    Bicubic,
}

/// Resize with the given filter.
pub fn resize_with_filter(
    image: &PixelBuffer,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<PixelBuffer> {
    match filter {
        FilterType::Generic => resize(image, width, height),
        FilterType::Nearest => resize_nearest(image, width, height),
        FilterType::Area => resize_area(image, width, height),
        FilterType::Bilinear => resize_bilinear(image, width, height),
        FilterType::Bicubic => resize_bicubic(image, width, height),
    }
}

/// Half-open range of source indices that feed one destination index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn len(self) -> usize {
        self.end - self.start
    }
}

/// Start of the source cell for destination index `i`.
#[inline]
fn cell_start(i: u32, src: u32, dst: u32) -> usize {
    (i as u64 * src as u64 / dst as u64) as usize
}

fn nearest_spans(src: u32, dst: u32) -> Vec<Span> {
    (0..dst)
        .map(|i| {
            let start = cell_start(i, src, dst);
            Span {
                start,
                end: start + 1,
            }
        })
        .collect()
}

/// Source cells `[i*src/dst, (i+1)*src/dst)`. When growing, a cell can be
/// empty; it is widened to its single start sample.
fn area_spans(src: u32, dst: u32) -> Vec<Span> {
    (0..dst)
        .map(|i| {
            let start = cell_start(i, src, dst);
            let end = cell_start(i + 1, src, dst).max(start + 1);
            Span { start, end }
        })
        .collect()
}

fn generic_spans(src: u32, dst: u32) -> Vec<Span> {
    if dst < src {
        area_spans(src, dst)
    } else {
        nearest_spans(src, dst)
    }
}

/// Validate the target size. `Ok(Some(copy))` when no resampling is needed.
fn prepare(image: &PixelBuffer, width: u32, height: u32) -> Result<Option<PixelBuffer>> {
    checked_len(width, height, image.layout())?;
    if image.dimensions() == (width, height) {
        return Ok(Some(image.clone()));
    }
    Ok(None)
}

/// Average every destination cell with a truncating integer mean.
fn average_cells(image: &PixelBuffer, xs: &[Span], ys: &[Span]) -> PixelBuffer {
    let bpp = image.layout().bytes_per_pixel();
    let src_stride = image.stride();
    let src = image.data();
    let mut out = Vec::with_capacity(xs.len() * ys.len() * bpp);

    for ys_span in ys {
        for xs_span in xs {
            let mut acc = [0u64; 4];
            for sy in ys_span.start..ys_span.end {
                let row = &src[sy * src_stride..(sy + 1) * src_stride];
                for px in row[xs_span.start * bpp..xs_span.end * bpp].chunks_exact(bpp) {
                    for (a, &v) in acc.iter_mut().zip(px) {
                        *a += v as u64;
                    }
                }
            }
            let count = (xs_span.len() * ys_span.len()) as u64;
            out.extend(acc[..bpp].iter().map(|&a| (a / count) as u8));
        }
    }

    PixelBuffer::from_raw(xs.len() as u32, ys.len() as u32, image.layout(), out)
}

/// Resize by area average on shrinking axes and nearest sampling otherwise.
///
/// Each axis is handled on its own, so a 100x10 -> 50x20 resize averages
/// pairs of columns and repeats rows. The result equals [`resize_nearest`]
/// when neither axis shrinks and [`resize_area`] when both do.
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if `width` or `height` is zero.
pub fn resize(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if let Some(copy) = prepare(image, width, height)? {
        return Ok(copy);
    }
    let xs = generic_spans(image.width(), width);
    let ys = generic_spans(image.height(), height);
    Ok(average_cells(image, &xs, &ys))
}

/// Nearest-neighbor resize: destination `(x, y)` copies source
/// `(x * srcW / dstW, y * srcH / dstH)`.
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if `width` or `height` is zero.
pub fn resize_nearest(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if let Some(copy) = prepare(image, width, height)? {
        return Ok(copy);
    }
    let bpp = image.layout().bytes_per_pixel();
    let src_stride = image.stride();
    let src = image.data();
    let xs = nearest_spans(image.width(), width);
    let mut out = Vec::with_capacity(width as usize * height as usize * bpp);

    for sy in nearest_spans(image.height(), height) {
        let row = &src[sy.start * src_stride..(sy.start + 1) * src_stride];
        for sx in &xs {
            out.extend_from_slice(&row[sx.start * bpp..(sx.start + 1) * bpp]);
        }
    }

    Ok(PixelBuffer::from_raw(width, height, image.layout(), out))
}

/// Box-filter resize averaging the source cell under each destination pixel.
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if `width` or `height` is zero.
pub fn resize_area(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if let Some(copy) = prepare(image, width, height)? {
        return Ok(copy);
    }
    let xs = area_spans(image.width(), width);
    let ys = area_spans(image.height(), height);
    Ok(average_cells(image, &xs, &ys))
}

/// Source coordinate for destination index `i`, pixel-center aligned and
/// clamped to `[0, src - 1]`.
#[inline]
fn center_coord(i: u32, src: u32, dst: u32) -> f32 {
    let s = (i as f32 + 0.5) * src as f32 / dst as f32 - 0.5;
    s.clamp(0.0, (src - 1) as f32)
}

/// Two-tap linear sample positions for one axis.
#[derive(Debug, Clone, Copy)]
struct LinearTap {
    lo: usize,
    hi: usize,
    frac: f32,
}

fn linear_taps(src: u32, dst: u32) -> Vec<LinearTap> {
    (0..dst)
        .map(|i| {
            let s = center_coord(i, src, dst);
            let lo = s.floor() as usize;
            LinearTap {
                lo,
                hi: (lo + 1).min(src as usize - 1),
                frac: s - lo as f32,
            }
        })
        .collect()
}

/// Bilinear resize.
///
/// Interpolates horizontally between the two nearest columns, then
/// vertically between the two resulting rows, rounding half away from zero.
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if `width` or `height` is zero.
pub fn resize_bilinear(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if let Some(copy) = prepare(image, width, height)? {
        return Ok(copy);
    }
    let bpp = image.layout().bytes_per_pixel();
    let src_stride = image.stride();
    let src = image.data();
    let xs = linear_taps(image.width(), width);
    let ys = linear_taps(image.height(), height);
    let mut out = Vec::with_capacity(width as usize * height as usize * bpp);

    for ty in &ys {
        let top = &src[ty.lo * src_stride..(ty.lo + 1) * src_stride];
        let bottom = &src[ty.hi * src_stride..(ty.hi + 1) * src_stride];
        for tx in &xs {
            for c in 0..bpp {
                let (l, r) = (tx.lo * bpp + c, tx.hi * bpp + c);
                let upper = top[l] as f32 + (top[r] as f32 - top[l] as f32) * tx.frac;
                let lower = bottom[l] as f32 + (bottom[r] as f32 - bottom[l] as f32) * tx.frac;
                let v = upper + (lower - upper) * ty.frac;
                out.push(v.round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    Ok(PixelBuffer::from_raw(width, height, image.layout(), out))
}

/// Fixed-point scale of one bicubic weight.
const WEIGHT_BITS: u32 = 12;
const WEIGHT_ONE: i32 = 1 << WEIGHT_BITS;
/// Rounding bias for the combined two-axis scale.
const ROUND: i64 = 1 << (2 * WEIGHT_BITS - 1);

/// Cubic convolution kernel with a = -0.5.
fn cubic(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// Four source indices and their integer weights (summing to 4096).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CubicTap {
    index: [usize; 4],
    weight: [i32; 4],
}

fn cubic_taps(src: u32, dst: u32) -> Vec<CubicTap> {
    let last = src as i64 - 1;
    (0..dst)
        .map(|i| {
            let s = center_coord(i, src, dst) as f64;
            let base = s.floor();
            let t = s - base;
            let base = base as i64;

            let mut index = [0usize; 4];
            let mut weight = [0i32; 4];
            for k in 0..4 {
                index[k] = (base + k as i64 - 1).clamp(0, last) as usize;
                weight[k] = (cubic(t + 1.0 - k as f64) * WEIGHT_ONE as f64).round() as i32;
            }
            // Quantization error goes to the heavier of the two center taps.
            let drift = WEIGHT_ONE - weight.iter().sum::<i32>();
            let center = if weight[1] >= weight[2] { 1 } else { 2 };
            weight[center] += drift;

            CubicTap { index, weight }
        })
        .collect()
}

#[inline]
fn finish(sum: i64) -> u8 {
    ((sum + ROUND) >> (2 * WEIGHT_BITS)).clamp(0, 255) as u8
}

fn bicubic_reference<const C: usize>(
    image: &PixelBuffer,
    xs: &[CubicTap],
    ys: &[CubicTap],
) -> Vec<u8> {
    let src_stride = image.stride();
    let src = image.data();
    let mut out = Vec::with_capacity(xs.len() * ys.len() * C);

    for ty in ys {
        for tx in xs {
            let mut acc = [0i64; C];
            for (&sy, &wy) in ty.index.iter().zip(&ty.weight) {
                let row = &src[sy * src_stride..];
                for (&sx, &wx) in tx.index.iter().zip(&tx.weight) {
                    let w = wy as i64 * wx as i64;
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += w * row[sx * C + c] as i64;
                    }
                }
            }
            out.extend(acc.iter().map(|&a| finish(a)));
        }
    }
    out
}

fn bicubic_separable<const C: usize>(
    image: &PixelBuffer,
    xs: &[CubicTap],
    ys: &[CubicTap],
) -> Vec<u8> {
    let src_stride = image.stride();
    let mid_stride = xs.len() * C;
    let src = image.data();

    let mut mid = vec![0i32; image.height() as usize * mid_stride];
    mid.par_chunks_mut(mid_stride)
        .zip(src.par_chunks(src_stride))
        .for_each(|(mid_row, row)| {
            for (tx, cell) in xs.iter().zip(mid_row.chunks_exact_mut(C)) {
                for (&sx, &wx) in tx.index.iter().zip(&tx.weight) {
                    for (c, m) in cell.iter_mut().enumerate() {
                        *m += wx * row[sx * C + c] as i32;
                    }
                }
            }
        });

    let mut out = vec![0u8; ys.len() * mid_stride];
    out.par_chunks_mut(mid_stride)
        .zip(ys.par_iter())
        .for_each(|(out_row, ty)| {
            for (i, v) in out_row.iter_mut().enumerate() {
                let sum: i64 = ty
                    .index
                    .iter()
                    .zip(&ty.weight)
                    .map(|(&sy, &wy)| wy as i64 * mid[sy * mid_stride + i] as i64)
                    .sum();
                *v = finish(sum);
            }
        });
    out
}

/// Bicubic resize, one pixel at a time over its full 4x4 neighborhood.
///
/// Slow but straightforward; [`resize_bicubic`] must match it exactly.
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if `width` or `height` is zero.
pub fn resize_bicubic_reference(
    image: &PixelBuffer,
    width: u32,
    height: u32,
) -> Result<PixelBuffer> {
    if let Some(copy) = prepare(image, width, height)? {
        return Ok(copy);
    }
    let xs = cubic_taps(image.width(), width);
    let ys = cubic_taps(image.height(), height);
    let data = match image.layout() {
        PixelLayout::Gray8 => bicubic_reference::<1>(image, &xs, &ys),
        PixelLayout::Rgb24 => bicubic_reference::<3>(image, &xs, &ys),
        PixelLayout::Rgba32 => bicubic_reference::<4>(image, &xs, &ys),
    };
    Ok(PixelBuffer::from_raw(width, height, image.layout(), data))
}

/// Bicubic resize with precomputed weight tables.
///
/// Runs a horizontal pass into an integer intermediate and then a vertical
/// pass, each parallelized over rows. Output is byte-identical to
/// [`resize_bicubic_reference`].
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if `width` or `height` is zero.
pub fn resize_bicubic(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if let Some(copy) = prepare(image, width, height)? {
        return Ok(copy);
    }
    let xs = cubic_taps(image.width(), width);
    let ys = cubic_taps(image.height(), height);
    let data = match image.layout() {
        PixelLayout::Gray8 => bicubic_separable::<1>(image, &xs, &ys),
        PixelLayout::Rgb24 => bicubic_separable::<3>(image, &xs, &ys),
        PixelLayout::Rgba32 => bicubic_separable::<4>(image, &xs, &ys),
    };
    Ok(PixelBuffer::from_raw(width, height, image.layout(), data))
}

/// Largest size with the source aspect ratio that fits in `max_width x max_height`.
///
/// Computed exactly in integers; each dimension is at least 1. The box may be
/// larger than the source.
pub fn fit_dimensions(
    src_width: u32,
    src_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    let (sw, sh) = (src_width as u64, src_height as u64);
    let (mw, mh) = (max_width as u64, max_height as u64);
    let (w, h) = if mw * sh <= mh * sw {
        (mw, sh * mw / sw)
    } else {
        (sw * mh / sh, mh)
    };
    (w.max(1) as u32, h.max(1) as u32)
}

/// Scale an image to fit within `max_width x max_height`, keeping its aspect
/// ratio, using the generic [`resize`].
///
/// # Errors
///
/// Returns `CodecError::InvalidDimensions` if either bound is zero.
pub fn resize_to_fit(image: &PixelBuffer, max_width: u32, max_height: u32) -> Result<PixelBuffer> {
    if max_width == 0 || max_height == 0 {
        return Err(CodecError::InvalidDimensions {
            width: max_width,
            height: max_height,
        });
    }
    let (width, height) = fit_dimensions(image.width(), image.height(), max_width, max_height);
    resize(image, width, height)
}
