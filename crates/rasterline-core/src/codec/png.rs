//! PNG reading and writing for 8-bit truecolor images.
//!
//! Chunks are CRC-checked, `IDAT` payloads are concatenated and inflated with
//! `flate2`, and each scanline is reconstructed from its filter byte. The
//! encoder writes `None` filters by default or picks a filter per row when
//! [`PngFilterStrategy::Adaptive`] is configured.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use tracing::{debug, trace};

use crate::buffer::{PixelBuffer, PixelLayout};
use crate::config::{PngFilterStrategy, PngOptions};
use crate::error::{CodecError, Result};

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Maximum payload written per `IDAT` chunk.
const IDAT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunk lengths are limited to 2^31 - 1.
const MAX_CHUNK_LEN: usize = 0x7FFF_FFFF;

const COLOR_TYPE_RGB: u8 = 2;
const COLOR_TYPE_RGBA: u8 = 6;

/// Scanline filter types.
const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

#[derive(Debug, Clone, Copy)]
struct Header {
    width: u32,
    height: u32,
    layout: PixelLayout,
}

#[inline]
fn be_u32(data: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn chunk_crc(kind: &[u8], data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    crc.sum()
}

/// Check for the 8-byte PNG signature.
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Paeth predictor (filter type 4).
#[inline]
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn parse_ihdr(data: &[u8]) -> Result<Header> {
    if data.len() != 13 {
        return Err(CodecError::corrupt(format!(
            "IHDR length {} (expected 13)",
            data.len()
        )));
    }

    let width = be_u32(data, 0);
    let height = be_u32(data, 4);
    let bit_depth = data[8];
    let color_type = data[9];
    let compression = data[10];
    let filter = data[11];
    let interlace = data[12];

    if width == 0 || height == 0 {
        return Err(CodecError::corrupt(format!(
            "PNG dimensions {}x{}",
            width, height
        )));
    }
    let layout = match color_type {
        COLOR_TYPE_RGB => PixelLayout::Rgb24,
        COLOR_TYPE_RGBA => PixelLayout::Rgba32,
        other => {
            return Err(CodecError::unsupported(format!("PNG color type {}", other)));
        }
    };
    if bit_depth != 8 {
        return Err(CodecError::unsupported(format!("PNG bit depth {}", bit_depth)));
    }
    if compression != 0 || filter != 0 {
        return Err(CodecError::corrupt(format!(
            "PNG compression method {} / filter method {}",
            compression, filter
        )));
    }
    match interlace {
        0 => {}
        1 => return Err(CodecError::unsupported("interlaced PNG")),
        other => {
            return Err(CodecError::corrupt(format!("PNG interlace method {}", other)));
        }
    }

    Ok(Header {
        width,
        height,
        layout,
    })
}

/// Inflate a zlib stream, reading at most `expected` bytes of output.
fn inflate(compressed: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(compressed)
        .take(expected as u64)
        .read_to_end(&mut out)
        .map_err(|e| CodecError::corrupt(format!("PNG zlib stream: {}", e)))?;

    if out.len() < expected {
        return Err(CodecError::corrupt(format!(
            "PNG image data too short: {} of {} bytes",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

/// Reverse one scanline filter in place.
fn unfilter_row(filter: u8, row: &mut [u8], prev: &[u8], bpp: usize) -> Result<()> {
    match filter {
        FILTER_NONE => {}
        FILTER_SUB => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        FILTER_UP => {
            for (cur, &up) in row.iter_mut().zip(prev) {
                *cur = cur.wrapping_add(up);
            }
        }
        FILTER_AVERAGE => {
            for i in 0..row.len() {
                let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                let avg = ((left + prev[i] as u16) / 2) as u8;
                row[i] = row[i].wrapping_add(avg);
            }
        }
        FILTER_PAETH => {
            for i in 0..row.len() {
                let (left, up_left) = if i >= bpp {
                    (row[i - bpp], prev[i - bpp])
                } else {
                    (0, 0)
                };
                row[i] = row[i].wrapping_add(paeth_predictor(left, prev[i], up_left));
            }
        }
        other => {
            return Err(CodecError::corrupt(format!("PNG filter type {}", other)));
        }
    }
    Ok(())
}

/// Decode a PNG file into an `Rgb24` or `Rgba32` buffer.
///
/// # Errors
///
/// Returns `CodecError::CorruptData` for a bad signature, CRC mismatch,
/// truncated chunks, a malformed zlib stream or an unknown filter byte, and
/// `CodecError::UnsupportedVariant` for anything other than non-interlaced
/// 8-bit RGB/RGBA.
pub fn decode_png(bytes: &[u8]) -> Result<PixelBuffer> {
    if !is_png(bytes) {
        return Err(CodecError::corrupt("missing PNG signature"));
    }

    let mut pos = PNG_SIGNATURE.len();
    let mut header: Option<Header> = None;
    let mut idat = Vec::new();
    let mut seen_iend = false;

    while pos < bytes.len() {
        if pos + 8 > bytes.len() {
            return Err(CodecError::corrupt("truncated PNG chunk header"));
        }
        let length = be_u32(bytes, pos) as usize;
        if length > MAX_CHUNK_LEN {
            return Err(CodecError::corrupt(format!("PNG chunk length {}", length)));
        }
        let kind = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        let data_end = data_start + length;
        if data_end + 4 > bytes.len() {
            return Err(CodecError::corrupt(format!(
                "truncated PNG chunk {}",
                String::from_utf8_lossy(kind)
            )));
        }
        let data = &bytes[data_start..data_end];
        let stored_crc = be_u32(bytes, data_end);
        if chunk_crc(kind, data) != stored_crc {
            return Err(CodecError::corrupt(format!(
                "PNG chunk {} CRC mismatch",
                String::from_utf8_lossy(kind)
            )));
        }
        pos = data_end + 4;

        trace!(chunk = %String::from_utf8_lossy(kind), length, "PNG chunk");

        if header.is_none() && kind != b"IHDR" {
            return Err(CodecError::corrupt("first PNG chunk is not IHDR"));
        }

        match kind {
            b"IHDR" => {
                if header.is_some() {
                    return Err(CodecError::corrupt("duplicate IHDR chunk"));
                }
                header = Some(parse_ihdr(data)?);
            }
            b"IDAT" => idat.extend_from_slice(data),
            b"IEND" => {
                seen_iend = true;
                break;
            }
            // Palette is optional for truecolor images and not needed.
            b"PLTE" => {}
            _ => {
                // Bit 5 of the first byte clear = critical chunk.
                if kind[0] & 0x20 == 0 {
                    return Err(CodecError::unsupported(format!(
                        "unknown critical PNG chunk {}",
                        String::from_utf8_lossy(kind)
                    )));
                }
                debug!(chunk = %String::from_utf8_lossy(kind), "Skipping ancillary PNG chunk");
            }
        }
    }

    let header = header.ok_or_else(|| CodecError::corrupt("missing IHDR chunk"))?;
    if !seen_iend {
        return Err(CodecError::corrupt("missing IEND chunk"));
    }
    if idat.is_empty() {
        return Err(CodecError::corrupt("missing IDAT chunk"));
    }

    let bpp = header.layout.bytes_per_pixel();
    let stride = header.width as usize * bpp;
    let expected = (stride + 1)
        .checked_mul(header.height as usize)
        .ok_or(CodecError::InvalidDimensions {
            width: header.width,
            height: header.height,
        })?;
    let raw = inflate(&idat, expected)?;

    let mut out = Vec::with_capacity(stride * header.height as usize);
    let mut prev = vec![0u8; stride];
    let mut row = vec![0u8; stride];

    for line in raw.chunks_exact(stride + 1) {
        row.copy_from_slice(&line[1..]);
        unfilter_row(line[0], &mut row, &prev, bpp)?;
        out.extend_from_slice(&row);
        std::mem::swap(&mut prev, &mut row);
    }

    debug!(
        width = header.width,
        height = header.height,
        layout = ?header.layout,
        compressed = idat.len(),
        "decoded PNG"
    );
    Ok(PixelBuffer::from_raw(
        header.width,
        header.height,
        header.layout,
        out,
    ))
}

/// Apply a filter to one row, appending the filter byte and residuals to `out`.
fn filter_row(filter: u8, row: &[u8], prev: &[u8], bpp: usize, out: &mut Vec<u8>) {
    out.push(filter);
    for i in 0..row.len() {
        let left = if i >= bpp { row[i - bpp] } else { 0 };
        let up = prev[i];
        let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
        let predicted = match filter {
            FILTER_SUB => left,
            FILTER_UP => up,
            FILTER_AVERAGE => ((left as u16 + up as u16) / 2) as u8,
            FILTER_PAETH => paeth_predictor(left, up, up_left),
            _ => 0,
        };
        out.push(row[i].wrapping_sub(predicted));
    }
}

/// Pick the filter with the smallest sum of absolute (signed) residuals.
fn filter_row_adaptive(
    row: &[u8],
    prev: &[u8],
    bpp: usize,
    scratch: &mut Vec<u8>,
    out: &mut Vec<u8>,
) {
    let mut best_filter = FILTER_NONE;
    let mut best_score = u64::MAX;

    for filter in FILTER_NONE..=FILTER_PAETH {
        scratch.clear();
        filter_row(filter, row, prev, bpp, scratch);
        let score: u64 = scratch[1..]
            .iter()
            .map(|&b| (b as i8).unsigned_abs() as u64)
            .sum();
        if score < best_score {
            best_score = score;
            best_filter = filter;
        }
    }

    filter_row(best_filter, row, prev, bpp, out);
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
}

/// Encode a buffer as PNG.
///
/// `Rgb24` is written as color type 2 and `Rgba32` as color type 6; `Gray8`
/// is expanded to RGB first.
pub fn encode_png(image: &PixelBuffer, options: &PngOptions) -> Result<Vec<u8>> {
    let rgb;
    let image = if image.layout() == PixelLayout::Gray8 {
        rgb = image.to_rgb24();
        &rgb
    } else {
        image
    };

    let (width, height) = image.dimensions();
    let color_type = if image.layout() == PixelLayout::Rgba32 {
        COLOR_TYPE_RGBA
    } else {
        COLOR_TYPE_RGB
    };
    let bpp = image.layout().bytes_per_pixel();
    let stride = image.stride();

    let mut raw = Vec::with_capacity((stride + 1) * height as usize);
    let mut prev = vec![0u8; stride];
    let mut scratch = Vec::with_capacity(stride + 1);
    for y in 0..height {
        let row = image.row(y);
        match options.filter {
            PngFilterStrategy::None => filter_row(FILTER_NONE, row, &prev, bpp, &mut raw),
            PngFilterStrategy::Adaptive => {
                filter_row_adaptive(row, &prev, bpp, &mut scratch, &mut raw)
            }
        }
        prev.copy_from_slice(row);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(options.compression.min(9)));
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&height.to_be_bytes());
    ihdr[8] = 8;
    ihdr[9] = color_type;

    let mut out = Vec::with_capacity(compressed.len() + 64);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    for part in compressed.chunks(IDAT_CHUNK_SIZE) {
        write_chunk(&mut out, b"IDAT", part);
    }
    write_chunk(&mut out, b"IEND", &[]);

    debug!(width, height, color_type, bytes = out.len(), "encoded PNG");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(width: u32, height: u32, layout: PixelLayout) -> PixelBuffer {
        let len = width as usize * height as usize * layout.bytes_per_pixel();
        let data = (0..len).map(|i| ((i * 37) % 256) as u8).collect();
        PixelBuffer::new(width, height, layout, data).unwrap()
    }

    /// Assemble a PNG from an IHDR and already-filtered scanlines.
    fn build_png(ihdr: [u8; 13], raw: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = PNG_SIGNATURE.to_vec();
        write_chunk(&mut out, b"IHDR", &ihdr);
        write_chunk(&mut out, b"IDAT", &compressed);
        write_chunk(&mut out, b"IEND", &[]);
        out
    }

    fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> [u8; 13] {
        let mut h = [0u8; 13];
        h[0..4].copy_from_slice(&width.to_be_bytes());
        h[4..8].copy_from_slice(&height.to_be_bytes());
        h[8] = bit_depth;
        h[9] = color_type;
        h[12] = interlace;
        h
    }

    #[test]
    fn test_paeth_predictor() {
        assert_eq!(paeth_predictor(10, 20, 10), 20);
        assert_eq!(paeth_predictor(20, 10, 10), 20);
        assert_eq!(paeth_predictor(10, 10, 10), 10);
        assert_eq!(paeth_predictor(0, 0, 255), 0);
    }

    #[test]
    fn test_encode_structure() {
        let img = test_image(3, 2, PixelLayout::Rgb24);
        let png = encode_png(&img, &PngOptions::default()).unwrap();

        assert!(is_png(&png));
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(png[8 + 8 + 9], COLOR_TYPE_RGB);
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_round_trip_rgb_and_rgba() {
        for layout in [PixelLayout::Rgb24, PixelLayout::Rgba32] {
            let img = test_image(7, 5, layout);
            let png = encode_png(&img, &PngOptions::default()).unwrap();
            assert_eq!(decode_png(&png).unwrap(), img);
        }
    }

    #[test]
    fn test_round_trip_adaptive_filters() {
        let options = PngOptions {
            filter: PngFilterStrategy::Adaptive,
            ..PngOptions::default()
        };
        let img = test_image(16, 9, PixelLayout::Rgba32);
        let png = encode_png(&img, &options).unwrap();
        assert_eq!(decode_png(&png).unwrap(), img);
    }

    #[test]
    fn test_alpha_preserved() {
        let mut data = Vec::new();
        for i in 0..16u8 {
            let alpha = if i % 2 == 0 { 0 } else { 255 };
            data.extend_from_slice(&[i * 10, 255 - i * 10, 128, alpha]);
        }
        let img = PixelBuffer::new(4, 4, PixelLayout::Rgba32, data).unwrap();
        let decoded = decode_png(&encode_png(&img, &PngOptions::default()).unwrap()).unwrap();

        let alphas: Vec<u8> = decoded.data().chunks_exact(4).map(|px| px[3]).collect();
        assert!(alphas.contains(&0));
        assert!(alphas.contains(&255));
        assert!(alphas.iter().all(|&a| a == 0 || a == 255));
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_gray_encodes_as_rgb() {
        let img = PixelBuffer::new(2, 1, PixelLayout::Gray8, vec![5, 250]).unwrap();
        let decoded = decode_png(&encode_png(&img, &PngOptions::default()).unwrap()).unwrap();
        assert_eq!(decoded.layout(), PixelLayout::Rgb24);
        assert_eq!(decoded.data(), &[5, 5, 5, 250, 250, 250]);
    }

    #[test]
    fn test_large_image_splits_idat() {
        let img = test_image(300, 300, PixelLayout::Rgba32);
        let options = PngOptions {
            compression: 0,
            ..PngOptions::default()
        };
        let png = encode_png(&img, &options).unwrap();
        let idat_count = png.windows(4).filter(|w| *w == b"IDAT").count();
        assert!(idat_count > 1);
        assert_eq!(decode_png(&png).unwrap(), img);
    }

    #[test]
    fn test_decode_every_filter_type() {
        // 2x1 RGB rows, one per filter type, built so every row decodes to
        // [10, 20, 30, 40, 50, 60].
        let target = [10u8, 20, 30, 40, 50, 60];
        let mut raw = Vec::new();
        let mut prev = [0u8; 6];
        for filter in FILTER_NONE..=FILTER_PAETH {
            filter_row(filter, &target, &prev, 3, &mut raw);
            prev = target;
        }
        let png = build_png(ihdr(2, 5, 8, COLOR_TYPE_RGB, 0), &raw);

        let img = decode_png(&png).unwrap();
        for y in 0..5 {
            assert_eq!(img.row(y), &target);
        }
    }

    #[test]
    fn test_decode_crc_mismatch() {
        let mut png = encode_png(&test_image(2, 2, PixelLayout::Rgb24), &PngOptions::default())
            .unwrap();
        // Flip a byte inside the IHDR payload.
        png[16] ^= 0x01;
        let err = decode_png(&png).unwrap_err();
        assert!(matches!(err, CodecError::CorruptData(ref m) if m.contains("CRC")));
    }

    #[test]
    fn test_decode_truncated() {
        let png = encode_png(&test_image(4, 4, PixelLayout::Rgb24), &PngOptions::default())
            .unwrap();
        for cut in [10, 30, png.len() - 12] {
            assert!(matches!(
                decode_png(&png[..cut]),
                Err(CodecError::CorruptData(_))
            ));
        }
    }

    #[test]
    fn test_decode_short_image_data() {
        let png = build_png(ihdr(4, 4, 8, COLOR_TYPE_RGB, 0), &[0u8; 13]);
        assert!(matches!(decode_png(&png), Err(CodecError::CorruptData(_))));
    }

    #[test]
    fn test_decode_bad_filter_byte() {
        let png = build_png(ihdr(1, 1, 8, COLOR_TYPE_RGB, 0), &[9, 1, 2, 3]);
        assert!(matches!(decode_png(&png), Err(CodecError::CorruptData(_))));
    }

    #[test]
    fn test_decode_unsupported_variants() {
        // Grayscale, palette, 16-bit and interlaced images are rejected.
        let cases = [
            ihdr(1, 1, 8, 0, 0),
            ihdr(1, 1, 8, 3, 0),
            ihdr(1, 1, 16, COLOR_TYPE_RGB, 0),
            ihdr(1, 1, 8, COLOR_TYPE_RGB, 1),
        ];
        for header in cases {
            let png = build_png(header, &[0, 0, 0, 0]);
            assert!(
                matches!(decode_png(&png), Err(CodecError::UnsupportedVariant(_))),
                "header {:?} should be unsupported",
                header
            );
        }
    }

    #[test]
    fn test_decode_requires_ihdr_first() {
        let mut png = PNG_SIGNATURE.to_vec();
        write_chunk(&mut png, b"IDAT", &[0]);
        write_chunk(&mut png, b"IEND", &[]);
        assert!(matches!(decode_png(&png), Err(CodecError::CorruptData(_))));
    }

    #[test]
    fn test_decode_skips_ancillary_chunks() {
        let img = test_image(2, 2, PixelLayout::Rgb24);
        let png = encode_png(&img, &PngOptions::default()).unwrap();

        // Insert a tEXt chunk right after IHDR (8 signature + 25 IHDR bytes).
        let mut patched = png[..33].to_vec();
        write_chunk(&mut patched, b"tEXt", b"Comment\0hello");
        patched.extend_from_slice(&png[33..]);

        assert_eq!(decode_png(&patched).unwrap(), img);
    }

    #[test]
    fn test_decode_rejects_unknown_critical_chunk() {
        let img = test_image(2, 2, PixelLayout::Rgb24);
        let png = encode_png(&img, &PngOptions::default()).unwrap();

        let mut patched = png[..33].to_vec();
        write_chunk(&mut patched, b"ZZZZ", &[1, 2, 3]);
        patched.extend_from_slice(&png[33..]);

        assert!(matches!(
            decode_png(&patched),
            Err(CodecError::UnsupportedVariant(_))
        ));
    }
}
