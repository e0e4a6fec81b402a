//! Baseline JPEG encoder with standard Huffman tables.

use tracing::debug;

use crate::buffer::{PixelBuffer, PixelLayout};
use crate::config::{JpegOptions, Subsampling};
use crate::error::{CodecError, Result};

use super::color::rgb_to_ycbcr;
use super::dct::Dct;
use super::huffman::{BitWriter, HuffmanCodes};
use super::marker;
use super::tables::{
    scale_quant_table, HuffmanSpec, STD_AC_CHROMA, STD_AC_LUMA, STD_CHROMA_QUANT, STD_DC_CHROMA,
    STD_DC_LUMA, STD_LUMA_QUANT, ZIGZAG_TO_NATURAL,
};

/// One sample plane padded to a whole number of MCUs.
struct Plane {
    stride: usize,
    data: Vec<u8>,
}

impl Plane {
    /// Level-shifted samples of the 8x8 block at block coordinates `(bx, by)`.
    fn block(&self, bx: usize, by: usize) -> [f32; 64] {
        let mut out = [0.0f32; 64];
        for (r, row) in out.chunks_exact_mut(8).enumerate() {
            let start = (by * 8 + r) * self.stride + bx * 8;
            for (dst, &src) in row.iter_mut().zip(&self.data[start..start + 8]) {
                *dst = src as f32 - 128.0;
            }
        }
        out
    }

    /// Halve both axes, averaging each 2x2 group with rounding.
    fn downsample(&self) -> Plane {
        let stride = self.stride / 2;
        let rows = self.data.len() / self.stride / 2;
        let mut data = Vec::with_capacity(stride * rows);
        for y in 0..rows {
            let top = &self.data[2 * y * self.stride..(2 * y + 1) * self.stride];
            let bottom = &self.data[(2 * y + 1) * self.stride..(2 * y + 2) * self.stride];
            for x in 0..stride {
                let sum = top[2 * x] as u32
                    + top[2 * x + 1] as u32
                    + bottom[2 * x] as u32
                    + bottom[2 * x + 1] as u32;
                data.push(((sum + 2) >> 2) as u8);
            }
        }
        Plane { stride, data }
    }
}

/// Per-component coding state.
struct ComponentCoder<'a> {
    plane: Plane,
    h: usize,
    v: usize,
    quant: &'a [u16; 64],
    dc: &'a HuffmanCodes,
    ac: &'a HuffmanCodes,
    pred: i32,
}

/// Magnitude category and the low-order bits JPEG stores for `value`.
#[inline]
fn category(value: i32) -> (u8, u32) {
    let magnitude = value.unsigned_abs();
    let size = (32 - magnitude.leading_zeros()) as u8;
    let bits = if value < 0 {
        (value - 1) as u32 & ((1u32 << size) - 1)
    } else {
        value as u32
    };
    (size, bits)
}

fn encode_block(
    writer: &mut BitWriter,
    dct: &Dct,
    samples: &[f32; 64],
    coder: &mut ComponentCoder<'_>,
) {
    let freq = dct.forward(samples);
    let mut zz = [0i32; 64];
    for (k, &natural) in ZIGZAG_TO_NATURAL.iter().enumerate() {
        zz[k] = (freq[natural] / coder.quant[natural] as f32).round() as i32;
    }

    let diff = zz[0] - coder.pred;
    coder.pred = zz[0];
    let (size, bits) = category(diff);
    let (code, len) = coder.dc.get(size);
    writer.write(code as u32, len);
    writer.write(bits, size);

    let mut run = 0u8;
    for &coef in &zz[1..] {
        if coef == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            let (code, len) = coder.ac.get(0xF0);
            writer.write(code as u32, len);
            run -= 16;
        }
        let (size, bits) = category(coef);
        let (code, len) = coder.ac.get((run << 4) | size);
        writer.write(code as u32, len);
        writer.write(bits, size);
        run = 0;
    }
    if run > 0 {
        let (code, len) = coder.ac.get(0x00);
        writer.write(code as u32, len);
    }
}

fn write_segment(out: &mut Vec<u8>, code: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, code]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

fn write_jfif(out: &mut Vec<u8>) {
    // Version 1.01, no units, 1:1 density, no thumbnail.
    write_segment(
        out,
        marker::APP0,
        &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
    );
}

fn write_quant_tables(out: &mut Vec<u8>, tables: &[&[u16; 64]]) {
    let mut body = Vec::with_capacity(tables.len() * 65);
    for (id, table) in tables.iter().enumerate() {
        body.push(id as u8);
        body.extend(ZIGZAG_TO_NATURAL.iter().map(|&n| table[n] as u8));
    }
    write_segment(out, marker::DQT, &body);
}

fn write_huffman_tables(out: &mut Vec<u8>, tables: &[(u8, &HuffmanSpec)]) {
    let mut body = Vec::new();
    for &(class_id, spec) in tables {
        body.push(class_id);
        body.extend_from_slice(&spec.counts);
        body.extend_from_slice(spec.symbols);
    }
    write_segment(out, marker::DHT, &body);
}

/// Encode an image as a baseline JFIF file.
///
/// Rgba32 input drops alpha; Gray8 input produces a one-component JPEG.
///
/// # Arguments
///
/// * `image` - Pixels to encode
/// * `options` - Quality (clamped to 1-100), subsampling and restart interval
///
/// # Errors
///
/// Returns `CodecError::UnsupportedVariant` if a dimension exceeds 65535.
pub fn encode(image: &PixelBuffer, options: &JpegOptions) -> Result<Vec<u8>> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width > u16::MAX as usize || height > u16::MAX as usize {
        return Err(CodecError::unsupported(format!(
            "JPEG dimensions {width}x{height} exceed 65535"
        )));
    }

    let quality = options.quality.clamp(1, 100);
    let gray = image.layout() == PixelLayout::Gray8;
    let subsampling = if gray {
        Subsampling::S444
    } else {
        options.subsampling
    };
    debug!(width, height, quality, gray, ?subsampling, "Encoding JPEG");

    let luma_quant = scale_quant_table(&STD_LUMA_QUANT, quality);
    let chroma_quant = scale_quant_table(&STD_CHROMA_QUANT, quality);
    let dc_luma = HuffmanCodes::from_spec(&STD_DC_LUMA);
    let ac_luma = HuffmanCodes::from_spec(&STD_AC_LUMA);
    let dc_chroma = HuffmanCodes::from_spec(&STD_DC_CHROMA);
    let ac_chroma = HuffmanCodes::from_spec(&STD_AC_CHROMA);

    let (max_h, max_v) = match subsampling {
        Subsampling::S420 => (2, 2),
        Subsampling::S444 => (1, 1),
    };
    let mcus_x = width.div_ceil(8 * max_h);
    let mcus_y = height.div_ceil(8 * max_v);
    let padded_w = mcus_x * 8 * max_h;
    let padded_h = mcus_y * 8 * max_v;

    let mut coders = if gray {
        let mut data = Vec::with_capacity(padded_w * padded_h);
        for py in 0..padded_h {
            let row = image.row(py.min(height - 1) as u32);
            data.extend((0..padded_w).map(|px| row[px.min(width - 1)]));
        }
        vec![ComponentCoder {
            plane: Plane {
                stride: padded_w,
                data,
            },
            h: 1,
            v: 1,
            quant: &luma_quant,
            dc: &dc_luma,
            ac: &ac_luma,
            pred: 0,
        }]
    } else {
        let bpp = image.layout().bytes_per_pixel();
        let mut planes = [
            Vec::with_capacity(padded_w * padded_h),
            Vec::with_capacity(padded_w * padded_h),
            Vec::with_capacity(padded_w * padded_h),
        ];
        for py in 0..padded_h {
            let row = image.row(py.min(height - 1) as u32);
            for px in 0..padded_w {
                let i = px.min(width - 1) * bpp;
                let ycc = rgb_to_ycbcr(row[i], row[i + 1], row[i + 2]);
                for (plane, value) in planes.iter_mut().zip(ycc) {
                    plane.push(value);
                }
            }
        }
        let [y, cb, cr] = planes.map(|data| Plane {
            stride: padded_w,
            data,
        });
        let (cb, cr) = match subsampling {
            Subsampling::S420 => (cb.downsample(), cr.downsample()),
            Subsampling::S444 => (cb, cr),
        };
        vec![
            ComponentCoder {
                plane: y,
                h: max_h,
                v: max_v,
                quant: &luma_quant,
                dc: &dc_luma,
                ac: &ac_luma,
                pred: 0,
            },
            ComponentCoder {
                plane: cb,
                h: 1,
                v: 1,
                quant: &chroma_quant,
                dc: &dc_chroma,
                ac: &ac_chroma,
                pred: 0,
            },
            ComponentCoder {
                plane: cr,
                h: 1,
                v: 1,
                quant: &chroma_quant,
                dc: &dc_chroma,
                ac: &ac_chroma,
                pred: 0,
            },
        ]
    };

    let mut out = Vec::with_capacity(padded_w * padded_h / 4 + 1024);
    out.extend_from_slice(&[0xFF, marker::SOI]);
    write_jfif(&mut out);

    if gray {
        write_quant_tables(&mut out, &[&luma_quant]);
    } else {
        write_quant_tables(&mut out, &[&luma_quant, &chroma_quant]);
    }

    let mut sof = vec![8];
    sof.extend_from_slice(&(height as u16).to_be_bytes());
    sof.extend_from_slice(&(width as u16).to_be_bytes());
    sof.push(coders.len() as u8);
    for (i, coder) in coders.iter().enumerate() {
        let table = u8::from(i > 0);
        sof.extend_from_slice(&[i as u8 + 1, ((coder.h as u8) << 4) | coder.v as u8, table]);
    }
    write_segment(&mut out, marker::SOF0, &sof);

    if gray {
        write_huffman_tables(&mut out, &[(0x00, &STD_DC_LUMA), (0x10, &STD_AC_LUMA)]);
    } else {
        write_huffman_tables(
            &mut out,
            &[
                (0x00, &STD_DC_LUMA),
                (0x10, &STD_AC_LUMA),
                (0x01, &STD_DC_CHROMA),
                (0x11, &STD_AC_CHROMA),
            ],
        );
    }

    let restart_interval = options.restart_interval.filter(|&n| n > 0);
    if let Some(interval) = restart_interval {
        write_segment(&mut out, marker::DRI, &interval.to_be_bytes());
    }

    let mut sos = vec![coders.len() as u8];
    for i in 0..coders.len() {
        let table = if i > 0 { 0x11 } else { 0x00 };
        sos.extend_from_slice(&[i as u8 + 1, table]);
    }
    sos.extend_from_slice(&[0, 63, 0]);
    write_segment(&mut out, marker::SOS, &sos);

    let dct = Dct::new();
    let mut writer = BitWriter::new(out);
    let total = mcus_x * mcus_y;
    let mut restarts = 0u8;
    for n in 0..total {
        let (mx, my) = (n % mcus_x, n / mcus_x);
        for coder in coders.iter_mut() {
            for v in 0..coder.v {
                for h in 0..coder.h {
                    let samples = coder.plane.block(mx * coder.h + h, my * coder.v + v);
                    encode_block(&mut writer, &dct, &samples, coder);
                }
            }
        }

        if let Some(interval) = restart_interval {
            let done = n + 1;
            if done < total && done % interval as usize == 0 {
                writer.marker(marker::RST0 + restarts % 8);
                restarts = restarts.wrapping_add(1);
                for coder in coders.iter_mut() {
                    coder.pred = 0;
                }
            }
        }
    }

    let mut out = writer.into_inner();
    out.extend_from_slice(&[0xFF, marker::EOI]);
    Ok(out)
}
