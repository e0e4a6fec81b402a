//! Marker parser and entropy decoder for sequential and progressive JPEG.
//!
//! Every scan writes quantized coefficients into per-component block storage
//! sized to the MCU grid. Once `EOI` is reached the blocks are dequantized,
//! inverse transformed, upsampled and colour converted in one pass, so
//! baseline and progressive files share the same output path.

use std::ops::RangeInclusive;

use tracing::{debug, trace, warn};

use crate::buffer::{PixelBuffer, PixelLayout};
use crate::error::{CodecError, Result};
use crate::transform::Orientation;

use super::color::ycbcr_to_rgb;
use super::dct::Dct;
use super::huffman::{BitReader, HuffmanTable};
use super::marker;
use super::metadata::orientation_from_app1;
use super::tables::ZIGZAG_TO_NATURAL;

type Block = [i32; 64];

/// Quantized DC values outside this range cannot come from 8-bit samples.
const DC_RANGE: RangeInclusive<i32> = i16::MIN as i32..=i16::MAX as i32;

/// A decoded JPEG before orientation is applied.
#[derive(Debug, Clone)]
pub struct DecodedJpeg {
    pub buffer: PixelBuffer,
    pub orientation: Orientation,
}

#[derive(Debug)]
struct Component {
    id: u8,
    h: usize,
    v: usize,
    quant_id: usize,
    /// Quantization table latched at the component's first scan.
    quant: Option<[u16; 64]>,
    /// Block grid covering whole MCUs.
    blocks_w: usize,
    blocks_h: usize,
    /// Blocks holding actual image samples (non-interleaved scan extent).
    data_blocks_w: usize,
    data_blocks_h: usize,
    coeffs: Vec<Block>,
    dc_pred: i32,
}

impl Component {
    #[inline]
    fn block_mut(&mut self, bx: usize, by: usize) -> &mut Block {
        &mut self.coeffs[by * self.blocks_w + bx]
    }
}

#[derive(Debug)]
struct Frame {
    progressive: bool,
    width: usize,
    height: usize,
    max_h: usize,
    max_v: usize,
    mcus_x: usize,
    mcus_y: usize,
    components: Vec<Component>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

#[derive(Debug)]
struct Scan {
    kind: ScanKind,
    /// Frame component indices with their DC and AC table ids.
    members: Vec<(usize, usize, usize)>,
    ss: usize,
    se: usize,
    al: u32,
}

#[inline]
fn be_u16(data: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([data[off], data[off + 1]])
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    quant: [Option<[u16; 64]>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    restart_interval: usize,
    frame: Option<Frame>,
    orientation: Orientation,
    eob_run: u32,
    scans: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < 2 || data[0] != 0xFF || data[1] != marker::SOI {
            return Err(CodecError::corrupt("Missing JPEG SOI marker"));
        }
        Ok(Self {
            data,
            pos: 2,
            quant: [None; 4],
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            restart_interval: 0,
            frame: None,
            orientation: Orientation::Normal,
            eob_run: 0,
            scans: 0,
        })
    }

    /// Advance to the next marker and return its code.
    fn next_marker(&mut self) -> Result<u8> {
        let mut skipped = 0usize;
        loop {
            while self.pos < self.data.len() && self.data[self.pos] != 0xFF {
                self.pos += 1;
                skipped += 1;
            }
            while self.pos < self.data.len() && self.data[self.pos] == 0xFF {
                self.pos += 1;
            }
            let Some(&code) = self.data.get(self.pos) else {
                return Err(CodecError::corrupt("Missing JPEG EOI marker"));
            };
            self.pos += 1;
            if code != 0x00 {
                if skipped > 0 {
                    warn!(skipped, "Skipped extraneous bytes before JPEG marker");
                }
                return Ok(code);
            }
            skipped += 2;
        }
    }

    /// Read a length-prefixed segment body.
    fn segment(&mut self) -> Result<&'a [u8]> {
        if self.pos + 2 > self.data.len() {
            return Err(CodecError::corrupt("Truncated JPEG segment header"));
        }
        let len = be_u16(self.data, self.pos) as usize;
        if len < 2 {
            return Err(CodecError::unsupported(format!(
                "Malformed JPEG segment length {len}"
            )));
        }
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(CodecError::corrupt("JPEG segment runs past end of data"));
        }
        let body = &self.data[self.pos + 2..end];
        self.pos = end;
        Ok(body)
    }

    fn run(mut self) -> Result<DecodedJpeg> {
        loop {
            let code = self.next_marker()?;
            match code {
                marker::EOI => break,
                marker::SOF0 | marker::SOF1 => self.read_frame(false)?,
                marker::SOF2 => self.read_frame(true)?,
                0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                    return Err(CodecError::unsupported(format!(
                        "JPEG process SOF{} is not supported",
                        code - 0xC0
                    )));
                }
                marker::DHT => self.read_huffman_tables()?,
                marker::DQT => self.read_quant_tables()?,
                marker::DRI => self.read_restart_interval()?,
                marker::SOS => self.read_scan()?,
                marker::APP1 => {
                    let body = self.segment()?;
                    if let Some(orientation) = orientation_from_app1(body) {
                        self.orientation = orientation;
                    }
                }
                marker::SOI => return Err(CodecError::corrupt("Unexpected SOI marker")),
                marker::RST0..=marker::RST7 | marker::TEM => {
                    trace!(marker = code, "Ignoring standalone marker");
                }
                _ => {
                    self.segment()?;
                }
            }
        }

        let frame = self
            .frame
            .take()
            .ok_or_else(|| CodecError::corrupt("JPEG has no frame header"))?;
        if self.scans == 0 {
            return Err(CodecError::corrupt("JPEG has no scan data"));
        }
        let buffer = render(&frame)?;
        Ok(DecodedJpeg {
            buffer,
            orientation: self.orientation,
        })
    }

    fn read_quant_tables(&mut self) -> Result<()> {
        let mut body = self.segment()?;
        while !body.is_empty() {
            let precision = body[0] >> 4;
            let id = (body[0] & 0x0F) as usize;
            if id > 3 {
                return Err(CodecError::corrupt(format!("Invalid quantization table id {id}")));
            }
            let size = match precision {
                0 => 64,
                1 => 128,
                _ => {
                    return Err(CodecError::unsupported(format!(
                        "Quantization table precision {precision}"
                    )))
                }
            };
            if body.len() < 1 + size {
                return Err(CodecError::unsupported("DQT length inconsistent with contents"));
            }
            let mut table = [0u16; 64];
            for (k, &natural) in ZIGZAG_TO_NATURAL.iter().enumerate() {
                table[natural] = if precision == 0 {
                    body[1 + k] as u16
                } else {
                    be_u16(body, 1 + 2 * k)
                };
            }
            trace!(id, precision, "Loaded quantization table");
            self.quant[id] = Some(table);
            body = &body[1 + size..];
        }
        Ok(())
    }

    fn read_huffman_tables(&mut self) -> Result<()> {
        let mut body = self.segment()?;
        while !body.is_empty() {
            let class = body[0] >> 4;
            let id = (body[0] & 0x0F) as usize;
            if class > 1 || id > 3 {
                return Err(CodecError::corrupt(format!(
                    "Invalid Huffman table class {class} id {id}"
                )));
            }
            if body.len() < 17 {
                return Err(CodecError::unsupported("DHT length inconsistent with contents"));
            }
            let mut counts = [0u8; 16];
            counts.copy_from_slice(&body[1..17]);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            if body.len() < 17 + total {
                return Err(CodecError::unsupported("DHT length inconsistent with contents"));
            }
            let table = HuffmanTable::new(&counts, &body[17..17 + total])?;
            trace!(class, id, symbols = total, "Loaded Huffman table");
            if class == 0 {
                self.dc_tables[id] = Some(table);
            } else {
                self.ac_tables[id] = Some(table);
            }
            body = &body[17 + total..];
        }
        Ok(())
    }

    fn read_restart_interval(&mut self) -> Result<()> {
        let body = self.segment()?;
        if body.len() != 2 {
            return Err(CodecError::unsupported("DRI length inconsistent with contents"));
        }
        self.restart_interval = be_u16(body, 0) as usize;
        Ok(())
    }

    fn read_frame(&mut self, progressive: bool) -> Result<()> {
        let body = self.segment()?;
        if self.frame.is_some() {
            return Err(CodecError::corrupt("Multiple JPEG frame headers"));
        }
        if body.len() < 6 {
            return Err(CodecError::unsupported("SOF length inconsistent with contents"));
        }
        let precision = body[0];
        if precision != 8 {
            return Err(CodecError::unsupported(format!(
                "{precision}-bit JPEG samples"
            )));
        }
        let height = be_u16(body, 1) as usize;
        let width = be_u16(body, 3) as usize;
        let count = body[5] as usize;
        if body.len() != 6 + 3 * count {
            return Err(CodecError::unsupported("SOF length inconsistent with contents"));
        }
        if height == 0 {
            return Err(CodecError::unsupported("JPEG height defined by DNL marker"));
        }
        if width == 0 {
            return Err(CodecError::corrupt("JPEG width is zero"));
        }
        if count != 1 && count != 3 {
            return Err(CodecError::unsupported(format!(
                "JPEG with {count} components"
            )));
        }

        let mut specs: Vec<(u8, usize, usize, usize)> = Vec::with_capacity(count);
        for i in 0..count {
            let c = &body[6 + 3 * i..9 + 3 * i];
            let (id, h, v, quant_id) = (c[0], (c[1] >> 4) as usize, (c[1] & 0x0F) as usize, c[2]);
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(CodecError::corrupt(format!(
                    "Invalid sampling factors {h}x{v}"
                )));
            }
            if quant_id > 3 {
                return Err(CodecError::corrupt(format!(
                    "Invalid quantization table id {quant_id}"
                )));
            }
            if specs.iter().any(|&(other, ..)| other == id) {
                return Err(CodecError::corrupt(format!("Duplicate component id {id}")));
            }
            specs.push((id, h, v, quant_id as usize));
        }

        // A single component is always coded one block per MCU.
        if count == 1 {
            specs[0].1 = 1;
            specs[0].2 = 1;
        }

        let max_h = specs.iter().map(|s| s.1).max().unwrap_or(1);
        let max_v = specs.iter().map(|s| s.2).max().unwrap_or(1);
        if specs.iter().any(|s| max_h % s.1 != 0 || max_v % s.2 != 0) {
            return Err(CodecError::unsupported("Non-integer chroma sampling ratio"));
        }

        let mcus_x = width.div_ceil(8 * max_h);
        let mcus_y = height.div_ceil(8 * max_v);
        let components = specs
            .into_iter()
            .map(|(id, h, v, quant_id)| {
                let blocks_w = mcus_x * h;
                let blocks_h = mcus_y * v;
                Component {
                    id,
                    h,
                    v,
                    quant_id,
                    quant: None,
                    blocks_w,
                    blocks_h,
                    data_blocks_w: (width * h).div_ceil(max_h).div_ceil(8),
                    data_blocks_h: (height * v).div_ceil(max_v).div_ceil(8),
                    coeffs: vec![[0; 64]; blocks_w * blocks_h],
                    dc_pred: 0,
                }
            })
            .collect();

        debug!(width, height, components = count, progressive, "Decoding JPEG frame");
        self.frame = Some(Frame {
            progressive,
            width,
            height,
            max_h,
            max_v,
            mcus_x,
            mcus_y,
            components,
        });
        Ok(())
    }

    fn read_scan(&mut self) -> Result<()> {
        let body = self.segment()?;
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| CodecError::corrupt("JPEG scan before frame header"))?;

        let count = *body
            .first()
            .ok_or_else(|| CodecError::unsupported("SOS length inconsistent with contents"))?
            as usize;
        if body.len() != 4 + 2 * count {
            return Err(CodecError::unsupported("SOS length inconsistent with contents"));
        }
        if count == 0 || count > frame.components.len() {
            return Err(CodecError::corrupt(format!("Invalid scan component count {count}")));
        }

        let mut members: Vec<(usize, usize, usize)> = Vec::with_capacity(count);
        for i in 0..count {
            let id = body[1 + 2 * i];
            let tables = body[2 + 2 * i];
            let index = frame
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| {
                    CodecError::corrupt(format!("Scan references unknown component {id}"))
                })?;
            if members.iter().any(|&(m, ..)| m == index) {
                return Err(CodecError::corrupt("Component repeated within a scan"));
            }
            members.push((index, (tables >> 4) as usize, (tables & 0x0F) as usize));
        }

        let params = &body[1 + 2 * count..];
        let (ss, se) = (params[0] as usize, params[1] as usize);
        let (ah, al) = ((params[2] >> 4) as u32, (params[2] & 0x0F) as u32);

        let kind = if !frame.progressive {
            if ss != 0 || se != 63 || ah != 0 || al != 0 {
                return Err(CodecError::corrupt("Invalid sequential scan parameters"));
            }
            ScanKind::Sequential
        } else {
            let valid = if ss == 0 {
                se == 0
            } else {
                ss <= se && se <= 63 && count == 1
            };
            if !valid || al > 13 || (ah != 0 && ah != al + 1) {
                return Err(CodecError::corrupt("Invalid progressive scan parameters"));
            }
            match (ss == 0, ah == 0) {
                (true, true) => ScanKind::DcFirst,
                (true, false) => ScanKind::DcRefine,
                (false, true) => ScanKind::AcFirst,
                (false, false) => ScanKind::AcRefine,
            }
        };

        let needs_dc = matches!(kind, ScanKind::Sequential | ScanKind::DcFirst);
        let needs_ac = matches!(
            kind,
            ScanKind::Sequential | ScanKind::AcFirst | ScanKind::AcRefine
        );
        for &(index, dc, ac) in &members {
            if dc > 3 || ac > 3 {
                return Err(CodecError::corrupt("Invalid Huffman table id in scan"));
            }
            if needs_dc && self.dc_tables[dc].is_none() {
                return Err(CodecError::corrupt(format!("Undefined DC Huffman table {dc}")));
            }
            if needs_ac && self.ac_tables[ac].is_none() {
                return Err(CodecError::corrupt(format!("Undefined AC Huffman table {ac}")));
            }
            let component = &mut frame.components[index];
            if component.quant.is_none() {
                let table = self.quant[component.quant_id].ok_or_else(|| {
                    CodecError::corrupt(format!(
                        "Undefined quantization table {}",
                        component.quant_id
                    ))
                })?;
                component.quant = Some(table);
            }
        }

        let scan = Scan {
            kind,
            members,
            ss,
            se,
            al,
        };
        trace!(?scan.kind, components = count, ss, se, ah, al, "Decoding scan");
        self.decode_scan(&scan)?;
        self.scans += 1;
        Ok(())
    }

    fn decode_scan(&mut self, scan: &Scan) -> Result<()> {
        let Decoder {
            data,
            pos,
            dc_tables,
            ac_tables,
            restart_interval,
            frame,
            eob_run,
            ..
        } = self;
        let frame = frame
            .as_mut()
            .ok_or_else(|| CodecError::corrupt("JPEG scan before frame header"))?;

        let mut reader = BitReader::new(*data, *pos);
        *eob_run = 0;
        for component in &mut frame.components {
            component.dc_pred = 0;
        }

        let mut ctx = ScanContext {
            reader: &mut reader,
            dc_tables: &*dc_tables,
            ac_tables: &*ac_tables,
            eob_run,
            scan,
        };

        let mut restarts = 0u8;
        if let [(index, _, _)] = scan.members[..] {
            // Non-interleaved: one block per MCU over the component's data area.
            let (bw, bh) = {
                let c = &frame.components[index];
                (c.data_blocks_w, c.data_blocks_h)
            };
            for n in 0..bw * bh {
                if *restart_interval > 0 && n > 0 && n % *restart_interval == 0 {
                    ctx.restart(&mut frame.components, restarts)?;
                    restarts = restarts.wrapping_add(1);
                }
                ctx.decode_block(&mut frame.components[index], 0, n % bw, n / bw)?;
            }
        } else {
            for n in 0..frame.mcus_x * frame.mcus_y {
                if *restart_interval > 0 && n > 0 && n % *restart_interval == 0 {
                    ctx.restart(&mut frame.components, restarts)?;
                    restarts = restarts.wrapping_add(1);
                }
                let (mx, my) = (n % frame.mcus_x, n / frame.mcus_x);
                for (slot, &(index, _, _)) in scan.members.iter().enumerate() {
                    let component = &mut frame.components[index];
                    for v in 0..component.v {
                        for h in 0..component.h {
                            let (bx, by) = (mx * component.h + h, my * component.v + v);
                            ctx.decode_block(component, slot, bx, by)?;
                        }
                    }
                }
            }
        }

        *pos = match reader.next_marker() {
            Some(_) => reader.position(),
            None => data.len(),
        };
        Ok(())
    }
}

struct ScanContext<'r, 'a> {
    reader: &'r mut BitReader<'a>,
    dc_tables: &'r [Option<HuffmanTable>; 4],
    ac_tables: &'r [Option<HuffmanTable>; 4],
    eob_run: &'r mut u32,
    scan: &'r Scan,
}

impl<'r> ScanContext<'r, '_> {
    fn restart(&mut self, components: &mut [Component], expected: u8) -> Result<()> {
        match self.reader.next_marker() {
            Some(code @ marker::RST0..=marker::RST7) => {
                if code - marker::RST0 != expected % 8 {
                    warn!(
                        found = code - marker::RST0,
                        expected = expected % 8,
                        "Restart marker out of sequence"
                    );
                }
                self.reader.skip_marker();
            }
            _ => return Err(CodecError::corrupt("Missing JPEG restart marker")),
        }
        for component in components {
            component.dc_pred = 0;
        }
        *self.eob_run = 0;
        Ok(())
    }

    fn dc_table(&self, slot: usize) -> Result<&'r HuffmanTable> {
        let id = self.scan.members[slot].1;
        let tables: &'r [Option<HuffmanTable>; 4] = self.dc_tables;
        tables[id]
            .as_ref()
            .ok_or_else(|| CodecError::corrupt(format!("Undefined DC Huffman table {id}")))
    }

    fn ac_table(&self, slot: usize) -> Result<&'r HuffmanTable> {
        let id = self.scan.members[slot].2;
        let tables: &'r [Option<HuffmanTable>; 4] = self.ac_tables;
        tables[id]
            .as_ref()
            .ok_or_else(|| CodecError::corrupt(format!("Undefined AC Huffman table {id}")))
    }

    fn decode_block(
        &mut self,
        component: &mut Component,
        slot: usize,
        bx: usize,
        by: usize,
    ) -> Result<()> {
        let mut pred = component.dc_pred;
        let block = component.block_mut(bx, by);
        match self.scan.kind {
            ScanKind::Sequential => {
                self.dc_first(slot, block, &mut pred, 0)?;
                self.ac_sequential(slot, block)?;
            }
            ScanKind::DcFirst => self.dc_first(slot, block, &mut pred, self.scan.al)?,
            ScanKind::DcRefine => {
                if self.reader.bit() {
                    block[0] |= 1 << self.scan.al;
                }
            }
            ScanKind::AcFirst => self.ac_first(slot, block)?,
            ScanKind::AcRefine => self.ac_refine(slot, block)?,
        }
        component.dc_pred = pred;
        Ok(())
    }

    fn dc_first(&mut self, slot: usize, block: &mut Block, pred: &mut i32, al: u32) -> Result<()> {
        let table = self.dc_table(slot)?;
        let size = self.reader.decode(table)?;
        if size > 11 {
            return Err(CodecError::corrupt(format!("Invalid DC magnitude category {size}")));
        }
        let dc = *pred + self.reader.receive_extend(size as u32);
        if !DC_RANGE.contains(&dc) {
            return Err(CodecError::corrupt(format!("DC coefficient {dc} out of range")));
        }
        *pred = dc;
        block[0] = dc << al;
        Ok(())
    }

    fn ac_sequential(&mut self, slot: usize, block: &mut Block) -> Result<()> {
        let table = self.ac_table(slot)?;
        let mut k = 1;
        while k < 64 {
            let rs = self.reader.decode(table)?;
            let (run, size) = ((rs >> 4) as usize, (rs & 0x0F) as u32);
            if size == 0 {
                if run == 15 {
                    k += 16;
                    continue;
                }
                break;
            }
            k += run;
            if k > 63 {
                return Err(CodecError::corrupt("AC coefficient index out of range"));
            }
            block[ZIGZAG_TO_NATURAL[k]] = self.reader.receive_extend(size);
            k += 1;
        }
        Ok(())
    }

    fn ac_first(&mut self, slot: usize, block: &mut Block) -> Result<()> {
        if *self.eob_run > 0 {
            *self.eob_run -= 1;
            return Ok(());
        }
        let table = self.ac_table(slot)?;
        let (se, al) = (self.scan.se, self.scan.al);
        let mut k = self.scan.ss;
        while k <= se {
            let rs = self.reader.decode(table)?;
            let (run, size) = ((rs >> 4) as u32, (rs & 0x0F) as u32);
            if size == 0 {
                if run < 15 {
                    *self.eob_run = (1 << run) - 1 + self.reader.bits(run);
                    break;
                }
                k += 16;
                continue;
            }
            k += run as usize;
            if k > se {
                return Err(CodecError::corrupt("AC coefficient index out of range"));
            }
            block[ZIGZAG_TO_NATURAL[k]] = self.reader.receive_extend(size) * (1 << al);
            k += 1;
        }
        Ok(())
    }

    fn ac_refine(&mut self, slot: usize, block: &mut Block) -> Result<()> {
        let table = self.ac_table(slot)?;
        let se = self.scan.se;
        let p1 = 1i32 << self.scan.al;
        let m1 = -1i32 << self.scan.al;
        let mut k = self.scan.ss;

        if *self.eob_run == 0 {
            while k <= se {
                let rs = self.reader.decode(table)?;
                let (run, size) = ((rs >> 4) as u32, rs & 0x0F);
                let mut value = 0;
                if size != 0 {
                    if size != 1 {
                        return Err(CodecError::corrupt("Invalid AC refinement magnitude"));
                    }
                    value = if self.reader.bit() { p1 } else { m1 };
                } else if run != 15 {
                    *self.eob_run = (1 << run) + self.reader.bits(run);
                    break;
                }

                // Skip `run` zero-history coefficients, refining non-zero ones on the way.
                let mut remaining = run as i32;
                while k <= se {
                    let coef = &mut block[ZIGZAG_TO_NATURAL[k]];
                    if *coef != 0 {
                        refine(self.reader, coef, p1, m1);
                    } else {
                        remaining -= 1;
                        if remaining < 0 {
                            break;
                        }
                    }
                    k += 1;
                }

                if value != 0 {
                    if k > se {
                        return Err(CodecError::corrupt("AC coefficient index out of range"));
                    }
                    block[ZIGZAG_TO_NATURAL[k]] = value;
                }
                k += 1;
            }
        }

        if *self.eob_run > 0 {
            while k <= se {
                let coef = &mut block[ZIGZAG_TO_NATURAL[k]];
                if *coef != 0 {
                    refine(self.reader, coef, p1, m1);
                }
                k += 1;
            }
            *self.eob_run -= 1;
        }
        Ok(())
    }
}

/// Apply one correction bit to an already non-zero coefficient.
#[inline]
fn refine(reader: &mut BitReader<'_>, coef: &mut i32, p1: i32, m1: i32) {
    if reader.bit() && *coef & p1 == 0 {
        *coef += if *coef >= 0 { p1 } else { m1 };
    }
}

/// Reconstruct sample planes and convert them to an Rgb24 buffer.
fn render(frame: &Frame) -> Result<PixelBuffer> {
    let dct = Dct::new();
    let mut planes = Vec::with_capacity(frame.components.len());
    for component in &frame.components {
        let quant = component.quant.ok_or_else(|| {
            CodecError::corrupt(format!("Component {} has no scan data", component.id))
        })?;
        planes.push(reconstruct_plane(&dct, component, &quant));
    }

    let (w, h) = (frame.width, frame.height);
    let mut data = vec![0u8; w * h * 3];
    if let [luma] = &planes[..] {
        let stride = frame.components[0].blocks_w * 8;
        for (y, row) in data.chunks_exact_mut(w * 3).enumerate() {
            let src = &luma[y * stride..y * stride + w];
            for (px, &v) in row.chunks_exact_mut(3).zip(src) {
                px.copy_from_slice(&[v, v, v]);
            }
        }
    } else {
        let strides: Vec<usize> = frame.components.iter().map(|c| c.blocks_w * 8).collect();
        for (y, row) in data.chunks_exact_mut(w * 3).enumerate() {
            let rows: Vec<&[u8]> = frame
                .components
                .iter()
                .zip(&planes)
                .zip(&strides)
                .map(|((c, plane), &stride)| {
                    let sy = y * c.v / frame.max_v;
                    &plane[sy * stride..(sy + 1) * stride]
                })
                .collect();
            let (hy, hb, hr) = (
                frame.components[0].h,
                frame.components[1].h,
                frame.components[2].h,
            );
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let yv = rows[0][x * hy / frame.max_h];
                let cb = rows[1][x * hb / frame.max_h];
                let cr = rows[2][x * hr / frame.max_h];
                px.copy_from_slice(&ycbcr_to_rgb(yv, cb, cr));
            }
        }
    }

    Ok(PixelBuffer::from_raw(w as u32, h as u32, PixelLayout::Rgb24, data))
}

/// Dequantize and inverse transform every block of a component.
fn reconstruct_plane(dct: &Dct, component: &Component, quant: &[u16; 64]) -> Vec<u8> {
    let stride = component.blocks_w * 8;
    let mut plane = vec![0u8; stride * component.blocks_h * 8];
    let mut samples = [0u8; 64];
    for (i, block) in component.coeffs.iter().enumerate() {
        let (bx, by) = (i % component.blocks_w, i / component.blocks_w);
        let dequant: Block = std::array::from_fn(|k| block[k].saturating_mul(quant[k] as i32));
        dct.inverse(&dequant, &mut samples);
        for (r, src) in samples.chunks_exact(8).enumerate() {
            let start = (by * 8 + r) * stride + bx * 8;
            plane[start..start + 8].copy_from_slice(src);
        }
    }
    plane
}

/// Decode a complete JPEG file.
pub fn decode(bytes: &[u8]) -> Result<DecodedJpeg> {
    Decoder::new(bytes)?.run()
}

/// Scan header segments for the EXIF orientation without decoding pixels.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let Ok(mut decoder) = Decoder::new(bytes) else {
        return Orientation::Normal;
    };
    while let Ok(code) = decoder.next_marker() {
        match code {
            marker::SOS | marker::EOI => break,
            marker::RST0..=marker::RST7 | marker::TEM => {}
            marker::APP1 => match decoder.segment() {
                Ok(body) => {
                    if let Some(orientation) = orientation_from_app1(body) {
                        return orientation;
                    }
                }
                Err(_) => break,
            },
            _ => {
                if decoder.segment().is_err() {
                    break;
                }
            }
        }
    }
    Orientation::Normal
}
