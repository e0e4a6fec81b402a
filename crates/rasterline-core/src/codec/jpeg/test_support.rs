//! Hand-assembled JPEG streams built from raw quantized coefficients.
//!
//! The same coefficient set can be written as one sequential scan or as a
//! progressive scan script, so the two decode paths can be compared
//! directly. Every symbol is coded with a flat table: symbols 0-254 take
//! 8 bits and 255 takes 9, which covers EOB runs the standard tables lack.

use super::huffman::BitWriter;
use super::marker;

pub struct TestComponent {
    pub id: u8,
    pub h: usize,
    pub v: usize,
    pub blocks_w: usize,
    pub blocks_h: usize,
    data_blocks_w: usize,
    data_blocks_h: usize,
    /// Quantized coefficients in zig-zag order.
    pub blocks: Vec<[i32; 64]>,
}

pub struct TestImage {
    pub width: usize,
    pub height: usize,
    pub restart_interval: usize,
    pub components: Vec<TestComponent>,
    max_h: usize,
    max_v: usize,
}

/// Progressive scan: component indices, spectral range, successive approximation.
pub struct ScanSpec {
    pub components: Vec<usize>,
    pub ss: usize,
    pub se: usize,
    pub ah: u32,
    pub al: u32,
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    fn range(&mut self, span: i32) -> i32 {
        (self.next() % (2 * span as u32 + 1)) as i32 - span
    }
}

impl TestImage {
    /// Deterministic coefficients for the given size and sampling factors.
    pub fn generate(width: usize, height: usize, sampling: &[(usize, usize)], seed: u64) -> Self {
        let max_h = sampling.iter().map(|s| s.0).max().unwrap_or(1);
        let max_v = sampling.iter().map(|s| s.1).max().unwrap_or(1);
        let mcus_x = width.div_ceil(8 * max_h);
        let mcus_y = height.div_ceil(8 * max_v);
        let mut rng = Lcg(seed);

        let components = sampling
            .iter()
            .enumerate()
            .map(|(i, &(h, v))| {
                let (blocks_w, blocks_h) = (mcus_x * h, mcus_y * v);
                let blocks = (0..blocks_w * blocks_h)
                    .map(|_| {
                        let mut block = [0i32; 64];
                        block[0] = rng.range(120);
                        for (k, coef) in block.iter_mut().enumerate().skip(1) {
                            let roll = rng.next() % 100;
                            *coef = match k {
                                1..=9 if roll < 70 => rng.range(24),
                                10..=30 if roll < 25 => rng.range(6),
                                _ if roll < 4 => rng.range(3),
                                _ => 0,
                            };
                        }
                        block
                    })
                    .collect();
                TestComponent {
                    id: i as u8 + 1,
                    h,
                    v,
                    blocks_w,
                    blocks_h,
                    data_blocks_w: (width * h).div_ceil(max_h).div_ceil(8),
                    data_blocks_h: (height * v).div_ceil(max_v).div_ceil(8),
                    blocks,
                }
            })
            .collect();

        Self {
            width,
            height,
            restart_interval: 0,
            components,
            max_h,
            max_v,
        }
    }

    fn headers(&self, sof: u8) -> Vec<u8> {
        let mut out = vec![0xFF, marker::SOI];

        let mut dqt = vec![0u8];
        dqt.extend((0..64u8).map(|k| 2 + k / 4));
        segment(&mut out, marker::DQT, &dqt);

        let mut dht = Vec::new();
        for class_id in [0x00, 0x10] {
            dht.push(class_id);
            let mut counts = [0u8; 16];
            counts[7] = 255;
            counts[8] = 1;
            dht.extend_from_slice(&counts);
            dht.extend(0..=255u8);
        }
        segment(&mut out, marker::DHT, &dht);

        if self.restart_interval > 0 {
            segment(&mut out, marker::DRI, &(self.restart_interval as u16).to_be_bytes());
        }

        let mut frame = vec![8];
        frame.extend_from_slice(&(self.height as u16).to_be_bytes());
        frame.extend_from_slice(&(self.width as u16).to_be_bytes());
        frame.push(self.components.len() as u8);
        for c in &self.components {
            frame.extend_from_slice(&[c.id, ((c.h as u8) << 4) | c.v as u8, 0]);
        }
        segment(&mut out, sof, &frame);
        out
    }

    /// A baseline file with one interleaved scan.
    pub fn sequential(&self) -> Vec<u8> {
        let mut out = self.headers(marker::SOF0);
        let all: Vec<usize> = (0..self.components.len()).collect();
        self.write_scan(&mut out, &all, 0, 63, 0, 0, Mode::Sequential);
        out.extend_from_slice(&[0xFF, marker::EOI]);
        out
    }

    /// A progressive file following `script`.
    pub fn progressive(&self, script: &[ScanSpec]) -> Vec<u8> {
        let mut out = self.headers(marker::SOF2);
        for scan in script {
            let mode = match (scan.ss == 0, scan.ah == 0) {
                (true, true) => Mode::DcFirst,
                (true, false) => Mode::DcRefine,
                (false, true) => Mode::AcFirst,
                (false, false) => Mode::AcRefine,
            };
            self.write_scan(
                &mut out,
                &scan.components,
                scan.ss,
                scan.se,
                scan.ah,
                scan.al,
                mode,
            );
        }
        out.extend_from_slice(&[0xFF, marker::EOI]);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn write_scan(
        &self,
        out: &mut Vec<u8>,
        members: &[usize],
        ss: usize,
        se: usize,
        ah: u32,
        al: u32,
        mode: Mode,
    ) {
        let mut sos = vec![members.len() as u8];
        for &m in members {
            sos.extend_from_slice(&[self.components[m].id, 0x00]);
        }
        sos.extend_from_slice(&[ss as u8, se as u8, ((ah as u8) << 4) | al as u8]);
        segment(out, marker::SOS, &sos);

        // Blocks in scan order, grouped by MCU.
        let mut mcus: Vec<Vec<(usize, usize)>> = Vec::new();
        if let [m] = members[..] {
            let c = &self.components[m];
            for by in 0..c.data_blocks_h {
                for bx in 0..c.data_blocks_w {
                    mcus.push(vec![(m, by * c.blocks_w + bx)]);
                }
            }
        } else {
            let mcus_x = self.width.div_ceil(8 * self.max_h);
            let mcus_y = self.height.div_ceil(8 * self.max_v);
            for my in 0..mcus_y {
                for mx in 0..mcus_x {
                    let mut mcu = Vec::new();
                    for &m in members {
                        let c = &self.components[m];
                        for v in 0..c.v {
                            for h in 0..c.h {
                                mcu.push((m, (my * c.v + v) * c.blocks_w + mx * c.h + h));
                            }
                        }
                    }
                    mcus.push(mcu);
                }
            }
        }

        let mut w = ScanWriter {
            bits: BitWriter::new(std::mem::take(out)),
            preds: vec![0; self.components.len()],
            eobrun: 0,
            pending: Vec::new(),
        };
        let total = mcus.len();
        let mut restarts = 0u8;
        for (n, mcu) in mcus.into_iter().enumerate() {
            for (m, index) in mcu {
                let block = &self.components[m].blocks[index];
                match mode {
                    Mode::Sequential => w.sequential(block, m),
                    Mode::DcFirst => w.dc_first(block, m, al),
                    Mode::DcRefine => w.bits.write(((block[0] >> al) & 1) as u32, 1),
                    Mode::AcFirst => w.ac_first(block, ss, se, al),
                    Mode::AcRefine => w.ac_refine(block, ss, se, al),
                }
            }
            let done = n + 1;
            if self.restart_interval > 0 && done < total && done % self.restart_interval == 0 {
                w.flush_eobrun();
                w.bits.marker(marker::RST0 + restarts % 8);
                restarts = restarts.wrapping_add(1);
                w.preds.iter_mut().for_each(|p| *p = 0);
            }
        }
        w.flush_eobrun();
        *out = w.bits.into_inner();
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

struct ScanWriter {
    bits: BitWriter,
    preds: Vec<i32>,
    eobrun: u32,
    /// Correction bits owed after the pending EOB run.
    pending: Vec<u8>,
}

fn bit_len(v: u32) -> u8 {
    (32 - v.leading_zeros()) as u8
}

impl ScanWriter {
    fn symbol(&mut self, sym: u8) {
        if sym == 255 {
            self.bits.write(0b1_1111_1110, 9);
        } else {
            self.bits.write(sym as u32, 8);
        }
    }

    fn value(&mut self, v: i32) -> u8 {
        let size = bit_len(v.unsigned_abs());
        let bits = if v < 0 { (v - 1) as u32 } else { v as u32 };
        self.bits.write(bits & ((1u32 << size) - 1), size);
        size
    }

    fn magnitude(&mut self, v: i32) {
        let size = bit_len(v.unsigned_abs());
        self.symbol(size);
        self.value(v);
    }

    fn sequential(&mut self, block: &[i32; 64], m: usize) {
        let diff = block[0] - self.preds[m];
        self.preds[m] = block[0];
        self.magnitude(diff);

        let mut run = 0u8;
        for &coef in &block[1..] {
            if coef == 0 {
                run += 1;
                continue;
            }
            while run > 15 {
                self.symbol(0xF0);
                run -= 16;
            }
            let size = bit_len(coef.unsigned_abs());
            self.symbol((run << 4) | size);
            self.value(coef);
            run = 0;
        }
        if run > 0 {
            self.symbol(0x00);
        }
    }

    fn dc_first(&mut self, block: &[i32; 64], m: usize, al: u32) {
        let dc = block[0] >> al;
        let diff = dc - self.preds[m];
        self.preds[m] = dc;
        self.magnitude(diff);
    }

    fn flush_eobrun(&mut self) {
        if self.eobrun > 0 {
            let n = bit_len(self.eobrun) - 1;
            self.symbol(n << 4);
            self.bits.write(self.eobrun & ((1 << n) - 1), n);
            self.eobrun = 0;
        }
        for bit in std::mem::take(&mut self.pending) {
            self.bits.write(bit as u32, 1);
        }
    }

    fn ac_first(&mut self, block: &[i32; 64], ss: usize, se: usize, al: u32) {
        let mut run = 0u8;
        for &coef in &block[ss..=se] {
            let magnitude = coef.unsigned_abs() >> al;
            if magnitude == 0 {
                run += 1;
                continue;
            }
            self.flush_eobrun();
            while run > 15 {
                self.symbol(0xF0);
                run -= 16;
            }
            let v = if coef < 0 {
                -(magnitude as i32)
            } else {
                magnitude as i32
            };
            let size = bit_len(magnitude);
            self.symbol((run << 4) | size);
            self.value(v);
            run = 0;
        }
        if run > 0 {
            self.eobrun += 1;
        }
    }

    fn ac_refine(&mut self, block: &[i32; 64], ss: usize, se: usize, al: u32) {
        let magnitude = |k: usize| block[k].unsigned_abs() >> al;
        let last_new = (ss..=se).rev().find(|&k| magnitude(k) == 1);

        let mut run = 0u8;
        let mut corrections = Vec::new();
        for k in ss..=se {
            let m = magnitude(k);
            if m == 0 {
                run += 1;
                continue;
            }
            while run > 15 && last_new.is_some_and(|e| k <= e) {
                self.flush_eobrun();
                self.symbol(0xF0);
                run -= 16;
                for bit in corrections.drain(..) {
                    self.bits.write(bit as u32, 1);
                }
            }
            if m > 1 {
                corrections.push((m & 1) as u8);
                continue;
            }
            self.flush_eobrun();
            self.symbol((run << 4) | 1);
            self.bits.write(u32::from(block[k] >= 0), 1);
            for bit in corrections.drain(..) {
                self.bits.write(bit as u32, 1);
            }
            run = 0;
        }
        if run > 0 || !corrections.is_empty() {
            self.eobrun += 1;
            self.pending.extend(corrections);
        }
    }
}

fn segment(out: &mut Vec<u8>, code: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, code]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

