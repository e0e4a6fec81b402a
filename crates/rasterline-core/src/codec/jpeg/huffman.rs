//! Huffman tables and the bit-level reader/writer for entropy-coded segments.

use crate::error::{CodecError, Result};

use super::tables::HuffmanSpec;

/// Bits resolved by the direct lookup table.
const LOOKUP_BITS: u32 = 8;

/// Canonical Huffman table used while decoding.
///
/// Codes up to 8 bits resolve with one table lookup; longer codes fall back
/// to the `maxcode`/`valptr` walk from ITU T.81 Annex F.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// `(symbol << 8) | length`, 0 when the prefix needs the slow path.
    lookup: [u16; 1 << LOOKUP_BITS],
    /// Largest code of each length, -1 when the length is unused.
    maxcode: [i32; 17],
    /// Index into `symbols` of the first code of each length, minus that code.
    valoff: [i32; 17],
    symbols: Vec<u8>,
}

impl HuffmanTable {
    /// Build a table from DHT counts and symbols.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::CorruptData` if the counts describe more codes than
    /// fit in their lengths or don't match the number of symbols.
    pub fn new(counts: &[u8; 16], symbols: &[u8]) -> Result<Self> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total != symbols.len() || total > 256 {
            return Err(CodecError::corrupt("Huffman table symbol count mismatch"));
        }

        let mut table = HuffmanTable {
            lookup: [0; 1 << LOOKUP_BITS],
            maxcode: [-1; 17],
            valoff: [0; 17],
            symbols: symbols.to_vec(),
        };

        let mut code: u32 = 0;
        let mut k = 0usize;
        for len in 1..=16u32 {
            let count = counts[len as usize - 1] as u32;
            if count > 0 {
                table.valoff[len as usize] = k as i32 - code as i32;
                for _ in 0..count {
                    if code >= 1 << len {
                        return Err(CodecError::corrupt("Huffman table overflows code space"));
                    }
                    if len <= LOOKUP_BITS {
                        let shift = LOOKUP_BITS - len;
                        let entry = ((symbols[k] as u16) << 8) | len as u16;
                        let base = (code << shift) as usize;
                        table.lookup[base..base + (1 << shift)].fill(entry);
                    }
                    code += 1;
                    k += 1;
                }
                table.maxcode[len as usize] = code as i32 - 1;
            }
            code <<= 1;
        }

        Ok(table)
    }

    /// Build one of the standard tables.
    pub fn from_spec(spec: &HuffmanSpec) -> Result<Self> {
        Self::new(&spec.counts, spec.symbols)
    }
}

/// MSB-first bit reader over entropy-coded data.
///
/// Stuffed `FF 00` pairs read as a literal `FF`. On reaching a marker the
/// reader stops consuming input and supplies zero bits, so the decoder can
/// look ahead past the end of a scan safely. Truncation is detected by the
/// marker parser when no marker follows.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    nbits: u32,
    marker: Option<u8>,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            acc: 0,
            nbits: 0,
            marker: None,
        }
    }

    fn fill(&mut self) {
        while self.nbits <= 56 {
            let byte = if self.marker.is_some() || self.pos >= self.data.len() {
                0
            } else {
                let b = self.data[self.pos];
                if b != 0xFF {
                    self.pos += 1;
                    b
                } else {
                    match self.data.get(self.pos + 1) {
                        Some(0x00) => {
                            self.pos += 2;
                            0xFF
                        }
                        // Fill bytes before a marker.
                        Some(0xFF) => {
                            self.pos += 1;
                            continue;
                        }
                        Some(&m) => {
                            self.marker = Some(m);
                            0
                        }
                        None => {
                            self.pos = self.data.len();
                            0
                        }
                    }
                }
            };
            self.acc |= (byte as u64) << (56 - self.nbits);
            self.nbits += 8;
        }
    }

    #[inline]
    fn peek(&mut self, n: u32) -> u32 {
        if self.nbits < n {
            self.fill();
        }
        (self.acc >> (64 - n)) as u32
    }

    #[inline]
    fn consume(&mut self, n: u32) {
        self.acc <<= n;
        self.nbits -= n;
    }

    /// Read `n` (0..=16) raw bits.
    #[inline]
    pub fn bits(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        let v = self.peek(n);
        self.consume(n);
        v
    }

    #[inline]
    pub fn bit(&mut self) -> bool {
        self.bits(1) == 1
    }

    /// Read `n` bits and sign-extend them as a JPEG magnitude category value.
    #[inline]
    pub fn receive_extend(&mut self, n: u32) -> i32 {
        if n == 0 {
            return 0;
        }
        let v = self.bits(n) as i32;
        if v < 1 << (n - 1) {
            v - (1 << n) + 1
        } else {
            v
        }
    }

    /// Decode one Huffman symbol.
    pub fn decode(&mut self, table: &HuffmanTable) -> Result<u8> {
        let peek = self.peek(16);
        let entry = table.lookup[(peek >> (16 - LOOKUP_BITS)) as usize];
        if entry != 0 {
            self.consume((entry & 0xFF) as u32);
            return Ok((entry >> 8) as u8);
        }

        for len in LOOKUP_BITS + 1..=16 {
            let code = (peek >> (16 - len)) as i32;
            if code <= table.maxcode[len as usize] {
                self.consume(len);
                let idx = (table.valoff[len as usize] + code) as usize;
                return table
                    .symbols
                    .get(idx)
                    .copied()
                    .ok_or_else(|| CodecError::corrupt("Huffman symbol out of range"));
            }
        }
        Err(CodecError::corrupt("Invalid Huffman code"))
    }

    /// Drop buffered bits and locate the next marker.
    ///
    /// Returns the marker code and leaves the reader positioned on its `FF`.
    pub fn next_marker(&mut self) -> Option<u8> {
        self.acc = 0;
        self.nbits = 0;
        if let Some(m) = self.marker {
            return Some(m);
        }
        while self.pos + 1 < self.data.len() {
            if self.data[self.pos] == 0xFF && !matches!(self.data[self.pos + 1], 0x00 | 0xFF) {
                self.marker = Some(self.data[self.pos + 1]);
                return self.marker;
            }
            self.pos += 1;
        }
        self.pos = self.data.len();
        None
    }

    /// Step over the current marker so decoding can resume after it.
    pub fn skip_marker(&mut self) {
        if self.marker.take().is_some() {
            self.pos += 2;
        }
    }

    /// Offset of the current position in the underlying data.
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Code words of a standard table, indexed by symbol.
#[derive(Debug, Clone)]
pub struct HuffmanCodes {
    /// `(code, length)`; length 0 for symbols absent from the table.
    codes: [(u16, u8); 256],
}

impl HuffmanCodes {
    pub fn from_spec(spec: &HuffmanSpec) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        let mut code: u16 = 0;
        let mut k = 0usize;
        for len in 1..=16u8 {
            for _ in 0..spec.counts[len as usize - 1] {
                codes[spec.symbols[k] as usize] = (code, len);
                code += 1;
                k += 1;
            }
            code <<= 1;
        }
        Self { codes }
    }

    #[inline]
    pub fn get(&self, symbol: u8) -> (u16, u8) {
        self.codes[symbol as usize]
    }
}

/// MSB-first bit writer with `FF 00` stuffing.
#[derive(Debug, Default)]
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl BitWriter {
    pub fn new(out: Vec<u8>) -> Self {
        Self {
            out,
            acc: 0,
            nbits: 0,
        }
    }

    /// Append the low `len` (<= 16) bits of `value`.
    #[inline]
    pub fn write(&mut self, value: u32, len: u8) {
        if len == 0 {
            return;
        }
        let len = len as u32;
        self.acc = (self.acc << len) | (value & ((1 << len) - 1));
        self.nbits += len;
        while self.nbits >= 8 {
            self.nbits -= 8;
            let byte = (self.acc >> self.nbits) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
        }
        self.acc &= (1 << self.nbits) - 1;
    }

    /// Pad the final partial byte with one bits.
    pub fn flush(&mut self) {
        if self.nbits > 0 {
            let pad = 8 - self.nbits as u8;
            self.write((1 << pad) - 1, pad);
        }
    }

    /// Flush and append a two-byte marker.
    pub fn marker(&mut self, code: u8) {
        self.flush();
        self.out.extend_from_slice(&[0xFF, code]);
    }

    pub fn into_inner(mut self) -> Vec<u8> {
        self.flush();
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::jpeg::tables::{STD_AC_LUMA, STD_DC_CHROMA, STD_DC_LUMA};

    #[test]
    fn test_writer_stuffs_ff() {
        let mut w = BitWriter::new(Vec::new());
        w.write(0xFF, 8);
        w.write(0x1, 1);
        let out = w.into_inner();
        assert_eq!(out, vec![0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn test_writer_pads_with_ones() {
        let mut w = BitWriter::new(Vec::new());
        w.write(0b0, 1);
        assert_eq!(w.into_inner(), vec![0x7F]);
    }

    #[test]
    fn test_reader_unstuffs_and_stops_at_marker() {
        let data = [0xFF, 0x00, 0xA5, 0xFF, 0xD9];
        let mut r = BitReader::new(&data, 0);
        assert_eq!(r.bits(8), 0xFF);
        assert_eq!(r.bits(8), 0xA5);
        // Past the marker only zeros come out.
        assert_eq!(r.bits(16), 0);
        assert_eq!(r.next_marker(), Some(0xD9));
        assert_eq!(r.position(), 3);
    }

    #[test]
    fn test_receive_extend() {
        // Category 3: 000 -> -7, 011 -> -4, 100 -> 4, 111 -> 7
        let data = [0b0000_1110, 0b0111_1111, 0xFF, 0xD9];
        let mut r = BitReader::new(&data, 0);
        assert_eq!(r.receive_extend(3), -7);
        assert_eq!(r.receive_extend(3), -4);
        assert_eq!(r.receive_extend(3), 4);
        assert_eq!(r.receive_extend(3), 7);
    }

    #[test]
    fn test_standard_codes_round_trip() {
        for spec in [STD_DC_LUMA, STD_DC_CHROMA, STD_AC_LUMA] {
            let codes = HuffmanCodes::from_spec(&spec);
            let table = HuffmanTable::from_spec(&spec).unwrap();

            let mut w = BitWriter::new(Vec::new());
            for &sym in spec.symbols {
                let (code, len) = codes.get(sym);
                w.write(code as u32, len);
            }
            let mut data = w.into_inner();
            data.extend_from_slice(&[0xFF, 0xD9]);

            let mut r = BitReader::new(&data, 0);
            for &sym in spec.symbols {
                assert_eq!(r.decode(&table).unwrap(), sym);
            }
        }
    }

    #[test]
    fn test_table_rejects_bad_counts() {
        let mut counts = [0u8; 16];
        counts[0] = 3; // three 1-bit codes cannot exist
        assert!(HuffmanTable::new(&counts, &[0, 1, 2]).is_err());

        counts[0] = 1;
        assert!(HuffmanTable::new(&counts, &[0, 1]).is_err());
    }

    #[test]
    fn test_invalid_code_is_corrupt() {
        let mut counts = [0u8; 16];
        counts[0] = 1; // only code "0"
        let table = HuffmanTable::new(&counts, &[5]).unwrap();
        let data = [0xFF, 0x00, 0xFF, 0xD9];
        let mut r = BitReader::new(&data, 0);
        assert!(matches!(r.decode(&table), Err(CodecError::CorruptData(_))));
    }
}
