//! Blob construction for tests. There is no encoder in this crate; this is
//! the smallest thing that produces valid input: a bit writer, a literal-only
//! encoder and a builder for hand-placed references.

use crate::core::table::Symbol;
use crate::header::{Header, Profile, HEADER_SIZE};

/// MSB-first bit writer, the mirror of [`BitReader`](crate::bit_reader::BitReader).
#[derive(Debug, Default, Clone)]
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

impl BitWriter {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push_bit(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Low `n` bits of `value`, most significant first.
    pub fn push(&mut self, value: u32, n: u32) {
        for i in (0..n).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    pub fn push_rice(&mut self, index: usize, k: u8) {
        for _ in 0..index >> k {
            self.push_bit(true);
        }
        self.push_bit(false);
        self.push((index & ((1 << k) - 1)) as u32, k.into());
    }

    pub fn push_offset(&mut self, off: usize, m: u32) {
        let mut groups = Vec::new();
        let mut noff = off + 1;
        while noff != 0 {
            noff -= 1;
            groups.push(noff & ((1 << m) - 1));
            noff >>= m;
        }
        for (i, &g) in groups.iter().rev().enumerate() {
            let more = usize::from(i != groups.len() - 1);
            self.push((g | more << m) as u32, m + 1);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Table plus coded stream, laid out the way the decoder expects.
#[derive(Debug, Clone)]
pub(crate) struct BlobBuilder {
    pub profile: Profile,
    pub k: u8,
    pub table: Vec<u16>,
    pub stream: BitWriter,
}

impl BlobBuilder {
    /// Entry `i` is symbol `i`: literals first, then lengths 2, 3, ...
    pub fn identity(k: u8) -> Self {
        Self::identity_with(Profile::DEFAULT, k)
    }

    pub fn identity_with(profile: Profile, k: u8) -> Self {
        BlobBuilder {
            profile,
            k,
            table: (0..profile.table_entries as u16).collect(),
            stream: BitWriter::default(),
        }
    }

    /// Bit position of the next code, as the decoder counts it.
    pub fn pos(&self) -> usize {
        self.profile.stream_start() + self.stream.len()
    }

    pub fn index(&mut self, index: usize) {
        self.stream.push_rice(index, self.k);
    }

    pub fn symbol(&mut self, symbol: Symbol) {
        let raw = symbol.to_raw();
        let index = self
            .table
            .iter()
            .position(|&v| v == raw)
            .unwrap_or_else(|| panic!("{:?} not in table", symbol));
        self.index(index);
    }

    pub fn literals(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.symbol(Symbol::Literal(b));
        }
    }

    /// A reference of `len` bytes whose target lies `off` bits past the end of
    /// the reference's own code.
    pub fn reference(&mut self, len: usize, off: usize) {
        self.symbol(Symbol::Reference { len });
        self.stream.push_offset(off, self.profile.offset_width);
    }

    /// Everything after the header.
    pub fn region(&self) -> Vec<u8> {
        let mut table = BitWriter::default();
        for &v in &self.table {
            table.push(v.into(), 9);
        }
        let mut region = table.into_bytes();
        assert_eq!(region.len(), self.profile.table_bytes());
        // the stream continues mid-byte when the table does not end on a byte
        let start = self.profile.stream_start();
        region.resize(start.div_ceil(8) + self.stream.len().div_ceil(8) + 1, 0);
        let stream = self.stream.clone().into_bytes();
        for i in 0..self.stream.len() {
            if stream[i / 8] & (0x80 >> (i % 8)) != 0 {
                let j = start + i;
                region[j / 8] |= 0x80 >> (j % 8);
            }
        }
        region.truncate((start + self.stream.len()).div_ceil(8));
        region
    }

    pub fn blob(&self, size: usize, start_off: usize) -> Vec<u8> {
        let header = Header {
            size: size as u32,
            start_off: start_off as u32,
            k: self.k,
        };
        let mut blob = Vec::with_capacity(HEADER_SIZE + self.profile.table_bytes());
        blob.extend_from_slice(&header.to_bytes());
        blob.extend(self.region());
        blob
    }
}

/// Reference encoder for the literal-only subset: identity table, one Rice
/// code per input byte.
pub(crate) fn encode(data: &[u8], profile: Profile, k: u8) -> Vec<u8> {
    let mut b = BlobBuilder::identity_with(profile, k);
    let start = b.pos();
    b.literals(data);
    b.blob(data.len(), start)
}

/// A deterministic, mildly compressible test payload.
pub(crate) fn sample(len: usize) -> Vec<u8> {
    let mut x = 0x2545F491u32;
    (0..len)
        .map(|i| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            if i % 3 == 0 {
                b"glz "[i % 4]
            } else {
                x as u8
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn writer_is_msb_first() {
        let mut w = BitWriter::default();
        w.push(0b101, 3);
        w.push(0x1F, 6);
        assert_eq!(w.len(), 9);
        assert_eq!(w.into_bytes(), [0b1010_1111, 0b1000_0000]);
    }

    #[test_log::test]
    fn region_places_stream_after_table() {
        let mut b = BlobBuilder::identity_with(Profile::COMPACT, 8);
        b.literals(&[0xFF]);
        let region = b.region();
        // 288 * 9 bits is 324 bytes exactly, the stream starts on a byte
        assert_eq!(region.len(), 324 + 2);
        assert_eq!(region[324..], [0x7F, 0x80]);
    }
}
