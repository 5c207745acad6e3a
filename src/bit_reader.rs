use crate::core::error::{ErrorContext, Res, ResultBuilder};
use crate::core::source::ByteSource;

/// Cursor into a [`ByteSource`] at bit granularity.
///
/// Bits are numbered MSB-first: bit `pos` is bit `7 - pos % 8` of byte
/// `pos / 8`. Nothing is cached between reads, each bit goes back to the
/// source, which keeps seek-based sources honest about what they touch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BitReader {
    /// Position of the next bit to read.
    pub pos: usize,
}

impl ErrorContext for BitReader {
    fn describe(&self) -> Option<String> {
        Some(format!("bit {}", self.pos))
    }
}

impl BitReader {
    pub fn at(pos: usize) -> Self {
        BitReader { pos }
    }

    pub fn read_bit<S: ByteSource>(&mut self, source: &mut S) -> Res<u32> {
        let b = source.byte(self.pos / 8)?;
        let r = (b >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(r.into())
    }

    /// Reads `n` bits, first bit read ends up most significant.
    pub fn read_bits<S: ByteSource>(&mut self, source: &mut S, n: u32) -> Res<u32> {
        debug_assert!(n <= 16);
        let mut r = 0;
        for _ in 0..n {
            r = (r << 1) | self.read_bit(source)?;
        }
        Ok(r)
    }

    /// Reads a Golomb-Rice code with a `k`-bit remainder: a run of `1` bits
    /// closed by a `0`, then `k` literal bits.
    ///
    /// `bound` is the number of table entries. A prefix that can only lead to
    /// an index at or beyond it is rejected as soon as it is seen, so a run of
    /// ones never loops for longer than the table is wide.
    pub fn read_rice<S: ByteSource>(&mut self, source: &mut S, k: u8, bound: usize) -> Res<usize> {
        let mut q = 0usize;
        while self.read_bit(source)? == 1 {
            q += 1;
            self.assert_lt(q << k, bound)?;
        }
        let r = self.read_bits(source, k.into())? as usize;
        Ok(q << k | r)
    }

    /// Reads a back-reference offset made of `m + 1` bit groups. The top bit
    /// of each group says whether another group follows, the low `m` bits are
    /// folded in as `noff = (noff << m) + 1 + nibble`. The stored value is
    /// `noff - 1`, so every offset has exactly one encoding.
    pub fn read_offset<S: ByteSource>(&mut self, source: &mut S, m: u32) -> Res<usize> {
        let mut noff = 0usize;
        loop {
            let n = self.read_bits(source, m + 1)? as usize;
            noff = noff
                .checked_shl(m)
                .filter(|v| v >> m == noff)
                .and_then(|v| v.checked_add(1 + (n & ((1 << m) - 1))))
                .message(|_| format!("offset overflow at bit {}", self.pos))?;
            if n < (1 << m) {
                break;
            }
        }
        Ok(noff - 1)
    }
}
