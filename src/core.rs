pub(crate) mod error;
pub(crate) mod source;
pub(crate) mod table;

use crate::bit_reader::BitReader;
use crate::core::error::{ErrorBuilder, ErrorContext, Res, ResultBuilder, WithContext};
use crate::core::source::ByteSource;
use crate::core::table::{Symbol, Table};
use crate::header::{Profile, MAX_K};
use std::io::Write;

/// Saved continuation: once the reference being expanded is done, carry on
/// with `size` more bytes from bit `off`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub off: usize,
    pub size: usize,
}

/// The decode loop.
///
/// State is a bit cursor, the number of bytes the current frame still owes
/// and at most one pending frame. References only ever point forward, so the
/// cursor advances between any two emitted bytes and the whole decode runs in
/// constant memory.
///
/// The first error ends the decode: the cursor may be left partway through a
/// code, so every later call fails instead of resuming from it.
pub(crate) struct Core<S> {
    pub source: S,
    pub table: Table,
    pub k: u8,
    pub offset_width: u32,
    pub bits: BitReader,
    pub size: usize,
    pub pending: Option<Frame>,
    pub failed: bool,
}

impl<S: ByteSource> Core<S> {
    pub fn new(source: S, profile: &Profile, k: u8, off: usize, size: usize) -> Res<Self> {
        profile.validate()?;
        profile.assert_le(k, MAX_K)?;
        log::debug!(
            "decoding {} bytes from bit {} with k={} and {:?}",
            size,
            off,
            k,
            profile
        );
        Ok(Core {
            source,
            table: Table::new(profile),
            k,
            offset_width: profile.offset_width,
            bits: BitReader::at(off),
            size,
            pending: None,
            failed: false,
        })
    }

    /// Bytes left to produce, including the pending frame.
    pub fn remaining(&self) -> usize {
        self.size + self.pending.map_or(0, |f| f.size)
    }

    /// Runs the loop until it produces one byte. `None` once every frame is
    /// exhausted; with nothing left to produce no bit is read at all.
    pub fn next_byte(&mut self) -> Res<Option<u8>> {
        self.assert(!self.failed, "decode already failed")?;
        let r = self.step();
        self.failed = r.is_err();
        r
    }

    fn step(&mut self) -> Res<Option<u8>> {
        loop {
            if self.size == 0 {
                match self.pending.take() {
                    Some(frame) => {
                        log::trace!("resuming {} bytes at bit {}", frame.size, frame.off);
                        self.bits.pos = frame.off;
                        self.size = frame.size;
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let index = self
                .bits
                .read_rice(&mut self.source, self.k, self.table.entries)
                .at(self)?;
            match self.table.lookup(&mut self.source, index).at(self)? {
                Symbol::Literal(b) => {
                    self.size -= 1;
                    return Ok(Some(b));
                }
                Symbol::Reference { len } => {
                    let noff = self
                        .bits
                        .read_offset(&mut self.source, self.offset_width)
                        .at(self)?;
                    let target = self
                        .bits
                        .pos
                        .checked_add(noff)
                        .message(|_| format!("reference {} past bit {}", noff, self.bits.pos))?;
                    self.jump(len, target)?;
                }
            }
        }
    }

    fn jump(&mut self, len: usize, target: usize) -> Res<()> {
        if len >= self.size {
            // the reference covers everything that is left, no need to come back
            log::trace!("tail jump to bit {} for {} bytes", target, self.size);
        } else {
            self.assert(
                self.pending.is_none(),
                "reference nested inside another reference",
            )?;
            let frame = Frame {
                off: self.bits.pos,
                size: self.size - len,
            };
            log::trace!("expanding {} bytes at bit {}, saved {:?}", len, target, frame);
            self.pending = Some(frame);
            self.size = len;
        }
        self.bits.pos = target;
        Ok(())
    }

    /// Drives the loop to the end, handing bytes to `output` in small batches.
    pub fn run<W: Write + ?Sized>(&mut self, output: &mut W) -> Res<()> {
        let mut buf = [0u8; 64];
        let mut n = 0;
        while let Some(b) = self.next_byte()? {
            buf[n] = b;
            n += 1;
            if n == buf.len() {
                self.emit(output, &buf)?;
                n = 0;
            }
        }
        self.emit(output, &buf[..n])
    }

    fn emit<W: Write + ?Sized>(&mut self, output: &mut W, bytes: &[u8]) -> Res<()> {
        output.write_all(bytes).map_err(|e| {
            self.failed = true;
            ErrorBuilder {
                context: self.describe(),
                ..ErrorBuilder::write(e)
            }
        })?;
        Ok(())
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S> ErrorContext for Core<S> {
    fn describe(&self) -> Option<String> {
        Some(format!(
            "bit: {}, owed: {}, pending: {:?}, failed: {}",
            self.bits.pos, self.size, self.pending, self.failed
        ))
    }
}

/// Decodes `size` bytes starting at bit `off` of `source` into `output`.
///
/// `k` is the Rice parameter from the blob's header and `source` addresses
/// everything after the header. This is the engine behind
/// [`decode_all`](crate::decode_all) and [`decode_slice`](crate::decode_slice)
/// and works the same over memory, files or raw flash.
pub fn decode<S: ByteSource, W: Write + ?Sized>(
    k: u8,
    off: usize,
    size: usize,
    source: S,
    output: &mut W,
) -> Res<()> {
    decode_with(&Profile::DEFAULT, k, off, size, source, output)
}

pub fn decode_with<S: ByteSource, W: Write + ?Sized>(
    profile: &Profile,
    k: u8,
    off: usize,
    size: usize,
    source: S,
    output: &mut W,
) -> Res<()> {
    Core::new(source, profile, k, off, size)?.run(output)
}
