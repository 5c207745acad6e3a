//! GLZ decompression in constant RAM and linear time.
//!
//! A GLZ blob is an 8-byte [`Header`], a table of 9-bit symbols and a stream
//! of Golomb-Rice coded table indices. Every index resolves to either a
//! literal byte or a reference that re-enters the stream further ahead. The
//! decoder keeps a bit cursor and a single saved continuation, nothing else,
//! so it can run straight out of flash or over a seekable device.
//!
//! ```no_run
//! # fn main() -> Result<(), glzextract::GlzError> {
//! let blob = std::fs::read("data.glz").unwrap();
//! let data = glzextract::decode_all(&blob, None)?;
//! let middle = glzextract::decode_slice(&blob, 4608 + 900, 64)?;
//! # Ok(())
//! # }
//! ```
mod bit_reader;
mod core;
mod header;
#[cfg(test)]
mod testing;

use std::io::{Read, Seek, Write};

use crate::core::Core;
pub use crate::core::error::{ErrorKind, GlzError, Res};
pub use crate::core::source::{ByteSource, SeekSource, SliceSource};
pub use crate::core::table::{Symbol, Table};
pub use crate::core::{decode, decode_with};
pub use bit_reader::BitReader;
pub use header::{Header, Profile, ENTRY_BITS, HEADER_SIZE, MAX_K};

/// Largest output buffer reserved up front; the size in a header is not
/// trusted with an allocation.
const MAX_RESERVE: usize = 1 << 20;

/// Decodes a whole blob. `limit` caps the output below the size recorded in
/// the header.
pub fn decode_all(blob: &[u8], limit: Option<usize>) -> Res<Vec<u8>> {
    Profile::DEFAULT.decode_all(blob, limit)
}

/// Decodes `size` bytes starting at bit `off`, without touching the rest of
/// the blob. Only `k` is taken from the header.
pub fn decode_slice(blob: &[u8], off: usize, size: usize) -> Res<Vec<u8>> {
    Profile::DEFAULT.decode_slice(blob, off, size)
}

/// Streaming form of [`decode_all`].
pub fn decode_into<W: Write + ?Sized>(blob: &[u8], output: &mut W, limit: Option<usize>) -> Res<()> {
    Profile::DEFAULT.decode_into(blob, output, limit)
}

impl Profile {
    pub fn decode<S: ByteSource, W: Write + ?Sized>(
        &self,
        k: u8,
        off: usize,
        size: usize,
        source: S,
        output: &mut W,
    ) -> Res<()> {
        decode_with(self, k, off, size, source, output)
    }

    pub fn decode_all(&self, blob: &[u8], limit: Option<usize>) -> Res<Vec<u8>> {
        let header = Header::parse(blob)?;
        let size = clamp(&header, limit);
        let mut output = Vec::with_capacity(size.min(MAX_RESERVE));
        self.decode(
            header.k,
            header.start_off as usize,
            size,
            SliceSource::new(&blob[HEADER_SIZE..]),
            &mut output,
        )?;
        Ok(output)
    }

    pub fn decode_into<W: Write + ?Sized>(
        &self,
        blob: &[u8],
        output: &mut W,
        limit: Option<usize>,
    ) -> Res<()> {
        let header = Header::parse(blob)?;
        self.decode(
            header.k,
            header.start_off as usize,
            clamp(&header, limit),
            SliceSource::new(&blob[HEADER_SIZE..]),
            output,
        )
    }

    pub fn decode_slice(&self, blob: &[u8], off: usize, size: usize) -> Res<Vec<u8>> {
        let k = Header::parse_k(blob)?;
        let mut output = Vec::with_capacity(size.min(MAX_RESERVE));
        self.decode(k, off, size, SliceSource::new(&blob[HEADER_SIZE..]), &mut output)?;
        Ok(output)
    }

    /// Like [`Profile::decode_all`] but trusts the blob completely.
    ///
    /// # Safety
    ///
    /// See [`SliceSource::unchecked`]: a blob that is corrupt or was not
    /// produced for this profile makes the decoder read out of bounds.
    pub unsafe fn decode_all_unchecked(&self, blob: &[u8], limit: Option<usize>) -> Res<Vec<u8>> {
        let header = Header::parse(blob)?;
        let size = clamp(&header, limit);
        let mut output = Vec::with_capacity(size.min(MAX_RESERVE));
        self.decode(
            header.k,
            header.start_off as usize,
            size,
            SliceSource::unchecked(&blob[HEADER_SIZE..]),
            &mut output,
        )?;
        Ok(output)
    }
}

fn clamp(header: &Header, limit: Option<usize>) -> usize {
    let size = header.size as usize;
    match limit {
        Some(limit) => size.min(limit),
        None => size,
    }
}

/// Decoder over a seekable stream, itself readable.
///
/// Bytes come out through [`Read`] as they are decoded; the input is accessed
/// one byte at a time with a seek before each read, so only the decoder state
/// is ever held in memory.
///
/// A failure ends the decode. If some bytes were already produced by the
/// call that hit it, they are returned first and the error comes out of the
/// next call; every call after that fails as well.
pub struct Extractor<In: Read + Seek> {
    header: Header,
    core: Core<SeekSource<In>>,
    deferred: Option<GlzError>,
}

impl<In: Read + Seek> Extractor<In> {
    /// Decodes everything the header describes.
    pub fn new(input: In) -> Res<Extractor<In>> {
        Self::with_profile(input, &Profile::DEFAULT, None)
    }

    pub fn with_profile(mut input: In, profile: &Profile, limit: Option<usize>) -> Res<Extractor<In>> {
        let header = Header::read(&mut input)?;
        let size = clamp(&header, limit);
        let core = Core::new(
            SeekSource::new(input, HEADER_SIZE as u64),
            profile,
            header.k,
            header.start_off as usize,
            size,
        )?;
        Ok(Extractor {
            header,
            core,
            deferred: None,
        })
    }

    /// Decodes `size` bytes from bit `off` only.
    pub fn slice(mut input: In, profile: &Profile, off: usize, size: usize) -> Res<Extractor<In>> {
        let header = Header::read(&mut input)?;
        let core = Core::new(
            SeekSource::new(input, HEADER_SIZE as u64),
            profile,
            header.k,
            off,
            size,
        )?;
        Ok(Extractor {
            header,
            core,
            deferred: None,
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Bytes still to come out of [`Read::read`].
    pub fn remaining(&self) -> usize {
        self.core.remaining()
    }

    /// Decodes the rest into `output`.
    pub fn decode_to<W: Write + ?Sized>(&mut self, output: &mut W) -> Res<()> {
        match self.deferred.take() {
            Some(e) => Err(e),
            None => self.core.run(output),
        }
    }

    pub fn into_inner(self) -> In {
        self.core.into_source().into_inner()
    }
}

impl<In: Read + Seek> Read for Extractor<In> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        log::debug!("reading to buf with size {}", buf.len());
        if let Some(e) = self.deferred.take() {
            return Err(e.into());
        }
        let mut bytes_written = 0;
        for slot in buf.iter_mut() {
            match self.core.next_byte() {
                Ok(Some(b)) => *slot = b,
                Ok(None) => break,
                Err(e) if bytes_written == 0 => return Err(e.into()),
                Err(e) => {
                    self.deferred = Some(e);
                    break;
                }
            }
            bytes_written += 1;
        }
        log::debug!("Wrote {} bytes, {} remaining", bytes_written, self.remaining());
        Ok(bytes_written)
    }
}
