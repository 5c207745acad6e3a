use crate::core::error::{ErrorContext, Res, ResultBuilder, WithContext};
use std::fmt::{Debug, Formatter};
use std::io::{Read, Seek, SeekFrom};

/// Byte-addressed view of everything that follows the 8-byte header: the
/// table region and then the coded stream.
///
/// Index 0 is the first byte after the header. The engine never buffers more
/// than the byte it is currently looking at, so a source only has to answer
/// single-byte reads at arbitrary positions.
pub trait ByteSource {
    /// Returns the byte at `index`.
    ///
    /// Reading past the end is an `Invalid` error, a failing device is an
    /// `Io` error carrying the device's own `io::Error`.
    fn byte(&mut self, index: usize) -> Res<u8>;

    /// Whether reads and table indices are validated. Only the unchecked
    /// slice source answers `false`.
    fn is_checked(&self) -> bool {
        true
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn byte(&mut self, index: usize) -> Res<u8> {
        (**self).byte(index)
    }

    fn is_checked(&self) -> bool {
        (**self).is_checked()
    }
}

/// Memory-resident blob, indexed directly.
#[derive(Copy, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    checked: bool,
}

impl Debug for SliceSource<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceSource")
            .field("len", &self.data.len())
            .field("checked", &self.checked)
            .finish()
    }
}

impl ErrorContext for SliceSource<'_> {}

impl<'a> SliceSource<'a> {
    /// `data` starts right after the header.
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource {
            data,
            checked: true,
        }
    }

    /// Same as [`SliceSource::new`] without any bounds checks, for targets
    /// where code size matters more than validation.
    ///
    /// # Safety
    ///
    /// The blob must be trusted: every byte and table entry the coded stream
    /// touches has to lie inside `data`. A corrupt or hostile blob makes the
    /// decoder read out of bounds.
    pub unsafe fn unchecked(data: &'a [u8]) -> Self {
        SliceSource {
            data,
            checked: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for SliceSource<'_> {
    #[inline]
    fn byte(&mut self, index: usize) -> Res<u8> {
        if self.checked {
            Ok(self
                .data
                .get(index)
                .copied()
                .message(|_| format!("oob {} in blob of {} bytes", index, self.data.len()))?)
        } else {
            debug_assert!(index < self.data.len(), "{} >= {}", index, self.data.len());
            // SAFETY: upheld by the caller of `SliceSource::unchecked`.
            Ok(unsafe { *self.data.get_unchecked(index) })
        }
    }

    fn is_checked(&self) -> bool {
        self.checked
    }
}

/// Blob behind a seekable reader: a file, a block device, raw flash.
///
/// Every byte access seeks to `base + index` and reads a single byte, so
/// nothing beyond that byte is ever held in memory.
#[derive(Debug)]
pub struct SeekSource<R> {
    input: R,
    base: u64,
    buf: [u8; 1],
}

impl<R> ErrorContext for SeekSource<R> {}

impl<R: Read + Seek> SeekSource<R> {
    /// `base` is the stream position of the first byte after the header.
    pub fn new(input: R, base: u64) -> Self {
        SeekSource {
            input,
            base,
            buf: [0],
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.input
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read + Seek> ByteSource for SeekSource<R> {
    fn byte(&mut self, index: usize) -> Res<u8> {
        let pos = u64::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(self.base))
            .msg_of(&(self.base, index))?;
        self.input
            .seek(SeekFrom::Start(pos))
            .and_then(|_| self.input.read_exact(&mut self.buf))
            .at(self)
            .message(|_| format!("reading byte {}", pos))?;
        Ok(self.buf[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use std::io::{self, Cursor};

    #[test_log::test]
    fn slice_reads_and_rejects_oob() {
        let mut source = SliceSource::new(&[0xA5, 0x3C]);
        assert_eq!(source.byte(0).unwrap(), 0xA5);
        assert_eq!(source.byte(1).unwrap(), 0x3C);
        let err = source.byte(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test_log::test]
    fn unchecked_reads_in_bounds() {
        let data = [1u8, 2, 3];
        let mut source = unsafe { SliceSource::unchecked(&data) };
        assert!(!source.is_checked());
        assert_eq!(source.byte(2).unwrap(), 3);
    }

    #[test_log::test]
    fn seek_source_honours_base() {
        let mut source = SeekSource::new(Cursor::new(vec![9u8, 9, 7, 6]), 2);
        assert_eq!(source.byte(1).unwrap(), 6);
        assert_eq!(source.byte(0).unwrap(), 7);
        let err = source.byte(2).unwrap_err();
        assert!(err.is_invalid());
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }
    }

    impl Seek for Broken {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::Start(p) => Ok(p),
                _ => Err(io::ErrorKind::Unsupported.into()),
            }
        }
    }

    #[test_log::test]
    fn seek_source_passes_device_errors_through() {
        let mut source = SeekSource::new(Broken, 0);
        let err = source.byte(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.into_io().kind(), io::ErrorKind::PermissionDenied);
    }
}
