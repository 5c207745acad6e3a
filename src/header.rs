use crate::core::error::{ErrorContext, Res, ResultBuilder, WithContext};
use std::io::{Read, Seek, SeekFrom};

/// Size of the fixed header in front of every blob.
pub const HEADER_SIZE: usize = 8;

/// Largest Rice remainder width the format allows.
pub const MAX_K: u8 = 15;

/// Width in bits of one table entry.
pub const ENTRY_BITS: usize = 9;

/// Metadata in front of each blob.
///
/// ```text
/// [--  32  --|-  24  -|8][ table ][ coded stream ]
///       ^         ^    ^
///       |         |    '- k, width of the Rice remainder
///       |         '------ bit position where decoding starts
///       '---------------- decompressed size in bytes
/// ```
///
/// Both multi-byte fields are little-endian. Bit positions count from the
/// first bit after the header, so the table starts at position 0 and
/// `start_off` is normally past the end of the table.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    /// Decompressed length
    pub size: u32,
    /// Initial bit offset
    pub start_off: u32,
    /// Rice parameter
    pub k: u8,
}

impl ErrorContext for Header {
    fn describe(&self) -> Option<String> {
        Some(format!("{:?}", self))
    }
}

impl Header {
    pub fn parse(blob: &[u8]) -> Res<Self> {
        let p: [u8; HEADER_SIZE] = blob
            .get(..HEADER_SIZE)
            .and_then(|p| p.try_into().ok())
            .message(|_| format!("header needs {} bytes, got {}", HEADER_SIZE, blob.len()))?;
        Self::from_bytes(p)
    }

    /// Reads the header from the start of a seekable stream. Running out of
    /// input is `Invalid`, any other failure is passed through as `Io`.
    pub fn read<R: Read + Seek>(input: &mut R) -> Res<Self> {
        let mut p = [0u8; HEADER_SIZE];
        input
            .seek(SeekFrom::Start(0))
            .and_then(|_| input.read_exact(&mut p))
            .at(&Header::default())
            .message(|_| "reading header".into())?;
        Self::from_bytes(p)
    }

    /// Only `k` is needed to decode a slice; the other fields are not
    /// interpreted.
    pub fn parse_k(blob: &[u8]) -> Res<u8> {
        Ok(Self::parse(blob)?.k)
    }

    pub fn from_bytes(p: [u8; HEADER_SIZE]) -> Res<Self> {
        let header = Header {
            size: u32::from_le_bytes([p[0], p[1], p[2], p[3]]),
            start_off: u32::from_le_bytes([p[4], p[5], p[6], 0]),
            k: p[7],
        };
        header.assert_le(header.k, MAX_K)?;
        log::debug!("Parsed header {:?}", header);
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let size = self.size.to_le_bytes();
        let off = self.start_off.to_le_bytes();
        debug_assert_eq!(off[3], 0, "start_off is 24 bits");
        [size[0], size[1], size[2], size[3], off[0], off[1], off[2], self.k]
    }
}

/// Format constants that are fixed per deployment rather than stored in each
/// blob.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Number of 9-bit entries in the table region.
    pub table_entries: usize,
    /// Width `M` of the nibbles that make up a back-reference offset.
    pub offset_width: u32,
}

impl Default for Profile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ErrorContext for Profile {
    fn describe(&self) -> Option<String> {
        Some(format!("{:?}", self))
    }
}

impl Profile {
    /// The whole 9-bit symbol space: every literal and every length 2..=257.
    pub const DEFAULT: Profile = Profile {
        table_entries: 512,
        offset_width: 4,
    };

    /// 256 literals and 32 lengths (2..=33), the table emitted by encoders
    /// that cap reference lengths at 5 bits.
    pub const COMPACT: Profile = Profile {
        table_entries: 256 + 32,
        offset_width: 4,
    };

    pub(crate) fn validate(&self) -> Res<()> {
        self.assert_le(1, self.table_entries)?;
        self.assert_le(self.table_entries, 1 << ENTRY_BITS)?;
        self.assert_le(1, self.offset_width)?;
        self.assert_le(self.offset_width, 15)?;
        Ok(())
    }

    /// Bytes taken by the table region.
    pub fn table_bytes(&self) -> usize {
        (ENTRY_BITS * self.table_entries).div_ceil(8)
    }

    /// First bit position after the table, where the coded stream starts.
    pub fn stream_start(&self) -> usize {
        ENTRY_BITS * self.table_entries
    }
}
