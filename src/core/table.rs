use crate::bit_reader::BitReader;
use crate::core::error::{ErrorContext, Res};
use crate::core::source::ByteSource;
use crate::header::{Profile, ENTRY_BITS};

/// What a table entry stands for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Symbol {
    Literal(u8),
    /// Copy of `len` bytes, 2..=257, from a later point in the stream.
    Reference { len: usize },
}

impl From<u16> for Symbol {
    fn from(v: u16) -> Self {
        match u8::try_from(v) {
            Ok(b) => Symbol::Literal(b),
            Err(_) => Symbol::Reference {
                len: usize::from(v & 0xFF) + 2,
            },
        }
    }
}

impl Symbol {
    /// Raw 9-bit table value.
    pub fn to_raw(self) -> u16 {
        match self {
            Symbol::Literal(b) => b.into(),
            Symbol::Reference { len } => {
                debug_assert!((2..=257).contains(&len));
                0x100 | (len - 2) as u16
            }
        }
    }
}

/// The translation layer between Rice indices and symbols. Entry `i` is
/// stored in bits `[9i, 9i + 9)` from the start of the table region.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Table {
    pub entries: usize,
}

impl ErrorContext for Table {
    fn describe(&self) -> Option<String> {
        Some(format!("table of {} entries", self.entries))
    }
}

impl Table {
    pub fn new(profile: &Profile) -> Self {
        Table {
            entries: profile.table_entries,
        }
    }

    pub fn lookup<S: ByteSource>(&self, source: &mut S, index: usize) -> Res<Symbol> {
        if source.is_checked() {
            self.assert_lt(index, self.entries)?;
        }
        let v = BitReader::at(ENTRY_BITS * index).read_bits(source, ENTRY_BITS as u32)?;
        Ok(Symbol::from(v as u16))
    }

    /// Decodes every entry in order.
    pub fn entries<'s, S: ByteSource>(
        &self,
        source: &'s mut S,
    ) -> impl Iterator<Item = Res<Symbol>> + 's {
        let table = *self;
        (0..table.entries).map(move |i| table.lookup(source, i))
    }
}
