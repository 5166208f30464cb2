use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Fixed header positions shared by `.index` and `.index2` files.
pub const ENTRY_COUNT_AT: u64 = 1036; // u32 LE, number of entry records
pub const SHARD_COUNT_AT: u64 = 1104; // u16 LE on read, single byte on write
pub const TABLE_START: u64 = 2048;

/// Which half of an index pair a file is. The record layouts differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Primary,
    Secondary,
}

impl IndexKind {
    pub const BOTH: [IndexKind; 2] = [IndexKind::Primary, IndexKind::Secondary];

    /// Record stride in the entry table.
    pub fn record_size(self) -> usize {
        match self {
            IndexKind::Primary => 16,  // hash(12) + packed(4)
            IndexKind::Secondary => 8, // hash(4) + packed(4)
        }
    }

    /// Position of the packed offset inside one record.
    pub fn packed_at(self) -> usize {
        match self {
            IndexKind::Primary => 12,
            IndexKind::Secondary => 4,
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            IndexKind::Primary => "win32.index",
            IndexKind::Secondary => "win32.index2",
        }
    }
}

/// Raw 32-bit offset field of an entry record. The low nibble selects the
/// shard, the rest locates the asset inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedOffset(pub u32);

impl PackedOffset {
    pub fn shard(self) -> u8 {
        ((self.0 & 0xF) / 2) as u8
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Modlist values are stored eight times larger than the index field.
    /// `None` when the scaled value does not fit the 32-bit field.
    pub fn from_ledger(value: u64) -> Option<Self> {
        u32::try_from(value / 8).ok().map(PackedOffset)
    }
}

impl std::fmt::Display for PackedOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

pub fn read_shard_count<R: Read + Seek>(r: &mut R) -> io::Result<u16> {
    let mut b2 = [0u8; 2];
    r.seek(SeekFrom::Start(SHARD_COUNT_AT))?;
    r.read_exact(&mut b2)?;
    Ok(u16::from_le_bytes(b2))
}

/// Overwrite the shard-count byte. Nothing else in the file is touched.
pub fn write_shard_count<W: Write + Seek>(w: &mut W, value: u8) -> io::Result<()> {
    w.seek(SeekFrom::Start(SHARD_COUNT_AT))?;
    w.write_all(&[value])?;
    w.flush()
}

/// Number of records in the entry table, as stored in the header.
pub fn read_entry_count<R: Read + Seek>(r: &mut R) -> io::Result<u32> {
    let mut b4 = [0u8; 4];
    r.seek(SeekFrom::Start(ENTRY_COUNT_AT))?;
    r.read_exact(&mut b4)?;
    Ok(u32::from_le_bytes(b4))
}

/// Lazily walk the packed offsets of every record. Each call re-reads the
/// header and seeks back to the start of the table.
pub fn entries<R: Read + Seek>(mut r: R, kind: IndexKind) -> io::Result<EntryIter<R>> {
    let remaining = read_entry_count(&mut r)?;
    r.seek(SeekFrom::Start(TABLE_START))?;
    Ok(EntryIter { reader: r, kind, remaining, buf: vec![0u8; kind.record_size()] })
}

pub struct EntryIter<R> {
    reader: R,
    kind: IndexKind,
    remaining: u32,
    buf: Vec<u8>,
}

impl<R> EntryIter<R> {
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl<R: Read> Iterator for EntryIter<R> {
    type Item = io::Result<PackedOffset>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if let Err(e) = self.reader.read_exact(&mut self.buf) {
            // A truncated table ends the walk after reporting once.
            self.remaining = 0;
            return Some(Err(e));
        }
        self.remaining -= 1;
        let at = self.kind.packed_at();
        let mut b4 = [0u8; 4];
        b4.copy_from_slice(&self.buf[at..at + 4]);
        Some(Ok(PackedOffset(u32::from_le_bytes(b4))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

pub fn open_index(path: &Path) -> io::Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Write access without create or truncate, for in-place header patches.
pub fn open_index_for_write(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}
