//! Clip extraction from `.bin` motion archives.
//!
//! An archive starts with a small header whose word at offset 12 points at
//! a table of 20-byte rows, five slot pointers each. Each slot addresses one
//! section of a clip somewhere after the table. The table has no stored
//! length: it ends where the lowest pointer any row holds begins, because
//! rows never overlap the data they point into.

use log::{debug, info, trace};
use nom::multi::count;
use nom::number::complete::le_u32;

use crate::read::utilities::{read_at, usize_at};
use crate::{Error, Result};

pub const TABLE_POINTER_OFFSET: usize = 12;
pub const RECORD_SLOTS: usize = 5;
pub const RECORD_LEN: usize = RECORD_SLOTS * 4;

/// Bytes every section starts with (low half of the section type word).
pub const SECTION_MAGIC: [u8; 2] = [0x02, 0x00];

const SIZE_FIELD_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub offset: usize,
    pub slots: [u32; RECORD_SLOTS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTable {
    pub start: usize,
    /// First byte past the last row kept.
    pub end: usize,
    /// Lowest slot pointer seen; the table never reaches past it.
    pub data_start: usize,
    pub records: Vec<Record>,
}

/// One clip's sections, copied out of the archive in slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipBytes {
    /// Row of the table the clip came from.
    pub row: usize,
    pub sections: usize,
    pub bytes: Vec<u8>,
}

impl ClipBytes {
    /// Name used when writing clips out, numbered from 1.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}_{:03}.mot", stem, self.row + 1)
    }
}

fn is_sentinel(slot: u32) -> bool {
    slot == 0 || slot == u32::MAX
}

impl Record {
    pub fn pointers(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .filter(|&&s| !is_sentinel(s))
            .map(|&s| s as usize)
    }
}

/// Reads table rows until the next one would run into the lowest pointer
/// seen so far. A row whose own pointers land inside it ends the table too.
pub fn scan_table(buf: &[u8]) -> Result<ArchiveTable> {
    let start = usize_at(buf, TABLE_POINTER_OFFSET)?;
    let mut data_start = buf.len();
    let mut pos = start;
    let mut records = vec![];

    while pos.saturating_add(RECORD_LEN) <= data_start.min(buf.len()) {
        let slots = read_at(buf, pos, buf.len(), RECORD_LEN, count(le_u32, RECORD_SLOTS))?;
        let record = Record {
            offset: pos,
            slots: [slots[0], slots[1], slots[2], slots[3], slots[4]],
        };
        let lowest = record.pointers().min().unwrap_or(data_start);
        data_start = data_start.min(lowest);
        if pos + RECORD_LEN > data_start {
            break;
        }
        records.push(record);
        pos += RECORD_LEN;
    }

    debug!(
        "table {:#x}..{:#x}, data from {:#x}, {} rows",
        start,
        pos,
        data_start,
        records.len()
    );
    Ok(ArchiveTable {
        start,
        end: pos,
        data_start,
        records,
    })
}

/// The section a slot points at, if it looks like one and fits.
fn section_at(buf: &[u8], slot: usize) -> Option<&[u8]> {
    if buf.get(slot..slot.checked_add(2)?)? != SECTION_MAGIC {
        return None;
    }
    let size = usize_at(buf, slot + SIZE_FIELD_OFFSET).ok()?;
    if size == 0 {
        return None;
    }
    buf.get(slot..slot.checked_add(size)?)
}

pub fn extract(buf: &[u8], table: &ArchiveTable) -> Vec<ClipBytes> {
    table
        .records
        .iter()
        .enumerate()
        .filter_map(|(row, record)| {
            let mut bytes = vec![];
            let mut sections = 0;
            for slot in record.pointers().filter(|&s| s < buf.len()) {
                match section_at(buf, slot) {
                    Some(section) => {
                        bytes.extend_from_slice(section);
                        sections += 1;
                    }
                    None => trace!("row {}: slot {:#x} is not a section", row, slot),
                }
            }
            if sections == 0 {
                return None;
            }
            Some(ClipBytes {
                row,
                sections,
                bytes,
            })
        })
        .collect()
}

/// Splits an archive into clip byte streams, one per table row that holds
/// at least one valid section.
pub fn depack(buf: &[u8]) -> Result<Vec<ClipBytes>> {
    if buf.len() < TABLE_POINTER_OFFSET + 4 {
        return Err(Error::truncated(0, TABLE_POINTER_OFFSET + 4, buf.len()));
    }
    let table = scan_table(buf)?;
    let clips = extract(buf, &table);
    info!(
        "{} of {} table rows hold clips",
        clips.len(),
        table.records.len()
    );
    Ok(clips)
}
