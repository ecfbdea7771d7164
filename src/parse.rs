use std::convert::TryFrom;

use anyhow::anyhow;
use anyhow::ensure;
use anyhow::Context;
use anyhow::Error;
use log::trace;

use crate::malformed;
use crate::raw::EaFlags;
use crate::raw::RawEaHeader;
use crate::raw::HEADER_SIZE;

/// One decoded extended attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EaRecord {
    /// As read from the buffer; zero for the last record.
    pub next_entry_offset: u32,
    /// Passed through untouched, including bits `EaFlags` doesn't name.
    pub flags: u8,
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl EaRecord {
    pub fn flags(&self) -> EaFlags {
        EaFlags::from_bits_truncate(self.flags)
    }

    pub fn name_str(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.name).with_context(|| anyhow!("EA name is invalid utf-8"))
    }

    pub fn is_last(&self) -> bool {
        0 == self.next_entry_offset
    }
}

/// Walks a chained EA buffer, one record at a time.
///
/// Every offset and length is checked against the used part of the buffer
/// before it is followed. The first malformed record ends the iteration.
#[derive(Debug)]
pub struct Records<'b> {
    data: &'b [u8],
    cursor: Option<usize>,
}

/// Start walking the first `used_length` bytes of `buffer`.
pub fn records(buffer: &[u8], used_length: usize) -> Result<Records, Error> {
    ensure!(
        used_length <= buffer.len(),
        malformed(format!(
            "used length {} exceeds the {} byte buffer",
            used_length,
            buffer.len()
        ))
    );

    Ok(Records {
        data: &buffer[..used_length],
        cursor: if 0 == used_length { None } else { Some(0) },
    })
}

impl<'b> Records<'b> {
    fn record_at(&mut self, start: usize) -> Result<EaRecord, Error> {
        let remaining = &self.data[start..];

        ensure!(
            remaining.len() >= HEADER_SIZE,
            malformed(format!(
                "record at {} has {} bytes left, the header alone needs {}",
                start,
                remaining.len(),
                HEADER_SIZE
            ))
        );

        let header = RawEaHeader::from_slice(remaining);
        let record_size = header.record_size();

        ensure!(
            record_size <= remaining.len(),
            malformed(format!(
                "record at {} needs {} bytes (name {}, value {}), only {} left",
                start,
                record_size,
                header.name_length,
                header.value_length,
                remaining.len()
            ))
        );

        ensure!(
            0 == remaining[header.separator_offset()],
            malformed(format!(
                "name of record at {} isn't followed by a zero byte",
                start
            ))
        );

        let next = usize::try_from(header.next_entry_offset)?;
        if 0 != next {
            ensure!(
                next >= record_size,
                malformed(format!(
                    "record at {} puts the next record {} bytes on, inside its own {} bytes",
                    start, next, record_size
                ))
            );

            ensure!(
                next < remaining.len(),
                malformed(format!(
                    "record at {} puts the next record {} bytes on, past the end of the buffer at {}",
                    start,
                    next,
                    self.data.len()
                ))
            );

            self.cursor = Some(start + next);
        }

        let record = EaRecord {
            next_entry_offset: header.next_entry_offset,
            flags: header.flags,
            name: remaining[header.name_offset()..header.separator_offset()].to_vec(),
            value: remaining[header.value_offset()..record_size].to_vec(),
        };

        trace!(
            "EA record at {}: name {:?}, {} value bytes, flags {:#x}",
            start,
            String::from_utf8_lossy(&record.name),
            record.value.len(),
            record.flags
        );

        Ok(record)
    }
}

impl<'b> Iterator for Records<'b> {
    type Item = Result<EaRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.cursor.take()?;
        Some(self.record_at(start))
    }
}

/// The bytes a query filled in, and how many of them are records.
///
/// A fresh one is made for every read; nothing is cached.
#[derive(Clone, Debug, Default)]
pub struct EaBuffer {
    data: Vec<u8>,
    used: usize,
}

impl EaBuffer {
    pub fn new(data: Vec<u8>, used: usize) -> Result<EaBuffer, Error> {
        ensure!(
            used <= data.len(),
            malformed(format!(
                "used length {} exceeds the {} byte buffer",
                used,
                data.len()
            ))
        );
        Ok(EaBuffer { data, used })
    }

    /// What a file with no attributes reads as.
    pub fn empty() -> EaBuffer {
        EaBuffer::default()
    }

    pub fn used_length(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The used part of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub fn records(&self) -> Result<Records, Error> {
        records(&self.data, self.used)
    }

    pub fn decode_all(&self) -> Result<Vec<EaRecord>, Error> {
        decode_all(&self.data, self.used)
    }

    pub fn decode_by_name(&self, name: &[u8]) -> Result<Option<EaRecord>, Error> {
        decode_by_name(&self.data, self.used, name)
    }
}

/// Decode every record in the used part of the buffer, in buffer order.
///
/// An empty buffer is an empty list, not an error.
pub fn decode_all(buffer: &[u8], used_length: usize) -> Result<Vec<EaRecord>, Error> {
    records(buffer, used_length)?
        .enumerate()
        .map(|(i, record)| record.with_context(|| anyhow!("decoding EA record #{}", i)))
        .collect()
}

/// Find the record whose name is exactly `name`, byte for byte.
///
/// Stops at the first match; records after it are not looked at.
pub fn decode_by_name(
    buffer: &[u8],
    used_length: usize,
    name: &[u8],
) -> Result<Option<EaRecord>, Error> {
    for (i, record) in records(buffer, used_length)?.enumerate() {
        let record = record.with_context(|| anyhow!("decoding EA record #{}", i))?;
        if record.name == name {
            return Ok(Some(record));
        }
    }

    Ok(None)
}
