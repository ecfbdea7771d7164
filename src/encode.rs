use std::convert::TryFrom;
use std::io::Write;

use anyhow::ensure;
use anyhow::Error;
use byteorder::{LittleEndian, WriteBytesExt};

use crate::parse::EaRecord;
use crate::raw;
use crate::raw::EaFlags;
use crate::EaError;

/// Build the single-record buffer the set primitive takes,
/// with no flags and no following record.
pub fn encode(name: &[u8], value: &[u8]) -> Result<Vec<u8>, Error> {
    encode_with_flags(name, value, EaFlags::empty())
}

pub fn encode_with_flags(name: &[u8], value: &[u8], flags: EaFlags) -> Result<Vec<u8>, Error> {
    check_lengths(name, value)?;
    let mut out = Vec::with_capacity(raw::record_size(name.len(), value.len()));
    write_record(&mut out, 0, flags.bits(), name, value)?;
    Ok(out)
}

/// Lay records out the way the query primitive returns them:
/// each one starting on a four byte boundary, the last with a zero offset.
///
/// The `next_entry_offset` already in each record is ignored.
pub fn encode_chain(records: &[EaRecord]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();

    for (i, record) in records.iter().enumerate() {
        check_lengths(&record.name, &record.value)?;

        let last = i + 1 == records.len();
        let size = raw::record_size(record.name.len(), record.value.len());
        let stride = raw::aligned_record_size(record.name.len(), record.value.len());
        let next = if last { 0 } else { u32::try_from(stride)? };

        write_record(&mut out, next, record.flags, &record.name, &record.value)?;

        if !last {
            out.resize(out.len() + stride - size, 0);
        }
    }

    Ok(out)
}

fn check_lengths(name: &[u8], value: &[u8]) -> Result<(), Error> {
    ensure!(!name.is_empty(), EaError::EmptyName);
    ensure!(
        name.len() <= raw::MAX_NAME_LEN,
        EaError::NameTooLong { len: name.len() }
    );
    ensure!(
        value.len() <= raw::MAX_VALUE_LEN,
        EaError::ValueTooLong { len: value.len() }
    );
    Ok(())
}

/// Lengths must already have passed `check_lengths`.
fn write_record<W: Write>(
    mut out: W,
    next_entry_offset: u32,
    flags: u8,
    name: &[u8],
    value: &[u8],
) -> Result<(), Error> {
    out.write_u32::<LittleEndian>(next_entry_offset)?;
    out.write_u8(flags)?;
    out.write_u8(u8::try_from(name.len())?)?;
    out.write_u16::<LittleEndian>(u16::try_from(value.len())?)?;
    out.write_all(name)?;
    out.write_u8(0)?;
    out.write_all(value)?;
    Ok(())
}
