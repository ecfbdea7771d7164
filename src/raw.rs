/*!
The `FILE_FULL_EA_INFORMATION` record, as handed to and from the filesystem.

```text
0x00  u32  NextEntryOffset  (0 = last record)
0x04  u8   Flags
0x05  u8   EaNameLength     (N)
0x06  u16  EaValueLength    (V)
0x08  [N]  EaName
0x08+N u8  0
0x09+N [V] EaValue
```

All integers are little-endian.
*/

use bitflags::bitflags;

use crate::read_le16;
use crate::read_le32;

pub const NEXT_ENTRY_OFFSET: usize = 0x00;
pub const FLAGS: usize = 0x04;
pub const NAME_LENGTH: usize = 0x05;
pub const VALUE_LENGTH: usize = 0x06;

pub const HEADER_SIZE: usize = 8;

pub const MAX_NAME_LEN: usize = u8::MAX as usize;
/// The filesystem's limit for one value; also all the length field can hold.
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Records after the first in a query result start on this boundary.
pub const RECORD_ALIGNMENT: usize = 4;

bitflags! {
    pub struct EaFlags: u8 {
        /// The file can't be interpreted without this EA.
        const NEED_EA = 0x80;
    }
}

/// Bytes preceding the name.
#[inline]
pub const fn header_size() -> usize {
    HEADER_SIZE
}

/// Bytes one record occupies: header, name, terminator, value.
#[inline]
pub const fn record_size(name_len: usize, value_len: usize) -> usize {
    header_size() + name_len + 1 + value_len
}

/// `record_size`, rounded up to where the next record in a chain may start.
#[inline]
pub const fn aligned_record_size(name_len: usize, value_len: usize) -> usize {
    let size = record_size(name_len, value_len);
    (size + RECORD_ALIGNMENT - 1) / RECORD_ALIGNMENT * RECORD_ALIGNMENT
}

pub struct RawEaHeader {
    pub next_entry_offset: u32,
    pub flags: u8,
    pub name_length: u8,
    pub value_length: u16,
}

impl RawEaHeader {
    /// `data` must hold at least `HEADER_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            next_entry_offset: read_le32(&data[NEXT_ENTRY_OFFSET..]),
            flags: data[FLAGS],
            name_length: data[NAME_LENGTH],
            value_length: read_le16(&data[VALUE_LENGTH..]),
        }
    }

    /// Where the name starts, relative to the record.
    pub fn name_offset(&self) -> usize {
        header_size()
    }

    /// Where the terminator after the name sits, relative to the record.
    pub fn separator_offset(&self) -> usize {
        header_size() + usize::from(self.name_length)
    }

    pub fn value_offset(&self) -> usize {
        self.separator_offset() + 1
    }

    pub fn record_size(&self) -> usize {
        record_size(
            usize::from(self.name_length),
            usize::from(self.value_length),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(8, header_size());
        assert_eq!(9, record_size(0, 0));
        assert_eq!(8 + 6 + 1 + 7, record_size(6, 7));
        assert_eq!(8 + 255 + 1 + 65535, record_size(MAX_NAME_LEN, MAX_VALUE_LEN));
    }

    #[test]
    fn alignment() {
        assert_eq!(12, aligned_record_size(0, 0));
        assert_eq!(24, aligned_record_size(6, 7));
        assert_eq!(16, aligned_record_size(3, 4));
        assert_eq!(20, aligned_record_size(3, 5));
    }

    #[test]
    fn header_fields() {
        let data = [0x18, 0, 0, 0, 0x80, 6, 7, 0, b's'];
        let header = RawEaHeader::from_slice(&data);
        assert_eq!(0x18, header.next_entry_offset);
        assert_eq!(0x80, header.flags);
        assert_eq!(6, header.name_length);
        assert_eq!(7, header.value_length);
        assert_eq!(8, header.name_offset());
        assert_eq!(14, header.separator_offset());
        assert_eq!(15, header.value_offset());
        assert_eq!(22, header.record_size());
    }
}
