/*!
This crate reads and writes NTFS extended attributes (EAs), the small
name/value records the filesystem keeps next to a file's data stream.

The filesystem hands EAs out as a packed buffer of `FILE_FULL_EA_INFORMATION`
records, each pointing at the next. [`parse`] walks such a buffer, [`encode`]
builds the single-record buffer the set call wants, and [`EaService`] ties
the two to the operating system's query and set primitives.

# Example

```rust
use ntfs_ea::memory::MemoryVolume;
use ntfs_ea::EaService;

let volume = MemoryVolume::new();
let file = volume.create_file();
let service = EaService::new(&volume, &volume);

service.write(&file, b"secret", b"hunter2").unwrap();
let record = service.read_one(&file, b"secret").unwrap().unwrap();
assert_eq!(b"hunter2", record.value.as_slice());
```

On Windows, the [`nt`] module provides the real primitives for an open
`std::fs::File`.
*/

use anyhow::Error;
use byteorder::{ByteOrder, LittleEndian};

pub mod encode;
pub mod memory;
/// Raw record walking. Prefer [`EaService`] unless you already hold a buffer.
pub mod parse;
pub mod raw;
pub mod service;
pub mod status;

#[cfg(windows)]
pub mod nt;

pub use crate::encode::encode;
pub use crate::parse::{decode_all, decode_by_name, EaBuffer, EaRecord};
pub use crate::raw::EaFlags;
pub use crate::service::{EaService, Options, QueryEa, QueryOutcome, SetEa};
pub use crate::status::NtStatus;

#[derive(Debug, thiserror::Error)]
pub enum EaError {
    /// Names are stored with an 8-bit length.
    #[error("EA name is too long: {len} bytes, at most 255 allowed")]
    NameTooLong { len: usize },

    #[error("EA name must not be empty")]
    EmptyName,

    /// Values are stored with a 16-bit length.
    #[error("EA value is too long: {len} bytes, at most 65535 allowed")]
    ValueTooLong { len: usize },

    /// A write was requested without anything to write.
    #[error("no content provided for EA value")]
    NoContentProvided,

    /// The buffer doesn't hold what the record headers claim;
    /// it is truncated, corrupt, or wasn't an EA buffer at all.
    #[error("malformed EA record: {reason}")]
    MalformedRecord { reason: String },

    #[error("could not query EA records (status {status})")]
    OsQueryFailed { status: NtStatus },

    #[error("could not write EA record (status {status})")]
    OsWriteFailed { status: NtStatus },

    #[error("could not open {path:?}: {reason}")]
    FileOpenFailed { path: String, reason: String },

    /// Reading back after a write didn't return what was written.
    #[error("EA verification failed: {reason}")]
    VerifyFailed { reason: String },
}

fn malformed<S: ToString>(reason: S) -> EaError {
    EaError::MalformedRecord {
        reason: reason.to_string(),
    }
}

fn verify_failed<S: ToString>(reason: S) -> EaError {
    EaError::VerifyFailed {
        reason: reason.to_string(),
    }
}

/// Build the error for a file the caller couldn't get a handle on.
pub fn file_open_failed<P: ToString, S: ToString>(path: P, reason: S) -> Error {
    EaError::FileOpenFailed {
        path: path.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[inline]
fn read_le16(from: &[u8]) -> u16 {
    LittleEndian::read_u16(from)
}

#[inline]
fn read_le32(from: &[u8]) -> u32 {
    LittleEndian::read_u32(from)
}
